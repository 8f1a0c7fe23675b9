use confstash::db::SqliteLoader;
use confstash::{APP_ID_KEY, APP_NAME_KEY, BackendSpec, Configuration};
use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn scratch_db(dir: &TempDir) -> String {
    init_tracing();
    dir.path().join("confstash.sqlite").display().to_string()
}

#[tokio::test]
async fn fresh_app_set_get_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let location = scratch_db(&dir);

    let mut configuration = Configuration::initialize(BackendSpec::sqlite(&location), "MyApp")
        .await
        .unwrap();
    configuration.set("THEME", json!("dark")).await.unwrap();
    assert_eq!(configuration.get("THEME"), json!("dark"));

    let app_id = configuration.app_id().to_string();
    drop(configuration);

    let reopened = Configuration::load_existing(BackendSpec::sqlite(&location), &app_id)
        .await
        .unwrap();
    assert_eq!(reopened.get("THEME"), json!("dark"));
    assert_eq!(reopened.get(APP_NAME_KEY), json!("MyApp"));
    assert_eq!(reopened.get(APP_ID_KEY), json!(app_id));
}

#[tokio::test]
async fn missing_key_returns_the_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let configuration =
        Configuration::initialize(BackendSpec::sqlite(scratch_db(&dir)), "Sentinel")
            .await
            .unwrap();
    assert_eq!(configuration.get("NONEXISTENT"), json!(""));
}

#[tokio::test]
async fn colliding_names_share_one_registration() {
    let dir = tempfile::tempdir().unwrap();
    let location = scratch_db(&dir);

    let mut first = Configuration::initialize(BackendSpec::sqlite(&location), "Shared")
        .await
        .unwrap();
    let mut second = Configuration::initialize(BackendSpec::sqlite(&location), "Shared")
        .await
        .unwrap();

    // The second facade joined the first registration.
    assert_eq!(first.app_id(), second.app_id());
    assert_eq!(second.get(APP_ID_KEY), json!(first.app_id()));

    first.set("FROM_FIRST", json!("1")).await.unwrap();
    second.set("FROM_SECOND", json!("2")).await.unwrap();

    // Both land in the same config partition.
    let reopened = Configuration::load_existing(BackendSpec::sqlite(&location), first.app_id())
        .await
        .unwrap();
    assert_eq!(reopened.get("FROM_FIRST"), json!("1"));
    assert_eq!(reopened.get("FROM_SECOND"), json!("2"));

    let inspector = SqliteLoader::new(
        &location,
        "Shared",
        &Uuid::new_v4().to_string(),
        "config",
        "applications",
    )
    .unwrap();
    let apps = inspector.registered_applications().await.unwrap();
    assert_eq!(apps.iter().filter(|a| a.app_name == "Shared").count(), 1);
}

#[tokio::test]
async fn clear_empties_the_view_but_not_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let location = scratch_db(&dir);

    let mut configuration = Configuration::initialize(BackendSpec::sqlite(&location), "ClearMe")
        .await
        .unwrap();
    configuration.set("KEEP", json!("persisted")).await.unwrap();
    let app_id = configuration.app_id().to_string();

    configuration.clear().await.unwrap();
    assert_eq!(configuration.get("KEEP"), json!(""));
    assert!(configuration.is_empty());

    // Clear never issues deletes: a new facade still sees the old rows.
    let reopened = Configuration::load_existing(BackendSpec::sqlite(&location), &app_id)
        .await
        .unwrap();
    assert_eq!(reopened.get("KEEP"), json!("persisted"));
}

#[tokio::test]
async fn delete_of_an_absent_key_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let mut configuration =
        Configuration::initialize(BackendSpec::sqlite(scratch_db(&dir)), "Deleter")
            .await
            .unwrap();

    configuration.set("PRESENT", json!("yes")).await.unwrap();
    configuration.delete("ABSENT").await.unwrap();
    assert_eq!(configuration.get("PRESENT"), json!("yes"));

    configuration.delete("PRESENT").await.unwrap();
    assert_eq!(configuration.get("PRESENT"), json!(""));
    assert!(!configuration.contains("PRESENT"));
}

#[tokio::test]
async fn update_merges_with_later_values_winning() {
    let dir = tempfile::tempdir().unwrap();
    let mut configuration =
        Configuration::initialize(BackendSpec::sqlite(scratch_db(&dir)), "Merger")
            .await
            .unwrap();
    configuration.set("A", json!("old")).await.unwrap();

    let entries = [
        ("A".to_string(), json!("new")),
        ("B".to_string(), json!("added")),
    ]
    .into_iter()
    .collect();
    configuration.update(entries).await.unwrap();

    assert_eq!(configuration.get("A"), json!("new"));
    assert_eq!(configuration.get("B"), json!("added"));
}

#[tokio::test]
async fn numbers_persist_as_text_through_relational_storage() {
    let dir = tempfile::tempdir().unwrap();
    let location = scratch_db(&dir);

    let mut configuration = Configuration::initialize(BackendSpec::sqlite(&location), "Numeric")
        .await
        .unwrap();
    configuration.set("PORT", json!(8080)).await.unwrap();
    // The live view keeps the typed value.
    assert_eq!(configuration.get("PORT"), json!(8080));

    // The store holds text; a reload observes the string form.
    let reopened =
        Configuration::load_existing(BackendSpec::sqlite(&location), configuration.app_id())
            .await
            .unwrap();
    assert_eq!(reopened.get("PORT"), json!("8080"));
}

#[tokio::test]
async fn file_backed_facade_with_exports() {
    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("app.json").display().to_string();
    std::fs::write(&json_path, "{}").unwrap();

    let mut configuration =
        Configuration::initialize(BackendSpec::json_file(&json_path), "FileApp")
            .await
            .unwrap();
    configuration.set("THEME", json!("dark")).await.unwrap();

    // Export as YAML text, independent of the owning JSON loader.
    let yaml = configuration.to_yaml(None).unwrap().unwrap();
    assert!(yaml.contains("THEME: dark"));
    assert!(yaml.contains("APP_NAME: FileApp"));

    // Export into a SQLite store and read it back through that backend.
    let sqlite_path = dir.path().join("export.sqlite").display().to_string();
    configuration.to_sqlite(&sqlite_path).await.unwrap();
    let reopened =
        Configuration::load_existing(BackendSpec::sqlite(&sqlite_path), configuration.app_id())
            .await
            .unwrap();
    assert_eq!(reopened.get("THEME"), json!("dark"));
}

#[tokio::test]
async fn initialize_on_a_missing_json_file_is_source_unavailable() {
    let err = Configuration::initialize(BackendSpec::json_file("/nonexistent/app.json"), "Ghost")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        confstash::ConfigError::SourceUnavailable(_)
    ));
}

#[tokio::test]
async fn initialize_on_json_writes_the_seed_document() {
    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("seed.json").display().to_string();
    std::fs::write(&json_path, "{}").unwrap();

    let configuration = Configuration::initialize(BackendSpec::json_file(&json_path), "Seeded")
        .await
        .unwrap();

    let raw = std::fs::read_to_string(&json_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed[APP_NAME_KEY], json!("Seeded"));
    assert_eq!(parsed[APP_ID_KEY], json!(configuration.app_id()));
}
