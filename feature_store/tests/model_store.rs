use feature_store::local::LATEST_FILE;
use feature_store::{EnvSnapshot, LocalSettings, Mode, ModelDraft, ModelStore, StorageBackend};
use feature_store::{StoreError, StoreSettings};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

fn model_store(dir: &TempDir) -> ModelStore {
    let settings = StoreSettings {
        local: LocalSettings {
            features_dir: dir.path().join("processed"),
            models_dir: dir.path().join("models"),
        },
        ..StoreSettings::default()
    };
    StorageBackend::open(Mode::Local, &settings, &EnvSnapshot::default())
        .unwrap()
        .get_model_store()
}

fn draft(model_json: &str, rmse: f64) -> ModelDraft {
    ModelDraft::new("gradient boosted trees")
        .with_metric("test_rmse", rmse)
        .with_file("model.json", model_json.as_bytes().to_vec())
        .with_file("feature_names.json", br#"["temp","price_lag_1d"]"#.to_vec())
}

#[test]
fn test_versions_increase_and_latest_moves() {
    let dir = TempDir::new().unwrap();
    let store = model_store(&dir);

    let first = store.save("electricity_price_xgboost", draft("{\"trees\":1}", 0.21)).unwrap();
    let second = store.save("electricity_price_xgboost", draft("{\"trees\":2}", 0.18)).unwrap();

    assert_eq!(first.version(), 1);
    assert_eq!(second.version(), 2);
    assert_eq!(store.versions("electricity_price_xgboost").unwrap(), vec![1, 2]);

    let latest = store.latest("electricity_price_xgboost").unwrap();
    assert_eq!(latest.version(), 2);
    assert_eq!(latest.file("model.json").unwrap(), b"{\"trees\":2}");
    assert_eq!(latest.metadata.metrics["test_rmse"], 0.18);
}

#[test]
fn test_older_versions_stay_retrievable() {
    let dir = TempDir::new().unwrap();
    let store = model_store(&dir);

    store.save("m", draft("one", 1.0)).unwrap();
    store.save("m", draft("two", 2.0)).unwrap();

    let old = store.get("m", 1).unwrap();
    assert_eq!(old.file("model.json").unwrap(), b"one");
    assert_eq!(old.files.len(), 2);
    assert_eq!(old.metadata.description, "gradient boosted trees");
}

#[test]
fn test_unknown_model_and_version_are_not_found() {
    let dir = TempDir::new().unwrap();
    let store = model_store(&dir);

    assert!(matches!(store.latest("missing").unwrap_err(), StoreError::NotFound(_)));
    assert!(matches!(store.versions("missing").unwrap_err(), StoreError::NotFound(_)));

    store.save("m", draft("one", 1.0)).unwrap();
    assert!(matches!(store.get("m", 7).unwrap_err(), StoreError::NotFound(_)));
}

#[test]
fn test_invalid_draft_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let store = model_store(&dir);

    let empty = ModelDraft::new("no files");
    assert!(matches!(store.save("m", empty).unwrap_err(), StoreError::Validation(_)));

    let reserved = ModelDraft::new("bad").with_file("metadata.json", b"{}".to_vec());
    assert!(matches!(store.save("m", reserved).unwrap_err(), StoreError::Validation(_)));

    assert!(!dir.path().join("models").join("m").exists());
}

#[test]
fn test_stale_pointer_does_not_reuse_version() {
    let dir = TempDir::new().unwrap();
    let store = model_store(&dir);

    store.save("m", draft("one", 1.0)).unwrap();
    store.save("m", draft("two", 2.0)).unwrap();

    // Simulate a crash after the version directory was renamed but before the pointer moved
    fs::write(dir.path().join("models").join("m").join(LATEST_FILE), "1").unwrap();
    assert_eq!(store.latest("m").unwrap().version(), 1);

    let third = store.save("m", draft("three", 3.0)).unwrap();
    assert_eq!(third.version(), 3);
    assert_eq!(store.latest("m").unwrap().version(), 3);
}
