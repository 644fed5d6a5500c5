use chrono::NaiveDate;
use feature_store::{DateRange, FeatureGroup, LocalSettings, Mode, StorageBackend, StoreError};
use feature_store::{EnvSnapshot, StoreSettings};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

fn day(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

// Helper function to open a local backend rooted in a scratch directory
fn local_backend(dir: &TempDir) -> StorageBackend {
    let settings = StoreSettings {
        local: LocalSettings {
            features_dir: dir.path().join("processed"),
            models_dir: dir.path().join("models"),
        },
        ..StoreSettings::default()
    };
    StorageBackend::open(Mode::Local, &settings, &EnvSnapshot::default()).unwrap()
}

fn price_group(backend: &StorageBackend) -> FeatureGroup {
    backend
        .get_or_create_feature_group("electricity_price", 1, "date", "SE3 daily prices")
        .unwrap()
}

fn prices(group: &FeatureGroup) -> Vec<(NaiveDate, f64)> {
    group
        .read_table(None)
        .unwrap()
        .column_values("price")
        .unwrap()
        .into_iter()
        .collect()
}

#[test]
fn test_get_or_create_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let backend = local_backend(&dir);

    let first = price_group(&backend);
    let second = backend
        .get_or_create_feature_group("electricity_price", 1, "day", "different description")
        .unwrap();

    // The existing group is returned untouched
    assert_eq!(first.metadata(), second.metadata());
    assert_eq!(second.metadata().primary_key, "date");
}

#[test]
fn test_overwrite_insert_replaces_only_matching_keys() {
    let dir = TempDir::new().unwrap();
    let backend = local_backend(&dir);
    let group = price_group(&backend);

    let initial = df!(
        "date" => &["2024-01-01", "2024-01-02", "2024-01-03"],
        "price" => &[1.0, 2.0, 3.0]
    )
    .unwrap();
    group.insert(&initial, false).unwrap();

    let update = df!(
        "date" => &["2024-01-03", "2024-01-04"],
        "price" => &[30.0, 4.0]
    )
    .unwrap();
    let summary = group.insert(&update, true).unwrap();

    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.replaced, 1);
    assert_eq!(summary.total, 4);
    assert_eq!(
        prices(&group),
        vec![
            (day("2024-01-01"), 1.0),
            (day("2024-01-02"), 2.0),
            (day("2024-01-03"), 30.0),
            (day("2024-01-04"), 4.0),
        ]
    );
}

#[test]
fn test_append_collision_leaves_store_unchanged() {
    let dir = TempDir::new().unwrap();
    let backend = local_backend(&dir);
    let group = price_group(&backend);

    let initial = df!("date" => &["2024-01-01", "2024-01-02"], "price" => &[1.0, 2.0]).unwrap();
    group.insert(&initial, false).unwrap();

    let path = match &group {
        FeatureGroup::Local(g) => g.data_path().to_path_buf(),
        FeatureGroup::Remote(_) => unreachable!(),
    };
    let before = fs::read(&path).unwrap();

    let colliding = df!("date" => &["2024-01-02", "2024-01-05"], "price" => &[9.0, 5.0]).unwrap();
    let err = group.insert(&colliding, false).unwrap_err();

    assert!(matches!(err, StoreError::DuplicateKey(_)));
    assert_eq!(fs::read(&path).unwrap(), before);
    assert_eq!(prices(&group).len(), 2);
}

#[test]
fn test_missing_key_column_is_schema_error() {
    let dir = TempDir::new().unwrap();
    let backend = local_backend(&dir);
    let group = price_group(&backend);

    let batch = df!("timestamp" => &["2024-01-01"], "price" => &[1.0]).unwrap();
    let err = group.insert(&batch, true).unwrap_err();
    assert!(matches!(err, StoreError::Schema(_)));
}

#[test]
fn test_read_filters_inclusive_range() {
    let dir = TempDir::new().unwrap();
    let backend = local_backend(&dir);
    let group = price_group(&backend);

    let batch = df!(
        "date" => &["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-04"],
        "price" => &[1.0, 2.0, 3.0, 4.0]
    )
    .unwrap();
    group.insert(&batch, false).unwrap();

    let range = DateRange::new(day("2024-01-02"), day("2024-01-03")).unwrap();
    let df = group.read(Some(range)).unwrap();

    assert_eq!(df.height(), 2);
    let values: Vec<Option<f64>> = df.column("price").unwrap().f64().unwrap().into_iter().collect();
    assert_eq!(values, vec![Some(2.0), Some(3.0)]);
}

#[test]
fn test_empty_group_reads_empty_frame() {
    let dir = TempDir::new().unwrap();
    let backend = local_backend(&dir);
    let group = price_group(&backend);

    let df = group.read(None).unwrap();
    assert_eq!(df.height(), 0);
    assert_eq!(df.get_column_names(), vec!["date"]);
}

#[test]
fn test_unknown_group_is_not_found() {
    let dir = TempDir::new().unwrap();
    let backend = local_backend(&dir);

    let err = backend.get_feature_group("weather", 1).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn test_read_after_group_removed_is_not_found() {
    let dir = TempDir::new().unwrap();
    let backend = local_backend(&dir);
    let group = price_group(&backend);

    fs::remove_file(dir.path().join("processed").join("electricity_price_v1.meta.json")).unwrap();

    assert!(matches!(group.read(None).unwrap_err(), StoreError::NotFound(_)));
}

#[test]
fn test_new_columns_are_added_as_nullable() {
    let dir = TempDir::new().unwrap();
    let backend = local_backend(&dir);
    let group = price_group(&backend);

    group
        .insert(&df!("date" => &["2024-01-01"], "price" => &[1.0]).unwrap(), false)
        .unwrap();
    group
        .insert(
            &df!("date" => &["2024-01-02"], "price" => &[2.0], "temp" => &[-3.5]).unwrap(),
            false,
        )
        .unwrap();

    let table = group.read_table(None).unwrap();
    assert_eq!(table.columns(), &["price".to_string(), "temp".to_string()]);
    assert!(!table.get(day("2024-01-01")).unwrap().contains_key("temp"));
    assert_eq!(table.get(day("2024-01-02")).unwrap()["temp"], -3.5);
}

#[test]
fn test_versions_are_separate_groups() {
    let dir = TempDir::new().unwrap();
    let backend = local_backend(&dir);
    let v1 = price_group(&backend);
    let v2 = backend
        .get_or_create_feature_group("electricity_price", 2, "date", "")
        .unwrap();

    v1.insert(&df!("date" => &["2024-01-01"], "price" => &[1.0]).unwrap(), false)
        .unwrap();

    assert_eq!(v1.read(None).unwrap().height(), 1);
    assert_eq!(v2.read(None).unwrap().height(), 0);
}

#[test]
fn test_no_temporary_file_left_behind() {
    let dir = TempDir::new().unwrap();
    let backend = local_backend(&dir);
    let group = price_group(&backend);

    group
        .insert(&df!("date" => &["2024-01-01"], "price" => &[1.0]).unwrap(), false)
        .unwrap();

    let leftovers: Vec<_> = fs::read_dir(dir.path().join("processed"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}
