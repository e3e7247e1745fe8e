mod common;

use common::*;
use shapestore::{
    Crs, Envelope, FeatureStore, FileKind, QueryOptions, StoreBuilder, StoreConfig, StoreError,
    TextEncoding, Value,
};

#[test]
fn test_missing_attribute_file_degrades_to_geometry_only() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_store(
        dir.path(),
        "bare",
        &shp(POINT, &[point(0.0, 0.0), point(10.0, 10.0), point(20.0, 20.0)]),
        None,
    );
    let store = FeatureStore::open(&base).expect("geometry alone is enough to open");

    let feature_type = store.feature_type();
    assert!(feature_type.fields().is_empty());
    assert_eq!(feature_type.property_count(), 1);

    let features: Vec<_> = store.query(QueryOptions::all(), |_| true).collect();
    assert_eq!(features.len(), 3);
    assert!(features.iter().all(|f| f.attributes.is_empty()));
    assert!(features.iter().all(|f| f.geometry.is_some()));
    assert!(store.is_available());
}

#[test]
fn test_attribute_file_appearing_later_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_store(
        dir.path(),
        "late",
        &shp(POINT, &[point(1.0, 1.0)]),
        None,
    );
    let store = FeatureStore::open(&base).unwrap();
    assert!(store.feature_type().fields().is_empty());

    std::fs::write(base.with_extension("dbf"), names_dbf(&["late"])).unwrap();
    assert!(store.check_for_update());
    assert_eq!(store.feature_type().property_count(), 2);
    assert_eq!(names(store.query(QueryOptions::all(), |_| true)), vec!["late"]);
}

#[test]
fn test_attribute_file_appearing_later_in_other_case_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_store(
        dir.path(),
        "roads",
        &shp(POINT, &[point(1.0, 1.0)]),
        None,
    );
    let store = FeatureStore::open(&base).unwrap();
    assert!(store.feature_type().fields().is_empty());

    std::fs::write(dir.path().join("roads.DBF"), names_dbf(&["main"])).unwrap();
    assert!(store.check_for_update());
    assert_eq!(names(store.query(QueryOptions::all(), |_| true)), vec!["main"]);
}

#[test]
fn test_deeply_nested_crs_hint_falls_back_to_default() {
    let dir = tempfile::tempdir().unwrap();
    let base = abc_store(dir.path());
    std::fs::write(base.with_extension("prj"), "A[".repeat(200_000)).unwrap();

    let store = FeatureStore::open(&base).unwrap();
    assert_eq!(store.crs(), &Crs::wgs84());
    assert_eq!(store.query(QueryOptions::all(), |_| true).count(), 3);
}

#[test]
fn test_deleted_row_yields_empty_attributes() {
    let dir = tempfile::tempdir().unwrap();
    let attributes = dbf(
        &[("name", 'C', 10, 0)],
        &[
            (false, vec![b"A".as_slice()]),
            (true, vec![b"B".as_slice()]),
            (false, vec![b"C".as_slice()]),
        ],
    );
    let base = write_store(
        dir.path(),
        "deleted",
        &shp(POINT, &[point(0.0, 0.0), point(10.0, 10.0), point(20.0, 20.0)]),
        Some(&attributes),
    );
    let store = FeatureStore::open(&base).unwrap();

    let features: Vec<_> = store.query(QueryOptions::all(), |_| true).collect();
    assert_eq!(features.len(), 3);
    assert!(features[1].attributes.is_empty());
    assert!(features[1].geometry.is_some());
    assert_eq!(features[2].get("name"), Some(&Value::Text("C".to_string())));
}

#[test]
fn test_null_geometry_records() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_store(
        dir.path(),
        "holes",
        &shp(POINT, &[point(0.0, 0.0), None, point(2.0, 2.0)]),
        Some(&names_dbf(&["A", "B", "C"])),
    );
    let store = FeatureStore::open(&base).unwrap();
    assert_eq!(store.len(), 3);
    assert_eq!(store.index_stats().unwrap().entries, 2);

    let all: Vec<_> = store.query(QueryOptions::all(), |_| true).collect();
    assert_eq!(names(all.clone()), vec!["A", "B", "C"]);
    assert!(all[1].geometry.is_none());

    let options = QueryOptions::within(Envelope::new(-10.0, -10.0, 10.0, 10.0));
    let mut found = names(store.query(options, |_| true));
    found.sort();
    assert_eq!(found, vec!["A", "C"]);
}

#[test]
fn test_fewer_rows_than_records() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_store(
        dir.path(),
        "short",
        &shp(POINT, &[point(0.0, 0.0), point(1.0, 1.0)]),
        Some(&names_dbf(&["only"])),
    );
    let store = FeatureStore::open(&base).unwrap();

    let features: Vec<_> = store.query(QueryOptions::all(), |_| true).collect();
    assert_eq!(features.len(), 2);
    assert!(features[0].has_attributes());
    assert!(!features[1].has_attributes());
}

#[test]
fn test_corrupt_attribute_file_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_store(
        dir.path(),
        "broken",
        &shp(POINT, &[point(0.0, 0.0)]),
        Some(b"definitely not a table"),
    );
    let store = FeatureStore::open(&base).unwrap();
    assert!(store.feature_type().fields().is_empty());
    assert_eq!(store.query(QueryOptions::all(), |_| true).count(), 1);
}

#[test]
fn test_missing_geometry_file_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let err = FeatureStore::open(dir.path().join("nothing")).unwrap_err();
    assert!(err.is_missing_file());
}

#[test]
fn test_malformed_geometry_file_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_store(dir.path(), "junk", b"not a geometry file at all", None);
    let err = FeatureStore::open(&base).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Format {
            kind: FileKind::Geometry,
            ..
        }
    ));
}

#[test]
fn test_mixed_geometry_kinds_fail_open() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_store(
        dir.path(),
        "mixed",
        &shp(
            POINT,
            &[point(0.0, 0.0), polyline(&[vec![(0.0, 0.0), (1.0, 1.0)]])],
        ),
        None,
    );
    assert!(matches!(
        FeatureStore::open(&base),
        Err(StoreError::Format { .. })
    ));
}

#[test]
fn test_invalid_config_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let base = abc_store(dir.path());
    let err = StoreBuilder::new(&base)
        .config(StoreConfig::default().with_index_fanout(1))
        .open()
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidConfig(_)));
}

#[test]
fn test_deleted_geometry_file_makes_store_unavailable_until_restored() {
    let dir = tempfile::tempdir().unwrap();
    let base = abc_store(dir.path());
    let store = FeatureStore::open(&base).unwrap();
    assert!(store.is_available());

    let shp_path = base.with_extension("shp");
    let original = std::fs::read(&shp_path).unwrap();
    std::fs::remove_file(&shp_path).unwrap();

    assert!(!store.check_for_update());
    assert!(!store.is_available());
    assert_eq!(store.query(QueryOptions::all(), |_| true).count(), 0);
    assert!(store.envelope().is_none());

    std::fs::write(&shp_path, original).unwrap();
    touch_forward(&shp_path, 10);
    assert!(store.check_for_update());
    assert_eq!(store.query(QueryOptions::all(), |_| true).count(), 3);
}

#[test]
fn test_broken_rewrite_is_not_retried_until_changed() {
    let dir = tempfile::tempdir().unwrap();
    let base = abc_store(dir.path());
    let store = FeatureStore::open(&base).unwrap();

    let shp_path = base.with_extension("shp");
    std::fs::write(&shp_path, b"truncated").unwrap();
    touch_forward(&shp_path, 10);
    assert!(!store.check_for_update());
    assert!(!store.check_for_update());

    std::fs::write(&shp_path, shp(POINT, &[point(3.0, 3.0)])).unwrap();
    touch_forward(&shp_path, 20);
    assert!(store.check_for_update());
    assert_eq!(store.len(), 1);
}

#[test]
fn test_geometry_suffix_and_upper_case_companions() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("UPPER");
    std::fs::write(
        dir.path().join("UPPER.SHP"),
        shp(POINT, &[point(4.0, 4.0)]),
    )
    .unwrap();
    std::fs::write(dir.path().join("UPPER.DBF"), names_dbf(&["up"])).unwrap();

    let store = FeatureStore::open(&base).unwrap();
    assert_eq!(names(store.query(QueryOptions::all(), |_| true)), vec!["up"]);

    let lower = write_store(dir.path(), "lower", &shp(POINT, &[point(1.0, 1.0)]), None);
    let store = FeatureStore::open(lower.with_extension("shp")).unwrap();
    assert_eq!(store.name(), "lower");
}

#[test]
fn test_empty_geometry_file() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_store(dir.path(), "empty", &shp(POINT, &[]), Some(&names_dbf(&[])));
    let store = FeatureStore::open(&base).unwrap();

    assert!(store.is_empty());
    assert_eq!(store.query(QueryOptions::all(), |_| true).count(), 0);
    let options = QueryOptions::within(Envelope::new(-180.0, -90.0, 180.0, 90.0));
    assert_eq!(store.query(options, |_| true).count(), 0);
}

#[test]
fn test_encoding_hint_and_override() {
    let dir = tempfile::tempdir().unwrap();
    let name = "Zürich";
    let attributes = dbf(&[("name", 'C', 12, 0)], &[(false, vec![name.as_bytes()])]);
    let base = write_store(
        dir.path(),
        "towns",
        &shp(POINT, &[point(8.5, 47.4)]),
        Some(&attributes),
    );

    let latin1 = FeatureStore::open(&base).unwrap();
    assert_eq!(latin1.encoding(), TextEncoding::Latin1);
    assert_ne!(names(latin1.query(QueryOptions::all(), |_| true)), vec![name]);

    std::fs::write(base.with_extension("cpg"), "UTF-8").unwrap();
    let hinted = FeatureStore::open(&base).unwrap();
    assert_eq!(hinted.encoding(), TextEncoding::Utf8);
    assert_eq!(names(hinted.query(QueryOptions::all(), |_| true)), vec![name]);

    let forced = StoreBuilder::new(&base)
        .encoding(TextEncoding::Latin1)
        .open()
        .unwrap();
    assert_eq!(forced.encoding(), TextEncoding::Latin1);
}

#[test]
fn test_typed_attribute_values() {
    let dir = tempfile::tempdir().unwrap();
    let attributes = dbf(
        &[
            ("pop", 'N', 8, 0),
            ("area", 'N', 10, 2),
            ("capital", 'L', 1, 0),
            ("founded", 'D', 8, 0),
        ],
        &[(
            false,
            vec![
                b"402762".as_slice(),
                b"87.88".as_slice(),
                b"Y".as_slice(),
                b"12180101".as_slice(),
            ],
        )],
    );
    let base = write_store(
        dir.path(),
        "typed",
        &shp(POINT, &[point(8.5, 47.4)]),
        Some(&attributes),
    );
    let store = FeatureStore::open(&base).unwrap();

    let feature = store
        .query(QueryOptions::all(), |_| true)
        .next()
        .expect("one feature");
    assert_eq!(feature.get("pop"), Some(&Value::Integer(402_762)));
    assert_eq!(feature.get("area"), Some(&Value::Float(87.88)));
    assert_eq!(feature.get("capital"), Some(&Value::Boolean(true)));
    assert_eq!(
        feature.get("founded").and_then(|v| v.as_date()),
        chrono::NaiveDate::from_ymd_opt(1218, 1, 1)
    );
}
