use super::*;

fn approx_eq(left: f32, right: f32) {
    assert!((left - right).abs() < 1e-4, "expected {left} ~= {right}");
}

#[test]
fn add_vectors_initializes_on_first_call() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = VectorStore::open(dir.path()).unwrap();
    assert!(!store.is_initialized());

    let inserted_at = store.add_vectors(2, &[1.0, 0.0, 0.0, 1.0], None).unwrap();
    assert_eq!(inserted_at, 0);
    assert_eq!(store.count(), 2);
    assert_eq!(store.dimension(), 2);
    assert_eq!(store.ids(), &[0, 1]);
}

#[test]
fn squared_norms_match_direct_computation() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = VectorStore::open(dir.path()).unwrap();
    store.add_vectors(2, &[3.0, 4.0, 1.0, 0.0], None).unwrap();
    let norms = store.squared_norms();
    approx_eq(norms[0], 25.0);
    approx_eq(norms[1], 1.0);
}

#[test]
fn custom_ids_are_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = VectorStore::open(dir.path()).unwrap();
    store
        .add_vectors(2, &[1.0, 0.0, 0.0, 1.0], Some(&[42, 7]))
        .unwrap();
    assert_eq!(store.ids(), &[42, 7]);
}

#[test]
fn growth_beyond_capacity_preserves_existing_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = VectorStore::open(dir.path()).unwrap();
    store.initialize(2, 2).unwrap();
    store.add_vectors(2, &[1.0, 1.0, 2.0, 2.0], None).unwrap();
    // Capacity was 2; this push should trigger a resize.
    store.add_vectors(2, &[3.0, 3.0], None).unwrap();

    assert_eq!(store.count(), 3);
    assert_eq!(store.vectors(), &[1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
    assert_eq!(store.ids(), &[0, 1, 2]);
}

#[test]
fn reopen_after_close_preserves_data() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut store = VectorStore::open(dir.path()).unwrap();
        store.add_vectors(2, &[1.0, 2.0, 3.0, 4.0], None).unwrap();
    }
    let store = VectorStore::open(dir.path()).unwrap();
    assert_eq!(store.count(), 2);
    assert_eq!(store.dimension(), 2);
    assert_eq!(store.vectors(), &[1.0, 2.0, 3.0, 4.0]);
    assert_eq!(store.ids(), &[0, 1]);
}

#[test]
fn reset_clears_files_and_returns_to_uninitialized() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = VectorStore::open(dir.path()).unwrap();
    store.add_vectors(1, &[1.0, 2.0], None).unwrap();
    store.reset().unwrap();

    assert!(!store.is_initialized());
    assert_eq!(store.count(), 0);
    assert!(!dir.path().join("meta.json").exists());

    let reopened = VectorStore::open(dir.path()).unwrap();
    assert!(!reopened.is_initialized());
}

#[test]
fn rejects_mismatched_dimension_after_first_insert() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = VectorStore::open(dir.path()).unwrap();
    store.add_vectors(2, &[1.0, 2.0], None).unwrap();
    let err = store.add_vectors(3, &[1.0, 2.0, 3.0], None).unwrap_err();
    assert!(matches!(err, StoreError::DimensionMismatch { .. }));
}

#[test]
fn rejects_mismatched_id_count() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = VectorStore::open(dir.path()).unwrap();
    let err = store
        .add_vectors(2, &[1.0, 2.0, 3.0, 4.0], Some(&[1]))
        .unwrap_err();
    assert!(matches!(err, StoreError::MismatchedIdCount { .. }));
}

#[test]
fn rejects_empty_batch() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = VectorStore::open(dir.path()).unwrap();
    let err = store.add_vectors(2, &[], None).unwrap_err();
    assert!(matches!(err, StoreError::EmptyBatch));
}

#[test]
fn reset_then_reinitialize_with_new_dimension_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = VectorStore::open(dir.path()).unwrap();
    store.add_vectors(2, &[1.0, 2.0], None).unwrap();
    store.reset().unwrap();
    store.add_vectors(3, &[1.0, 2.0, 3.0], None).unwrap();
    assert_eq!(store.dimension(), 3);
}
