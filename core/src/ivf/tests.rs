use super::*;

fn two_cluster_data() -> Vec<f32> {
    let mut data = Vec::new();
    for _ in 0..20 {
        data.extend_from_slice(&[0.0, 0.0]);
        data.extend_from_slice(&[10.0, 10.0]);
    }
    data
}

#[test]
fn train_assigns_every_row_to_exactly_one_cell() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = IvfIndex::open(dir.path(), 2);
    let data = two_cluster_data();
    index.train(&data, 2, None).unwrap();

    assert!(index.is_trained());
    let n_rows = data.len() / 2;
    let mut seen: Vec<usize> = index.cells.iter().flatten().copied().collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..n_rows).collect::<Vec<_>>());
}

#[test]
fn train_shrinks_cell_count_when_data_is_small() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = IvfIndex::open(dir.path(), 2);
    let data = vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];
    index.train(&data, 100, None).unwrap();
    assert!(index.n_cells() <= 3);
}

#[test]
fn search_returns_candidates_from_nearest_cells_only() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = IvfIndex::open(dir.path(), 2);
    let data = two_cluster_data();
    index.train(&data, 2, None).unwrap();

    let candidates = index.search(&[0.0, 0.0], 1);
    assert!(!candidates.is_empty());
    // All candidates should come from the cell nearest the origin cluster.
    for &row in &candidates {
        let row_data = &data[row * 2..row * 2 + 2];
        assert!(row_data[0] < 5.0 && row_data[1] < 5.0);
    }
}

#[test]
fn search_on_untrained_index_returns_empty() {
    let dir = tempfile::tempdir().unwrap();
    let index = IvfIndex::open(dir.path(), 2);
    assert!(index.search(&[0.0, 0.0], 5).is_empty());
}

#[test]
fn max_codes_stops_after_triggering_cell() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = IvfIndex::open(dir.path(), 2);
    let data = two_cluster_data();
    index.train(&data, 2, None).unwrap();
    index.set_max_codes(1);

    let candidates = index.search(&[0.0, 0.0], 2);
    // The first cell alone already exceeds max_codes=1, so search stops there.
    assert_eq!(candidates.len(), data.len() / 2 / 2);
}

#[test]
fn add_vectors_assigns_new_rows_to_existing_cells() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = IvfIndex::open(dir.path(), 2);
    let data = two_cluster_data();
    let base = data.len() / 2;
    index.train(&data, 2, None).unwrap();

    let new_rows = vec![0.1, 0.1, 10.1, 10.1];
    index.add_vectors(&new_rows, base, None).unwrap();

    let total: usize = index.cells.iter().map(|cell| cell.len()).sum();
    assert_eq!(total, base + 2);
}

#[test]
fn reload_from_disk_preserves_trained_state() {
    let dir = tempfile::tempdir().unwrap();
    let data = two_cluster_data();
    {
        let mut index = IvfIndex::open(dir.path(), 2);
        index.train(&data, 2, None).unwrap();
    }
    let reopened = IvfIndex::open(dir.path(), 2);
    assert!(reopened.is_trained());
    assert_eq!(reopened.n_cells(), 2);
}

#[test]
fn reset_clears_trained_state_and_persisted_files() {
    let dir = tempfile::tempdir().unwrap();
    let data = two_cluster_data();
    let mut index = IvfIndex::open(dir.path(), 2);
    index.train(&data, 2, None).unwrap();
    index.reset().unwrap();

    assert!(!index.is_trained());
    assert!(!dir.path().join("indexer_state.json").exists());
}

#[test]
fn load_rejects_truncated_centroids_file() {
    let dir = tempfile::tempdir().unwrap();
    let data = two_cluster_data();
    {
        let mut index = IvfIndex::open(dir.path(), 2);
        index.train(&data, 2, None).unwrap();
    }

    // Simulate a crash mid-write: centroids.npy holds fewer floats than
    // n_cells * dimension demands.
    std::fs::write(dir.path().join("centroids.npy"), [0u8; 4]).unwrap();

    let reopened = IvfIndex::open(dir.path(), 2);
    assert!(!reopened.is_trained());
    assert!(reopened.search(&[0.0, 0.0], 5).is_empty());
}

#[test]
fn rejects_training_on_empty_data() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = IvfIndex::open(dir.path(), 2);
    let err = index.train(&[], 2, None).unwrap_err();
    assert!(matches!(err, IndexError::EmptyData));
}
