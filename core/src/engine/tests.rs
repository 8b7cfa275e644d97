use super::*;

#[test]
fn add_then_search_finds_closest_vector() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path(), 2).unwrap();
    engine
        .add_vectors(2, &[0.0, 0.0, 5.0, 5.0, 9.0, 9.0], None)
        .unwrap();

    let outcome = engine
        .search(&[0.1, 0.1], 1, Metric::L2, false, false)
        .unwrap();
    assert_eq!(outcome.hits[0].id, 0);
}

#[test]
fn train_index_then_search_uses_ivf_candidates() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path(), 2).unwrap();
    let mut vectors = Vec::new();
    for _ in 0..10 {
        vectors.extend_from_slice(&[0.0, 0.0]);
        vectors.extend_from_slice(&[10.0, 10.0]);
    }
    engine.add_vectors(2, &vectors, None).unwrap();
    engine.train_index(2).unwrap();
    assert!(engine.is_index_trained());

    let outcome = engine
        .search(&[0.0, 0.0], 3, Metric::L2, true, false)
        .unwrap();
    assert_eq!(outcome.arm_used, None);
    assert_eq!(outcome.hits.len(), 3);
}

#[test]
fn reset_store_clears_index_too() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path(), 2).unwrap();
    engine.add_vectors(2, &[0.0, 0.0, 1.0, 1.0], None).unwrap();
    engine.train_index(1).unwrap();

    engine.reset_store().unwrap();
    assert_eq!(engine.vector_count(), 0);
    assert!(!engine.is_index_trained());
}

#[test]
fn agent_driven_search_updates_stats() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path(), 2).unwrap();
    engine.add_vectors(2, &[0.0, 0.0, 1.0, 1.0], None).unwrap();

    let outcome = engine
        .search(&[0.0, 0.0], 1, Metric::L2, true, true)
        .unwrap();
    assert!(outcome.arm_used.is_some());
    let report = engine.agent_stats();
    assert_eq!(report.total_pulls, 1);
    assert_eq!(report.arms.iter().map(|a| a.pulls).sum::<u64>(), 1);
}

#[test]
fn reopen_after_close_preserves_vectors_and_trained_index() {
    let dir = tempfile::tempdir().unwrap();
    {
        let engine = Engine::open(dir.path(), 2).unwrap();
        let mut vectors = Vec::new();
        for _ in 0..10 {
            vectors.extend_from_slice(&[0.0, 0.0]);
            vectors.extend_from_slice(&[10.0, 10.0]);
        }
        engine.add_vectors(2, &vectors, None).unwrap();
        engine.train_index(2).unwrap();
    }

    let reopened = Engine::open(dir.path(), 2).unwrap();
    assert_eq!(reopened.vector_count(), 20);
    assert!(reopened.is_index_trained());
}

#[test]
fn literal_scenario_two_points_top_k_one_matches_nearest_id() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path(), 2).unwrap();
    engine
        .add_vectors(2, &[1.0, 0.0, 0.0, 1.0], Some(&[1, 2]))
        .unwrap();

    let outcome = engine
        .search(&[1.0, 0.0], 1, Metric::L2, false, false)
        .unwrap();
    assert_eq!(outcome.hits.len(), 1);
    assert_eq!(outcome.hits[0].id, 1);
    assert!(outcome.hits[0].score.abs() < 1e-6);
}

#[test]
fn train_succeeds_when_opened_with_placeholder_dimension() {
    // Mirrors how the server wires Engine::open: a brand-new store is
    // opened with a configured max-dimension placeholder (here 4096),
    // unrelated to the real per-row dimension the first add_vectors call
    // fixes (2).
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path(), 4096).unwrap();
    let mut vectors = Vec::new();
    for _ in 0..10 {
        vectors.extend_from_slice(&[0.0, 0.0]);
        vectors.extend_from_slice(&[10.0, 10.0]);
    }
    engine.add_vectors(2, &vectors, None).unwrap();
    engine.train_index(2).unwrap();
    assert!(engine.is_index_trained());

    let outcome = engine
        .search(&[0.0, 0.0], 3, Metric::L2, true, false)
        .unwrap();
    assert_eq!(outcome.hits.len(), 3);
}
