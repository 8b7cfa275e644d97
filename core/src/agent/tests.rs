use super::*;

#[test]
fn ucb1_visits_every_arm_once_before_exploiting() {
    let dir = tempfile::tempdir().unwrap();
    let mut agent = AdaptiveAgent::new(dir.path(), SelectionAlgorithm::Ucb1, 0.1);

    let mut seen = std::collections::HashSet::new();
    for _ in 0..ARMS.len() {
        let arm = agent.select_arm();
        seen.insert(arm.name);
        agent.update(arm.name, 10.0);
    }
    assert_eq!(seen.len(), ARMS.len());
}

#[test]
fn update_ignores_non_positive_latency() {
    let dir = tempfile::tempdir().unwrap();
    let mut agent = AdaptiveAgent::new(dir.path(), SelectionAlgorithm::EpsilonGreedy, 0.0);
    agent.update("flat", 0.0);
    agent.update("flat", -5.0);
    assert_eq!(agent.total_pulls(), 0);
    assert_eq!(agent.stats()[0].pulls, 0);
}

#[test]
fn update_computes_reward_as_inverse_latency() {
    let dir = tempfile::tempdir().unwrap();
    let mut agent = AdaptiveAgent::new(dir.path(), SelectionAlgorithm::EpsilonGreedy, 0.0);
    agent.update("flat", 10.0);
    let stats = agent.stats();
    assert!((stats[0].avg_reward - 100.0).abs() < 1e-6);
    assert_eq!(stats[0].pulls, 1);
}

#[test]
fn epsilon_zero_always_exploits_best_average() {
    let dir = tempfile::tempdir().unwrap();
    let mut agent = AdaptiveAgent::new(dir.path(), SelectionAlgorithm::EpsilonGreedy, 0.0);
    // Seed every arm once so none has a zero pull count to special-case.
    for arm in ARMS {
        agent.update(arm.name, 100.0);
    }
    // Make "ivf_balanced" clearly best.
    agent.update("ivf_balanced", 1.0);

    let chosen = agent.select_arm();
    assert_eq!(chosen.name, "ivf_balanced");
}

#[test]
fn reset_clears_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let mut agent = AdaptiveAgent::new(dir.path(), SelectionAlgorithm::EpsilonGreedy, 0.0);
    agent.update("flat", 5.0);
    agent.reset();
    assert_eq!(agent.total_pulls(), 0);
    assert!(agent.stats().iter().all(|stats| stats.pulls == 0));
}

#[test]
fn state_persists_across_reopen_after_snapshot_interval() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut agent = AdaptiveAgent::new(dir.path(), SelectionAlgorithm::EpsilonGreedy, 0.0);
        for _ in 0..10 {
            agent.update("flat", 20.0);
        }
    }
    let reopened = AdaptiveAgent::open(dir.path());
    assert_eq!(reopened.total_pulls(), 10);
    assert_eq!(reopened.stats()[0].pulls, 10);
}

#[test]
fn open_with_missing_state_falls_back_to_fresh_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let agent = AdaptiveAgent::open(dir.path());
    assert_eq!(agent.total_pulls(), 0);
}

#[test]
fn literal_scenario_epsilon_greedy_converges_on_fastest_arm() {
    let dir = tempfile::tempdir().unwrap();
    let mut agent = AdaptiveAgent::new(dir.path(), SelectionAlgorithm::EpsilonGreedy, 0.1);

    let latencies: std::collections::HashMap<&str, f64> = [
        ("flat", 50.0),
        ("ivf_conservative", 10.0),
        ("ivf_balanced", 20.0),
        ("ivf_aggressive", 100.0),
    ]
    .into_iter()
    .collect();

    let mut conservative_pulls = 0u64;
    for _ in 0..1000 {
        let arm = agent.select_arm();
        if arm.name == "ivf_conservative" {
            conservative_pulls += 1;
        }
        agent.update(arm.name, latencies[arm.name]);
    }

    assert!(
        conservative_pulls as f64 / 1000.0 > 0.70,
        "expected ivf_conservative to dominate pulls, got {conservative_pulls}/1000"
    );
}

#[test]
fn literal_scenario_ucb1_explores_every_arm_after_one_arm_dominates_pulls() {
    let dir = tempfile::tempdir().unwrap();
    let mut agent = AdaptiveAgent::new(dir.path(), SelectionAlgorithm::Ucb1, 0.1);

    for _ in 0..10 {
        agent.update("flat", 50.0);
    }

    let mut chosen = std::collections::HashSet::new();
    for _ in 0..10 {
        let arm = agent.select_arm();
        chosen.insert(arm.name);
        agent.update(arm.name, 50.0);
    }

    for name in ["ivf_conservative", "ivf_balanced", "ivf_aggressive"] {
        assert!(chosen.contains(name), "expected {name} to be selected at least once");
    }
}
