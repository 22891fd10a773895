//! Parallel searches must agree with the single-threaded search and with
//! plain minimax on the synthetic game.

use rsearch_core::synthetic::{SyntheticKernel, SyntheticPosition};
use rsearch_core::{Coordinator, SearchConfig, StopState};

fn coordinator(threads: usize, min_depth: i32, min_todo: usize) -> Coordinator<SyntheticKernel> {
    let config = SearchConfig::single_threaded()
        .with_threads(threads)
        .with_split_thresholds(min_depth, min_todo);
    Coordinator::new(SyntheticKernel::new(2, 5), config).expect("coordinator")
}

#[test]
fn test_thread_counts_agree_with_minimax() {
    let kernel = SyntheticKernel::new(2, 5);
    let depth = 5;
    for seed in 0..6u64 {
        let (expected_move, expected_score) =
            kernel.minimax(&mut SyntheticPosition::new(seed), depth);
        for threads in [1, 2, 4, 8] {
            let coord = coordinator(threads, 2, 1);
            let result = coord
                .root_search(SyntheticPosition::new(seed), depth, None)
                .expect("search");
            assert_eq!(
                Some(result.best_move),
                expected_move,
                "seed {seed}, {threads} thread(s)"
            );
            assert_eq!(result.score, expected_score, "seed {seed}, {threads} thread(s)");
            assert_eq!(result.depth, depth);
            assert_eq!(result.stop, StopState::Running);
        }
    }
}

#[test]
fn test_aggressive_splitting_does_not_deadlock() {
    // Every node with a searched first move is offered to a helper, so
    // nested splits and borrowed tasks happen constantly.
    let reference = coordinator(1, 1, 1)
        .root_search(SyntheticPosition::new(77), 6, None)
        .expect("reference search");
    for threads in [2, 3, 8] {
        let coord = coordinator(threads, 1, 1);
        for _ in 0..3 {
            let result = coord
                .root_search(SyntheticPosition::new(77), 6, None)
                .expect("parallel search");
            assert_eq!(result.best_move, reference.best_move);
            assert_eq!(result.score, reference.score);
            assert!(result.nodes > 0);
        }
        let stats = coord.stats();
        assert!(stats.attempts > 0, "{threads} threads never tried to split");
        assert_eq!(coord.live_nodes(), 0);
    }
}

#[test]
fn test_splitting_can_be_disabled() {
    let coord = coordinator(4, 1, 1);
    coord.set_splitting(false);
    let sequential = coord
        .root_search(SyntheticPosition::new(5), 5, None)
        .expect("search");
    assert_eq!(coord.stats().attempts, 0);
    assert_eq!(coord.stats().splits(), 0);

    coord.set_splitting(true);
    let parallel = coord
        .root_search(SyntheticPosition::new(5), 5, None)
        .expect("search");
    assert_eq!(sequential.best_move, parallel.best_move);
    assert_eq!(sequential.score, parallel.score);
}

#[test]
fn test_leaf_cost_does_not_change_the_result() {
    let config = SearchConfig::single_threaded()
        .with_threads(4)
        .with_split_thresholds(2, 1);
    let cheap = Coordinator::new(SyntheticKernel::new(3, 4), config.clone()).expect("coordinator");
    let costly = Coordinator::new(SyntheticKernel::new(3, 4).with_leaf_cost(20), config)
        .expect("coordinator");
    let a = cheap.root_search(SyntheticPosition::new(12), 4, None).expect("search");
    let b = costly.root_search(SyntheticPosition::new(12), 4, None).expect("search");
    assert_eq!((a.best_move, a.score), (b.best_move, b.score));
}
