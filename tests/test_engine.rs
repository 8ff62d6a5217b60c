use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use genepool::{
    challenge::Challenge,
    engine::EvolutionEngine,
    error::{EngineError, Result},
    strategy::{FitnessDirection, SamplingPolicy, Strategy},
};

/// Hands out a fixed list of one-dimensional cells, then scores them by
/// their absolute difference from a target.
struct FixedCells {
    values: Vec<f64>,
    target: f64,
    next: AtomicUsize,
    evaluations: Arc<AtomicUsize>,
}

impl FixedCells {
    fn new(values: Vec<f64>, target: f64) -> Self {
        Self {
            values,
            target,
            next: AtomicUsize::new(0),
            evaluations: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn evaluation_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.evaluations)
    }
}

impl Challenge for FixedCells {
    type Cell = f64;

    fn make_default_cell(&self) -> Result<f64> {
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        Ok(self.values[index % self.values.len()])
    }

    fn fitness(&self, cell: &f64) -> Result<f64> {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        Ok((cell - self.target).abs())
    }
}

#[test]
fn test_static_population_reports_identical_generations() {
    let _ = tracing_subscriber::fmt().try_init();

    // Without mutation or crossover the cells never change, so every
    // generation must report the same best cell.
    let strategy = Strategy::builder()
        .num_threads(2)
        .num_cells(4)
        .num_generations(3)
        .sampling(SamplingPolicy::All)
        .direction(FitnessDirection::Minimize)
        .build();
    let challenge = FixedCells::new(vec![1.0, 5.0, 3.0, 9.0], 2.9);
    let engine = EvolutionEngine::new(strategy, challenge);

    let stats = engine.run().unwrap();
    assert_eq!(stats.len(), 3);

    let records = stats.records();
    for record in &records[1..] {
        assert_eq!(record, &records[0]);
    }
    // 3.0 is the closest cell to the target of 2.9.
    assert_eq!(records[0].best_cell, 3.0);
    assert!((records[0].best_fitness - 0.1).abs() < 1e-9);
    // Mean of |1.0-2.9|, |5.0-2.9|, |3.0-2.9| and |9.0-2.9|.
    assert!((records[0].average_fitness - 2.55).abs() < 1e-9);
}

#[test]
fn test_fresh_entries_are_not_reevaluated() {
    // Fitness jobs are issued only for stale entries. Nothing invalidates
    // the scores after the initial evaluation, so a three-generation run
    // performs exactly num_cells evaluations in total.
    let strategy = Strategy::builder()
        .num_threads(2)
        .num_cells(4)
        .num_generations(3)
        .sampling(SamplingPolicy::All)
        .direction(FitnessDirection::Minimize)
        .build();
    let challenge = FixedCells::new(vec![1.0, 5.0, 3.0, 9.0], 2.9);
    let evaluations = challenge.evaluation_counter();
    let engine = EvolutionEngine::new(strategy, challenge);

    engine.run().unwrap();
    assert_eq!(evaluations.load(Ordering::SeqCst), 4);
}

#[test]
fn test_mutation_invalidates_scores_every_generation() {
    // With a mutation chance of 1.0 every entry goes stale each
    // generation, so each of the three generations evaluates all four
    // cells.
    let strategy = Strategy::builder()
        .num_threads(2)
        .num_cells(4)
        .num_generations(3)
        .mutation_chance(1.0)
        .direction(FitnessDirection::Minimize)
        .build();
    let challenge = FixedCells::new(vec![1.0, 5.0, 3.0, 9.0], 2.9);
    let evaluations = challenge.evaluation_counter();
    let engine = EvolutionEngine::new(strategy, challenge);

    engine.run().unwrap();
    assert_eq!(evaluations.load(Ordering::SeqCst), 12);
}

struct FailingFitness {
    calls: AtomicUsize,
    fail_at: usize,
}

impl Challenge for FailingFitness {
    type Cell = f64;

    fn make_default_cell(&self) -> Result<f64> {
        Ok(1.0)
    }

    fn fitness(&self, cell: &f64) -> Result<f64> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call + 1 == self.fail_at {
            return Err(EngineError::Execution("sensor went dark".to_string()));
        }
        Ok(*cell)
    }
}

#[test]
fn test_execution_fault_returns_partial_stats() {
    // Four evaluations succeed in generation 0; the sixth call, in
    // generation 1, fails. The run must surface the fault together with
    // the one completed generation.
    let strategy = Strategy::builder()
        .num_threads(2)
        .num_cells(4)
        .num_generations(5)
        .sampling(SamplingPolicy::All)
        .mutation_chance(1.0)
        .build();
    let challenge = FailingFitness {
        calls: AtomicUsize::new(0),
        fail_at: 6,
    };
    let engine = EvolutionEngine::new(strategy, challenge);

    let failure = engine.run().unwrap_err();
    match &failure.error {
        EngineError::Execution(msg) => assert!(msg.contains("sensor went dark")),
        other => panic!("Expected execution fault, got {:?}", other),
    }
    assert_eq!(failure.stats.len(), 1);
}

struct PanickingFitness;

impl Challenge for PanickingFitness {
    type Cell = f64;

    fn make_default_cell(&self) -> Result<f64> {
        Ok(0.0)
    }

    fn fitness(&self, _cell: &f64) -> Result<f64> {
        panic!("fitness blew up");
    }
}

#[test]
fn test_callback_panic_is_an_execution_fault() {
    let strategy = Strategy::builder()
        .num_threads(2)
        .num_cells(4)
        .num_generations(3)
        .build();
    let engine = EvolutionEngine::new(strategy, PanickingFitness);

    let failure = engine.run().unwrap_err();
    match &failure.error {
        EngineError::Execution(msg) => assert!(msg.contains("panicked")),
        other => panic!("Expected execution fault, got {:?}", other),
    }
    assert!(failure.stats.is_empty());
}

struct BrokenFactory;

impl Challenge for BrokenFactory {
    type Cell = f64;

    fn make_default_cell(&self) -> Result<f64> {
        Err(EngineError::Execution("no material".to_string()))
    }

    fn fitness(&self, cell: &f64) -> Result<f64> {
        Ok(*cell)
    }
}

#[test]
fn test_failing_factory_produces_no_stats() {
    let strategy = Strategy::builder()
        .num_threads(2)
        .num_cells(4)
        .num_generations(3)
        .build();
    let engine = EvolutionEngine::new(strategy, BrokenFactory);

    let failure = engine.run().unwrap_err();
    assert!(matches!(failure.error, EngineError::Execution(_)));
    assert!(failure.stats.is_empty());
}

#[test]
fn test_runs_shut_down_cleanly_back_to_back() {
    // run() joins every worker before returning, so consecutive runs in
    // one process must not interfere with each other.
    for seed in 0..3 {
        let strategy = Strategy::builder()
            .num_threads(4)
            .num_cells(16)
            .num_generations(5)
            .mutation_chance(0.5)
            .seed(seed)
            .build();
        let challenge = FixedCells::new(vec![2.0, 4.0, 8.0, 16.0], 5.0);
        let engine = EvolutionEngine::new(strategy, challenge);
        let stats = engine.run().unwrap();
        assert_eq!(stats.len(), 5);
    }
}
