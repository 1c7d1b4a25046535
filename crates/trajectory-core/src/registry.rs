// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Multi-Sequence Trajectory Registry
// ─────────────────────────────────────────────────────────────────────
//! Keeps one [`TrajectoryTracker`] per active generation sequence so
//! that a serving boundary can score many sequences concurrently.
//!
//! Thread-safe: the id → tracker map and each tracker sit behind their
//! own `parking_lot::Mutex`. The map lock is released before a tracker
//! is stepped, so independent sequences never wait on each other's
//! arithmetic.
//!
//! Lock order is tracker, then map. A step re-checks membership under
//! its tracker lock, so once `close` has removed an id every later step
//! fails, and every step that succeeded appears in the returned trace.

use std::collections::HashMap;
use std::sync::Arc;

use ndarray::{Array2, ArrayD};
use parking_lot::Mutex;

use trajectory_types::score::TrajectoryTrace;
use trajectory_types::{TrajectoryConfig, TrajectoryError, TrajectoryResult, TrajectoryScores};

use crate::tracker::{StepOutcome, TrajectoryTracker};

type SharedTracker = Arc<Mutex<TrajectoryTracker>>;

pub struct TrajectoryRegistry {
    config: TrajectoryConfig,
    sequences: Mutex<HashMap<u64, SharedTracker>>,
}

impl TrajectoryRegistry {
    pub fn new(config: TrajectoryConfig) -> TrajectoryResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sequences: Mutex::new(HashMap::new()),
        })
    }

    /// Start tracking sequence `id`. Re-opening an id replaces its tracker.
    pub fn open(&self, id: u64, context: Option<Array2<f64>>) -> TrajectoryResult<()> {
        let mut tracker = TrajectoryTracker::new(self.config.clone())?;
        tracker.set_context(context);
        let replaced = self
            .sequences
            .lock()
            .insert(id, Arc::new(Mutex::new(tracker)))
            .is_some();
        if replaced {
            log::info!("sequence {id} re-opened, previous trajectory discarded");
        } else {
            log::debug!("sequence {id} opened");
        }
        Ok(())
    }

    fn tracker(&self, id: u64) -> TrajectoryResult<SharedTracker> {
        self.sequences
            .lock()
            .get(&id)
            .cloned()
            .ok_or(TrajectoryError::UnknownSequence(id))
    }

    /// Run `f` on `shared` only while it is still the tracker for `id`.
    fn run_on<T>(
        &self,
        id: u64,
        shared: &SharedTracker,
        f: impl FnOnce(&mut TrajectoryTracker) -> TrajectoryResult<T>,
    ) -> TrajectoryResult<T> {
        let mut tracker = shared.lock();
        let live = self
            .sequences
            .lock()
            .get(&id)
            .is_some_and(|current| Arc::ptr_eq(current, shared));
        if !live {
            log::debug!("sequence {id} closed or replaced before its step ran");
            return Err(TrajectoryError::UnknownSequence(id));
        }
        f(&mut tracker)
    }

    pub fn observe(&self, id: u64, hidden: &[ArrayD<f64>]) -> TrajectoryResult<TrajectoryScores> {
        let shared = self.tracker(id)?;
        self.run_on(id, &shared, |tracker| tracker.observe(hidden))
    }

    pub fn step(
        &self,
        id: u64,
        hidden: &[ArrayD<f64>],
        logits: &ArrayD<f64>,
    ) -> TrajectoryResult<StepOutcome> {
        let shared = self.tracker(id)?;
        self.run_on(id, &shared, |tracker| tracker.step(hidden, logits))
    }

    /// Stop tracking `id` and hand back its trace.
    pub fn close(&self, id: u64) -> TrajectoryResult<TrajectoryTrace> {
        let tracker = self
            .sequences
            .lock()
            .remove(&id)
            .ok_or(TrajectoryError::UnknownSequence(id))?;
        let trace = tracker.lock().trace().clone();
        log::debug!("sequence {id} closed after {} steps", trace.len());
        Ok(trace)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.sequences.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sequences.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.lock().is_empty()
    }

    pub fn config(&self) -> &TrajectoryConfig {
        &self.config
    }
}
