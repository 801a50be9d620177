use std::{
    collections::HashMap,
    io,
    sync::Arc,
    thread::{self, JoinHandle},
};

use log::{debug, warn};
use ndarray::prelude::*;
use parking_lot::{Condvar, Mutex};

use crate::{
    queue::ChangeQueue,
    recompute::{Frontier, PassSummary, RecomputeEngine},
};

/// A staged parameter edit: the full weight/bias snapshot for one layer.
///
/// The surface thread never touches the network; it stages intents here and
/// the worker flushes them before the next recompute pass. For one layer,
/// the latest staged edit wins.
#[derive(Clone, Debug)]
pub struct ParamEdit {
    pub layer: usize,
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
}

struct QueueState {
    queue: ChangeQueue,
    edits: HashMap<usize, ParamEdit>,
    running: bool,
    busy: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    wake: Condvar,
    idle: Condvar,
    engine: Arc<Mutex<RecomputeEngine>>,
    summaries: Mutex<Vec<PassSummary>>,
}

/// Serializes bursts of edit signals into single recompute passes.
///
/// One dedicated background worker per loaded model waits on a condition
/// variable, drains the coalescing queue, flushes staged edits into the
/// network and runs recompute + broadcast from the minimum drained index.
/// At most one pass runs at a time and no signaled edit is dropped.
pub struct ChangeCoordinator {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl ChangeCoordinator {
    /// Spawns the worker thread for a loaded model.
    pub fn spawn(engine: Arc<Mutex<RecomputeEngine>>) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                queue: ChangeQueue::new(),
                edits: HashMap::new(),
                running: true,
                busy: false,
            }),
            wake: Condvar::new(),
            idle: Condvar::new(),
            engine,
            summaries: Mutex::new(Vec::new()),
        });

        let worker = thread::Builder::new().name("recompute-worker".to_string()).spawn({
            let shared = Arc::clone(&shared);
            move || worker_loop(&shared)
        })?;

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Marks a layer's parameters dirty and wakes the worker.
    ///
    /// Never blocks on recompute; duplicate signals before the worker wakes
    /// coalesce into one pass.
    pub fn signal_change(&self, layer: usize) {
        let mut state = self.shared.state.lock();
        state.queue.add(layer);
        self.shared.wake.notify_one();
    }

    /// Stages a parameter edit and signals the change.
    pub fn submit_edit(&self, edit: ParamEdit) {
        let mut state = self.shared.state.lock();
        state.queue.add(edit.layer);
        state.edits.insert(edit.layer, edit);
        self.shared.wake.notify_one();
    }

    /// Blocks until every signaled change has been processed.
    pub fn wait_idle(&self) {
        let mut state = self.shared.state.lock();
        while state.running && (state.busy || !state.queue.is_empty()) {
            self.shared.idle.wait(&mut state);
        }
    }

    /// The summaries of every completed pass, oldest first.
    pub fn summaries(&self) -> Vec<PassSummary> {
        self.shared.summaries.lock().clone()
    }

    /// Stops the worker: flips the running flag, wakes the worker even if
    /// the queue is empty, and joins it.
    ///
    /// Must be called before tearing down or replacing the model so a stale
    /// pass cannot outlive it.
    pub fn shutdown(&mut self) {
        {
            let mut state = self.shared.state.lock();
            if !state.running {
                return;
            }
            state.running = false;
        }
        self.shared.wake.notify_all();
        self.shared.idle.notify_all();

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("recompute worker terminated abnormally");
            }
        }
    }
}

impl Drop for ChangeCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let (drained, edits) = {
            let mut state = shared.state.lock();
            loop {
                if !state.running {
                    state.busy = false;
                    shared.idle.notify_all();
                    return;
                }
                if !state.queue.is_empty() {
                    break;
                }
                shared.wake.wait(&mut state);
            }

            state.busy = true;
            let drained = state.queue.drain();
            let edits: Vec<ParamEdit> = drained
                .iter()
                .filter_map(|layer| state.edits.remove(layer))
                .collect();
            (drained, edits)
        };

        let Some(&start) = drained.first() else {
            continue;
        };
        let frontier = Frontier::at(start);
        debug!(start = start, coalesced = drained.len(); "draining change queue");

        let summary = {
            let mut engine = shared.engine.lock();

            for edit in edits {
                if let Err(e) = engine.set_layer_params(edit.layer, edit.weights, edit.biases) {
                    // The slider value is simply not committed.
                    warn!("rejected edit on layer {}: {e}", edit.layer);
                }
            }

            let summary = engine.recompute(frontier);
            engine.broadcast_changes(frontier);
            summary
        };

        shared.summaries.lock().push(summary);

        let mut state = shared.state.lock();
        state.busy = false;
        if state.queue.is_empty() {
            shared.idle.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recompute::NullSink;
    use model::{DenseLayer, Network};

    fn shared_engine() -> Arc<Mutex<RecomputeEngine>> {
        let network =
            Network::new(vec![DenseLayer::zeros(2, 2, None), DenseLayer::zeros(2, 1, None)])
                .unwrap();
        RecomputeEngine::new(network, Arc::new(NullSink)).into_shared()
    }

    #[test]
    fn shutdown_returns_with_an_empty_queue() {
        let mut coordinator = ChangeCoordinator::spawn(shared_engine()).unwrap();
        coordinator.shutdown();
        assert!(coordinator.worker.is_none());
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut coordinator = ChangeCoordinator::spawn(shared_engine()).unwrap();
        coordinator.shutdown();
        coordinator.shutdown();
    }

    #[test]
    fn wait_idle_returns_after_shutdown() {
        let mut coordinator = ChangeCoordinator::spawn(shared_engine()).unwrap();
        coordinator.shutdown();
        coordinator.wait_idle();
    }
}
