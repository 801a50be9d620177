use std::{env, error::Error, sync::Arc};

use log::{debug, info, warn};
use ndarray::array;

use engine::{ChangeCoordinator, DisplaySink, EngineErr, ParamEdit, RecomputeEngine, ingest};
use model::{ActFn, DenseLayer, Network};

/// Forwards engine notifications to the log; stands in for the GUI surface.
struct LogSink;

impl DisplaySink for LogSink {
    fn redraw(&self, layer: usize) {
        debug!("redraw layer {layer}");
    }

    fn refresh_inspector(&self, layer: usize) {
        debug!("inspector stats for layer {layer} may be stale");
    }

    fn recompute_failed(&self, layer: usize, err: &EngineErr) {
        warn!("layer {layer} keeps stale data: {err}");
    }
}

fn demo_network() -> Result<Network, Box<dyn Error>> {
    Ok(Network::new(vec![
        DenseLayer::zeros(2, 2, Some(ActFn::Sigmoid)).named("hidden"),
        DenseLayer::zeros(2, 1, None).named("output"),
    ])?)
}

fn demo_points() -> (ndarray::Array2<f32>, Vec<String>) {
    let points = array![[0.0, 1.0, 0.0, 1.0], [0.0, 0.0, 1.0, 1.0]];
    let labels = ["a", "b", "b", "a"].map(String::from).to_vec();
    (points, labels)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let network = match env::var("MODEL") {
        Ok(path) => {
            info!("loading model from {path}");
            Network::load(path)?
        }
        Err(_) => demo_network()?,
    };

    let engine = RecomputeEngine::new(network, Arc::new(LogSink)).into_shared();

    let (base_weights, base_biases) = {
        let mut engine = engine.lock();

        let (points, labels) = match env::var("POINTS") {
            Ok(path) => {
                info!("loading points from {path}");
                ingest::load_points_file(&path, engine.input_dimension())?
            }
            Err(_) => demo_points(),
        };

        for layer in 0..engine.boundary_count() {
            engine.show_layer(layer)?;
        }
        engine.load_points(points, labels)?;

        let (weights, biases) = engine.network().weights(0)?;
        (weights.clone(), biases.clone())
    };

    let mut coordinator = ChangeCoordinator::spawn(Arc::clone(&engine))?;

    // A scripted drag of the first weight slider; rapid steps coalesce into
    // fewer recompute passes.
    for step in 1..=8 {
        let mut weights = base_weights.clone();
        weights[[0, 0]] = step as f32 * 0.125;
        coordinator.submit_edit(ParamEdit {
            layer: 0,
            weights,
            biases: base_biases.clone(),
        });
    }
    coordinator.wait_idle();

    for summary in coordinator.summaries() {
        info!(
            "pass from {:?}: recomputed {:?}, failed {:?}",
            summary.frontier.start(),
            summary.recomputed,
            summary.failed
        );
    }

    {
        let engine = engine.lock();
        for handle in engine.layers() {
            let layer = handle.read();
            let frame = layer.display();
            info!(
                "{}: {} samples x {} display axes, {} polygon segments{}",
                layer.name(),
                frame.cords.ncols(),
                frame.cords.nrows(),
                frame.segments.len(),
                if layer.is_stale() { " (stale)" } else { "" }
            );
        }
    }

    coordinator.shutdown();
    Ok(())
}
