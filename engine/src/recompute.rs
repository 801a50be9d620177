use std::sync::Arc;

use log::{debug, info, warn};
use ndarray::prelude::*;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;

use model::Network;

use crate::{
    error::{EngineErr, Result},
    geometry::{Polygon, PolygonImage},
    state::{LayerState, unique_names},
};

/// Default per-axis subdivision count for the reference grid.
const POLYGON_SEGMENTS: usize = 5;

/// The dirty frontier of a recompute pass: only layers strictly beyond it
/// are recomputed. `Frontier::FULL` treats every active layer as dirty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frontier(Option<usize>);

impl Frontier {
    pub const FULL: Frontier = Frontier(None);

    pub fn at(layer: usize) -> Self {
        Self(Some(layer))
    }

    pub fn covers(&self, layer: usize) -> bool {
        match self.0 {
            None => true,
            Some(start) => layer > start,
        }
    }

    pub fn start(&self) -> Option<usize> {
        self.0
    }
}

/// The ordered set of currently rendered layer indices.
///
/// Owned by the engine; membership changes only through the engine's
/// show/hide operations.
#[derive(Clone, Debug, Default)]
pub struct ActiveLayerSet {
    order: Vec<usize>,
}

impl ActiveLayerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a layer in display order; a no-op on duplicates.
    pub fn add(&mut self, layer: usize) -> bool {
        if self.order.contains(&layer) {
            return false;
        }
        self.order.push(layer);
        true
    }

    pub fn remove(&mut self, layer: usize) -> bool {
        let before = self.order.len();
        self.order.retain(|&l| l != layer);
        self.order.len() != before
    }

    pub fn contains(&self, layer: usize) -> bool {
        self.order.contains(&layer)
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.order.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// The narrow interface the display surface implements; the engine never
/// touches widget state directly.
///
/// Sink methods are called with the engine locked and must not call back
/// into engine or coordinator APIs.
pub trait DisplaySink: Send + Sync {
    /// A layer's display frame changed and should be redrawn.
    fn redraw(&self, _layer: usize) {}

    /// A layer's cached inspector statistics may be stale.
    fn refresh_inspector(&self, _layer: usize) {}

    /// A layer's recompute failed; its display keeps the previous data.
    fn recompute_failed(&self, _layer: usize, _err: &EngineErr) {}
}

/// A sink that ignores every notification.
pub struct NullSink;

impl DisplaySink for NullSink {}

/// The outcome of one recompute pass.
#[derive(Clone, Debug)]
pub struct PassSummary {
    pub frontier: Frontier,
    pub recomputed: Vec<usize>,
    pub failed: Vec<usize>,
}

/// Owns the per-layer states and the active set, and recomputes forward
/// activations from the dirty frontier onward.
///
/// Lock order: the engine's own mutex (held by callers) before any layer's
/// `RwLock`; layer locks are only held briefly for whole-value swaps so
/// renderers reading a layer never wait on a recompute.
pub struct RecomputeEngine {
    network: Network,
    layers: Vec<Arc<RwLock<LayerState>>>,
    active: ActiveLayerSet,
    input: Arc<Array2<f32>>,
    labels: Vec<String>,
    polygon: Option<PolygonImage>,
    sink: Arc<dyn DisplaySink>,
}

impl RecomputeEngine {
    /// Creates an engine for a loaded network.
    pub fn new(network: Network, sink: Arc<dyn DisplaySink>) -> Self {
        let mut engine = Self {
            input: Arc::new(Array2::zeros((network.input_dimension(), 0))),
            network,
            layers: Vec::new(),
            active: ActiveLayerSet::new(),
            labels: Vec::new(),
            polygon: None,
            sink,
        };
        engine.rebuild();
        engine
    }

    /// Replaces the loaded network, resetting every layer state.
    ///
    /// Idempotent and safe to call repeatedly; previously loaded points and
    /// the polygon are discarded. Any `ChangeCoordinator` attached to this
    /// engine must be shut down first so a stale pass cannot observe the
    /// torn-down layers.
    pub fn initialize(&mut self, network: Network) {
        self.network = network;
        self.rebuild();
    }

    fn rebuild(&mut self) {
        let widths = self.network.widths();
        let names = unique_names((0..widths.len()).map(|i| {
            if i == 0 {
                "Layer0".to_string()
            } else {
                self.network
                    .layer_name(i - 1)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Layer{i}"))
            }
        }));

        self.layers = widths
            .iter()
            .zip(names)
            .enumerate()
            .map(|(i, (&width, name))| Arc::new(RwLock::new(LayerState::new(i, name, width))))
            .collect();
        self.active = ActiveLayerSet::new();
        self.input = Arc::new(Array2::zeros((self.network.input_dimension(), 0)));
        self.labels = Vec::new();
        self.polygon = None;

        info!("initialized {} layer boundaries", self.layers.len());
    }

    pub fn boundary_count(&self) -> usize {
        self.layers.len()
    }

    pub fn input_dimension(&self) -> usize {
        self.network.input_dimension()
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn input_points(&self) -> &Arc<Array2<f32>> {
        &self.input
    }

    pub fn active(&self) -> &ActiveLayerSet {
        &self.active
    }

    /// Returns the shared handle for one layer's state.
    pub fn layer(&self, layer: usize) -> Option<Arc<RwLock<LayerState>>> {
        self.layers.get(layer).cloned()
    }

    pub fn layers(&self) -> &[Arc<RwLock<LayerState>>] {
        &self.layers
    }

    /// Makes a layer participate in recompute and broadcast, refreshing its
    /// coordinates immediately when points are loaded.
    pub fn show_layer(&mut self, layer: usize) -> Result<()> {
        if layer >= self.layers.len() {
            return Err(EngineErr::LayerOutOfRange {
                got: layer,
                count: self.layers.len(),
            });
        }
        if !self.active.add(layer) {
            return Ok(());
        }

        self.layers[layer].write().set_visible(true);

        if self.input.ncols() > 0 {
            match self.compute_layer(layer) {
                Ok((points, polygon)) => {
                    let mut state = self.layers[layer].write();
                    state.set_points(points);
                    state.set_polygon(polygon);
                    state.mark_stale(false);
                    state.apply_changes();
                }
                Err(e) => {
                    warn!("refresh failed while showing layer {layer}: {e}");
                    self.layers[layer].write().mark_stale(true);
                    self.sink.recompute_failed(layer, &e);
                }
            }
        } else {
            self.layers[layer].write().apply_changes();
        }

        self.sink.redraw(layer);
        Ok(())
    }

    /// Removes a layer from recompute and broadcast; its state is kept so
    /// showing it again is cheap.
    pub fn hide_layer(&mut self, layer: usize) {
        if self.active.remove(layer) {
            if let Some(state) = self.layers.get(layer) {
                state.write().set_visible(false);
            }
        }
    }

    /// Loads a fresh point set, rebuilding the reference polygon and fully
    /// recomputing every active layer.
    ///
    /// On a width mismatch the previously loaded points stay in effect.
    pub fn load_points(&mut self, points: Array2<f32>, labels: Vec<String>) -> Result<PassSummary> {
        let expected = self.network.input_dimension();
        if points.nrows() != expected {
            return Err(EngineErr::DimensionMismatch {
                got: points.nrows(),
                expected,
            });
        }

        info!("loaded {} points of dimension {}", points.ncols(), points.nrows());
        self.input = Arc::new(points);
        self.labels = labels;

        let dim = expected;
        self.polygon = (matches!(dim, 2 | 3) && self.input.ncols() > 0).then(|| {
            Polygon::from_points(self.input.view(), &vec![POLYGON_SEGMENTS; dim]).into_image()
        });

        let summary = self.recompute(Frontier::FULL);
        self.broadcast_changes(Frontier::FULL);
        Ok(summary)
    }

    /// Appends a single sample to the input set and fully recomputes.
    pub fn add_point(&mut self, cords: &[f32], label: impl Into<String>) -> Result<PassSummary> {
        let dim = self.network.input_dimension();
        if cords.len() != dim {
            return Err(EngineErr::DimensionMismatch {
                got: cords.len(),
                expected: dim,
            });
        }

        let samples = self.input.ncols();
        let mut extended = Array2::zeros((dim, samples + 1));
        extended.slice_mut(s![.., ..samples]).assign(&self.input);
        for (axis, &value) in cords.iter().enumerate() {
            extended[[axis, samples]] = value;
        }

        self.input = Arc::new(extended);
        self.labels.push(label.into());

        let summary = self.recompute(Frontier::FULL);
        self.broadcast_changes(Frontier::FULL);
        Ok(summary)
    }

    /// Pushes edited parameters into the network.
    ///
    /// A shape mismatch leaves the network untouched, per the slider
    /// no-commit policy.
    pub fn set_layer_params(
        &mut self,
        layer: usize,
        weights: Array2<f32>,
        biases: Array1<f32>,
    ) -> Result<()> {
        self.network.set_weights(layer, weights, biases)?;
        Ok(())
    }

    /// Recomputes forward activations for every active layer beyond the
    /// frontier, one parallel task per layer, all joined before returning.
    ///
    /// A failing layer is marked stale and reported through the sink; the
    /// other layers of the pass are unaffected.
    pub fn recompute(&self, frontier: Frontier) -> PassSummary {
        let targets: Vec<usize> = self.active.iter().filter(|&l| frontier.covers(l)).collect();
        debug!("recompute pass from {frontier:?} over {targets:?}");

        let results: Vec<_> = targets
            .par_iter()
            .map(|&layer| (layer, self.compute_layer(layer)))
            .collect();

        let mut summary = PassSummary {
            frontier,
            recomputed: Vec::new(),
            failed: Vec::new(),
        };

        for (layer, result) in results {
            match result {
                Ok((points, polygon)) => {
                    let mut state = self.layers[layer].write();
                    state.set_points(points);
                    state.set_polygon(polygon);
                    state.mark_stale(false);
                    summary.recomputed.push(layer);
                }
                Err(e) => {
                    warn!("recompute failed for layer {layer}: {e}");
                    self.layers[layer].write().mark_stale(true);
                    self.sink.recompute_failed(layer, &e);
                    summary.failed.push(layer);
                }
            }
        }

        summary
    }

    /// Re-derives display data and notifies the surface for every active
    /// layer beyond the frontier.
    pub fn broadcast_changes(&self, frontier: Frontier) {
        for layer in self.active.iter().filter(|&l| frontier.covers(l)) {
            self.layers[layer].write().apply_changes();
            self.sink.redraw(layer);
            self.sink.refresh_inspector(layer);
        }
    }

    /// One layer's forward activations, plus the polygon image when the
    /// layer displays it.
    fn compute_layer(&self, layer: usize) -> Result<(Arc<Array2<f32>>, Option<PolygonImage>)> {
        let points = self
            .network
            .activations_up_to(self.input.view(), layer)
            .map_err(|e| EngineErr::Recompute {
                layer,
                reason: e.to_string(),
            })?;

        if points.iter().any(|v| !v.is_finite()) {
            return Err(EngineErr::Recompute {
                layer,
                reason: "non-finite activations".to_string(),
            });
        }

        let polygon = match &self.polygon {
            Some(source) if self.layers[layer].read().config.show_polygon => {
                let vertices = self
                    .network
                    .activations_up_to(source.vertices.view(), layer)
                    .map_err(|e| EngineErr::Recompute {
                        layer,
                        reason: e.to_string(),
                    })?;
                Some(PolygonImage {
                    vertices: Arc::new(vertices),
                    edges: Arc::clone(&source.edges),
                })
            }
            _ => None,
        };

        Ok((Arc::new(points), polygon))
    }

    /// Wraps the engine for sharing between the display surface and the
    /// change coordinator's worker.
    pub fn into_shared(self) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(self))
    }
}
