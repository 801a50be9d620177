use std::{collections::HashMap, sync::Arc};

use ndarray::prelude::*;

use crate::{
    geometry::PolygonImage,
    reduction::{self, ReductionMethod},
};

/// Per-layer display options.
///
/// One explicit record per layer instead of a free-form option map; every
/// field has a typed home and `method` carries its own sub-configuration.
#[derive(Clone, Debug)]
pub struct DisplayConfig {
    /// Raw coordinate axes to display (at most 3, clipped to the layer width).
    pub visible_cords: Vec<usize>,
    pub axis_labels: Vec<String>,
    pub draw_3d: bool,
    /// Preserve camera/zoom across redraws.
    pub locked_view: bool,
    pub show_polygon: bool,
    pub method: ReductionMethod,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            visible_cords: Vec::new(),
            axis_labels: Vec::new(),
            draw_3d: false,
            locked_view: true,
            show_polygon: true,
            method: ReductionMethod::None,
        }
    }
}

/// A line segment between two displayed polygon vertices; unused trailing
/// axes are zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub start: [f32; 3],
    pub end: [f32; 3],
}

/// What a renderer actually draws for one layer: display coordinates plus
/// polygon segments restricted to the visible axes.
#[derive(Clone, Debug)]
pub struct DisplayFrame {
    /// Display coordinates, `k × samples` with `2 <= k <= 3` when samples
    /// are present.
    pub cords: Array2<f32>,
    pub segments: Vec<Segment>,
}

impl DisplayFrame {
    fn empty() -> Self {
        Self {
            cords: Array2::zeros((0, 0)),
            segments: Vec::new(),
        }
    }
}

impl Default for DisplayFrame {
    fn default() -> Self {
        Self::empty()
    }
}

/// The mutable per-layer record: current point coordinates, polygon image,
/// display configuration and the derived display frame.
///
/// Raw coordinates are replaced by whole-`Arc` swaps so a renderer holding a
/// clone never observes a half-written array.
pub struct LayerState {
    index: usize,
    name: String,
    width: usize,
    points: Arc<Array2<f32>>,
    revision: u64,
    polygon: Option<PolygonImage>,
    pub config: DisplayConfig,
    display: DisplayFrame,
    visible: bool,
    stale: bool,
}

impl LayerState {
    /// Creates an empty state for one layer boundary.
    ///
    /// # Arguments
    /// * `index` - The boundary index within the loaded network.
    /// * `name` - The layer's unique display name.
    /// * `width` - The point dimensionality at this boundary.
    pub fn new(index: usize, name: String, width: usize) -> Self {
        Self {
            index,
            name,
            width,
            points: Arc::new(Array2::zeros((width, 0))),
            revision: 0,
            polygon: None,
            config: DisplayConfig::default(),
            display: DisplayFrame::empty(),
            visible: false,
            stale: false,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn points(&self) -> &Arc<Array2<f32>> {
        &self.points
    }

    pub fn has_points(&self) -> bool {
        self.points.ncols() > 0
    }

    pub fn display(&self) -> &DisplayFrame {
        &self.display
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Whether the last recompute for this layer failed and the display
    /// shows outdated data.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn mark_stale(&mut self, stale: bool) {
        self.stale = stale;
    }

    /// Replaces the raw coordinates with a single reference swap.
    pub fn set_points(&mut self, points: Arc<Array2<f32>>) {
        self.points = points;
        self.revision += 1;
    }

    pub fn set_polygon(&mut self, polygon: Option<PolygonImage>) {
        self.polygon = polygon;
    }

    /// Re-derives the display frame from the current raw coordinates and the
    /// active reduction method.
    ///
    /// Calling this twice without an intervening `set_points` yields the
    /// same frame; PCA and t-SNE results are cached per points revision.
    pub fn apply_changes(&mut self) {
        let samples = self.points.ncols();
        if samples == 0 {
            self.display = DisplayFrame::empty();
            return;
        }

        let mut cords = match &mut self.config.method {
            ReductionMethod::None => {
                reduction::select_cords(self.points.view(), &self.config.visible_cords)
            }
            ReductionMethod::Pca(cfg) => cfg.project(self.points.view(), self.revision),
            ReductionMethod::Tsne(cfg) => cfg.embed(self.points.view(), self.revision),
        };

        // A 2-D scatter of a one-dimensional layer gets a constant zero y.
        if cords.nrows() == 1 {
            let mut padded = Array2::zeros((2, samples));
            padded.row_mut(0).assign(&cords.row(0));
            cords = padded;
        }

        // The polygon's post-transform shape is only meaningful for the
        // identity method.
        let segments = match &self.config.method {
            ReductionMethod::None if self.config.show_polygon => self.polygon_segments(),
            _ => Vec::new(),
        };

        self.display = DisplayFrame { cords, segments };
    }

    fn polygon_segments(&self) -> Vec<Segment> {
        let Some(image) = &self.polygon else {
            return Vec::new();
        };

        let picks = reduction::pick_axes(self.width, &self.config.visible_cords);
        let vertices = &image.vertices;

        image
            .edges
            .iter()
            .map(|&(a, b)| {
                let mut start = [0.0; 3];
                let mut end = [0.0; 3];
                for (slot, &axis) in picks.iter().enumerate() {
                    start[slot] = vertices[[axis, a]];
                    end[slot] = vertices[[axis, b]];
                }
                Segment { start, end }
            })
            .collect()
    }
}

/// Disambiguates display names by appending a counter to repeats.
pub fn unique_names(raw: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut taken: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::new();

    for name in raw {
        let count = taken.entry(name.clone()).or_insert(0);
        let mut candidate = if *count == 0 { name.clone() } else { format!("{name}{count}") };
        *count += 1;

        while taken.contains_key(&candidate) && candidate != name {
            let count = taken.get_mut(&name).expect("counter was just inserted");
            candidate = format!("{name}{count}");
            *count += 1;
        }

        taken.entry(candidate.clone()).or_insert(1);
        out.push(candidate);
    }

    out
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::{
        geometry::Polygon,
        reduction::{PcaConfig, ReductionMethod},
    };

    fn state_with_points(points: Array2<f32>) -> LayerState {
        let mut state = LayerState::new(0, "Layer0".to_string(), points.nrows());
        state.set_points(Arc::new(points));
        state
    }

    #[test]
    fn apply_changes_is_idempotent() {
        let mut state = state_with_points(array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);

        state.apply_changes();
        let first = state.display().cords.clone();
        state.apply_changes();

        assert_eq!(state.display().cords, first);
    }

    #[test]
    fn one_dimensional_layers_get_a_zero_y_axis() {
        let mut state = state_with_points(array![[1.0, 2.0, 3.0]]);

        state.apply_changes();

        assert_eq!(state.display().cords.nrows(), 2);
        assert_eq!(state.display().cords.row(1), array![0.0, 0.0, 0.0]);
    }

    #[test]
    fn empty_layers_display_nothing() {
        let mut state = LayerState::new(1, "Layer1".to_string(), 3);

        state.apply_changes();

        assert!(!state.has_points());
        assert_eq!(state.display().cords.len(), 0);
        assert!(state.display().segments.is_empty());
    }

    #[test]
    fn polygon_is_dropped_under_reduction_methods() {
        let mut state = state_with_points(array![[0.0, 1.0, 2.0], [0.0, 1.0, 2.0]]);
        state.set_polygon(Some(Polygon::new(&[0.0, 0.0], &[2.0, 2.0], &[1, 1]).into_image()));

        state.apply_changes();
        assert_eq!(state.display().segments.len(), 4);

        state.config.method = ReductionMethod::Pca(PcaConfig::new(vec![0, 1]));
        state.apply_changes();
        assert!(state.display().segments.is_empty());
    }

    #[test]
    fn pca_cache_survives_method_switching() {
        let mut state = state_with_points(array![
            [1.0, 2.0, 3.0, 4.0],
            [2.0, 4.1, 5.9, 8.0],
            [0.5, 0.5, 0.6, 0.5]
        ]);

        state.config.method = ReductionMethod::Pca(PcaConfig::new(vec![0, 1]));
        state.apply_changes();
        let first = match &state.config.method {
            ReductionMethod::Pca(cfg) => cfg.percent_variance().expect("cached").to_vec(),
            _ => unreachable!(),
        };

        state.config.method = ReductionMethod::None;
        state.apply_changes();

        state.config.method = ReductionMethod::Pca(PcaConfig::new(vec![0, 1]));
        state.apply_changes();
        let second = match &state.config.method {
            ReductionMethod::Pca(cfg) => cfg.percent_variance().expect("cached").to_vec(),
            _ => unreachable!(),
        };

        assert_eq!(first, second);
    }

    #[test]
    fn visible_cords_are_clipped() {
        let mut state = state_with_points(array![[1.0, 2.0], [3.0, 4.0]]);
        state.config.visible_cords = vec![1, 7];

        state.apply_changes();

        // Only axis 1 survives clipping, padded with the zero y axis.
        assert_eq!(state.display().cords.row(0), array![3.0, 4.0]);
        assert_eq!(state.display().cords.row(1), array![0.0, 0.0]);
    }

    #[test]
    fn repeated_names_get_counter_suffixes() {
        let names = unique_names(
            ["dense", "dense", "output", "dense"].map(String::from),
        );

        assert_eq!(names, ["dense", "dense1", "output", "dense2"]);
    }
}
