use std::sync::Arc;

use ndarray::prelude::*;

/// A rectilinear reference grid over the input space.
///
/// The grid is forward-propagated layer by layer to visualize how the
/// network warps space; the vertex layout is row-major with the last axis
/// fastest, and edges connect each vertex to its `+1` neighbour along every
/// axis (no wraparound, no diagonals).
#[derive(Clone, Debug)]
pub struct Polygon {
    vertices: Array2<f32>,
    edges: Vec<(usize, usize)>,
}

/// One layer's view of the grid: the forward image of the vertices plus the
/// shared edge list.
#[derive(Clone)]
pub struct PolygonImage {
    pub vertices: Arc<Array2<f32>>,
    pub edges: Arc<Vec<(usize, usize)>>,
}

impl Polygon {
    /// Builds a grid over the box `lower..upper`.
    ///
    /// # Arguments
    /// * `lower` - Per-axis lower bounds.
    /// * `upper` - Per-axis upper bounds; equal bounds on an axis are allowed
    ///   and yield zero-length edges along it.
    /// * `segments` - Per-axis subdivision counts, clamped to at least 1.
    pub fn new(lower: &[f32], upper: &[f32], segments: &[usize]) -> Self {
        let dims = lower.len();
        let counts: Vec<usize> = segments.iter().map(|&s| s.max(1) + 1).collect();
        let total: usize = counts.iter().product();

        let mut strides = vec![1; dims];
        for axis in (0..dims.saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * counts[axis + 1];
        }

        let mut vertices = Array2::zeros((dims, total));
        for flat in 0..total {
            for axis in 0..dims {
                let i = (flat / strides[axis]) % counts[axis];
                let t = i as f32 / (counts[axis] - 1) as f32;
                vertices[[axis, flat]] = lower[axis] + t * (upper[axis] - lower[axis]);
            }
        }

        let mut edges = Vec::new();
        for flat in 0..total {
            for axis in 0..dims {
                let i = (flat / strides[axis]) % counts[axis];
                if i + 1 < counts[axis] {
                    edges.push((flat, flat + strides[axis]));
                }
            }
        }

        Self { vertices, edges }
    }

    /// Builds a grid bounded by the per-axis min/max of a point cloud.
    ///
    /// # Arguments
    /// * `points` - The data, `dim × samples`; must have at least one sample.
    /// * `segments` - Per-axis subdivision counts.
    pub fn from_points(points: ArrayView2<f32>, segments: &[usize]) -> Self {
        let mut lower = Vec::with_capacity(points.nrows());
        let mut upper = Vec::with_capacity(points.nrows());

        for row in points.rows() {
            lower.push(row.iter().copied().fold(f32::INFINITY, f32::min));
            upper.push(row.iter().copied().fold(f32::NEG_INFINITY, f32::max));
        }

        Self::new(&lower, &upper, segments)
    }

    pub fn dims(&self) -> usize {
        self.vertices.nrows()
    }

    pub fn vertices(&self) -> ArrayView2<f32> {
        self.vertices.view()
    }

    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    /// Converts the grid into the shareable per-layer form, with the
    /// untransformed vertices as the identity image.
    pub fn into_image(self) -> PolygonImage {
        PolygonImage {
            vertices: Arc::new(self.vertices),
            edges: Arc::new(self.edges),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_by_two_grid_has_nine_vertices_and_twelve_edges() {
        let polygon = Polygon::new(&[0.0, 0.0], &[10.0, 10.0], &[2, 2]);

        assert_eq!(polygon.vertices().ncols(), 9);
        assert_eq!(polygon.edges().len(), 12);
    }

    #[test]
    fn unit_cube_has_eight_vertices_and_twelve_edges() {
        let polygon = Polygon::new(&[0.0, 0.0, 0.0], &[1.0, 1.0, 1.0], &[1, 1, 1]);

        assert_eq!(polygon.dims(), 3);
        assert_eq!(polygon.vertices().ncols(), 8);
        assert_eq!(polygon.edges().len(), 12);
    }

    #[test]
    fn zero_segments_are_clamped_to_one() {
        let polygon = Polygon::new(&[0.0, 0.0], &[1.0, 1.0], &[0, 0]);

        assert_eq!(polygon.vertices().ncols(), 4);
        assert_eq!(polygon.edges().len(), 4);
    }

    #[test]
    fn vertices_span_the_bounds() {
        let polygon = Polygon::new(&[-1.0, 2.0], &[1.0, 4.0], &[2, 2]);

        for axis in 0..2 {
            let row = polygon.vertices().row(axis).to_owned();
            let min = row.iter().copied().fold(f32::INFINITY, f32::min);
            let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            assert_eq!((min, max), ([-1.0, 2.0][axis], [1.0, 4.0][axis]));
        }
    }

    #[test]
    fn degenerate_bounds_yield_zero_length_edges() {
        let polygon = Polygon::new(&[0.0, 0.0], &[0.0, 5.0], &[1, 1]);

        for &(a, b) in polygon.edges() {
            let dx = polygon.vertices()[[0, a]] - polygon.vertices()[[0, b]];
            assert_eq!(dx, 0.0);
        }
    }

    #[test]
    fn bounds_derive_from_the_point_cloud() {
        let points = ndarray::array![[0.0, 4.0, 2.0], [1.0, -3.0, 0.0]];
        let polygon = Polygon::from_points(points.view(), &[1, 1]);

        let xs = polygon.vertices().row(0).to_owned();
        assert_eq!(xs.iter().copied().fold(f32::INFINITY, f32::min), 0.0);
        assert_eq!(xs.iter().copied().fold(f32::NEG_INFINITY, f32::max), 4.0);
    }
}
