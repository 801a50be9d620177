use ndarray::{linalg, prelude::*};
use serde::{Deserialize, Serialize};

use crate::activations::ActFn;

/// A dense layer: an affine transform plus an optional activation.
///
/// Points are coordinate-major (`dim × samples`), so a weight matrix of
/// `fan_in × fan_out` maps `weights[[src, dst]]` from source to destination
/// neuron and the forward pass computes `wᵀ·x + b` column by column.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DenseLayer {
    weights: Array2<f32>,
    biases: Array1<f32>,
    act_fn: Option<ActFn>,
    name: Option<String>,
}

impl DenseLayer {
    /// Creates a new `DenseLayer` from explicit parameters.
    ///
    /// # Arguments
    /// * `weights` - A `fan_in × fan_out` weight matrix.
    /// * `biases` - A bias vector of length `fan_out`.
    /// * `act_fn` - The activation to apply, or `None` for a plain affine layer.
    pub fn new(weights: Array2<f32>, biases: Array1<f32>, act_fn: Option<ActFn>) -> Self {
        Self {
            weights,
            biases,
            act_fn,
            name: None,
        }
    }

    /// Creates a zero-initialized `fan_in × fan_out` layer.
    pub fn zeros(fan_in: usize, fan_out: usize, act_fn: Option<ActFn>) -> Self {
        Self::new(Array2::zeros((fan_in, fan_out)), Array1::zeros(fan_out), act_fn)
    }

    /// Attaches a display name to the layer.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn fan_in(&self) -> usize {
        self.weights.nrows()
    }

    pub fn fan_out(&self) -> usize {
        self.weights.ncols()
    }

    pub fn weights(&self) -> &Array2<f32> {
        &self.weights
    }

    pub fn biases(&self) -> &Array1<f32> {
        &self.biases
    }

    pub fn act_fn(&self) -> Option<ActFn> {
        self.act_fn
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether `biases` matches the weight matrix's fan-out.
    pub(crate) fn is_consistent(&self) -> bool {
        self.biases.len() == self.weights.ncols()
    }

    pub(crate) fn set_params(&mut self, weights: Array2<f32>, biases: Array1<f32>) {
        self.weights = weights;
        self.biases = biases;
    }

    /// Pushes a batch of points through the layer.
    ///
    /// # Arguments
    /// * `x` - Input points, `fan_in × samples`.
    ///
    /// # Returns
    /// The transformed points, `fan_out × samples`.
    pub fn forward(&self, x: ArrayView2<f32>) -> Array2<f32> {
        let mut z = Array2::zeros((self.fan_out(), x.ncols()));
        linalg::general_mat_mul(1.0, &self.weights.t(), &x, 0.0, &mut z);
        z += &self.biases.view().insert_axis(Axis(1));

        if let Some(act_fn) = self.act_fn {
            z.mapv_inplace(|v| act_fn.f(v));
        }

        z
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn forward_applies_affine_transform() {
        let layer = DenseLayer::new(
            array![[1.0, 0.0], [0.0, 2.0]],
            array![1.0, -1.0],
            None,
        );

        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let y = layer.forward(x.view());

        assert_eq!(y, array![[2.0, 3.0], [5.0, 7.0]]);
    }

    #[test]
    fn forward_applies_activation() {
        let layer = DenseLayer::new(array![[1.0]], array![0.0], Some(ActFn::Relu));

        let x = array![[-2.0, 3.0]];
        let y = layer.forward(x.view());

        assert_eq!(y, array![[0.0, 3.0]]);
    }

    #[test]
    fn forward_handles_empty_batch() {
        let layer = DenseLayer::zeros(2, 3, None);
        let x = Array2::zeros((2, 0));

        let y = layer.forward(x.view());
        assert_eq!(y.shape(), [3, 0]);
    }
}
