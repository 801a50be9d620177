use std::{fs::File, io::BufReader, io::BufWriter, path::Path};

use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{DenseLayer, ModelErr, Result};

/// An ordered stack of dense layers.
///
/// This is the opaque network collaborator the engine pushes parameters into
/// and pulls truncated forward activations out of; it performs no training.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Network {
    layers: Vec<DenseLayer>,
}

impl Network {
    /// Creates a new `Network`, validating that the layer chain is coherent.
    ///
    /// # Arguments
    /// * `layers` - The dense layers, input side first.
    ///
    /// # Returns
    /// A new `Network`, or an error if a layer's biases disagree with its
    /// weights or consecutive layers disagree on fan-in/fan-out.
    pub fn new(layers: Vec<DenseLayer>) -> Result<Self> {
        let network = Self { layers };
        network.validate()?;
        Ok(network)
    }

    fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(ModelErr::EmptyNetwork);
        }

        for (i, layer) in self.layers.iter().enumerate() {
            if !layer.is_consistent() {
                return Err(ModelErr::ParameterShape {
                    layer: i,
                    got: (layer.fan_in(), layer.fan_out(), layer.biases().len()),
                    expected: (layer.fan_in(), layer.fan_out(), layer.fan_out()),
                });
            }

            if i > 0 {
                let upstream_out = self.layers[i - 1].fan_out();
                if layer.fan_in() != upstream_out {
                    return Err(ModelErr::BrokenChain {
                        layer: i,
                        fan_in: layer.fan_in(),
                        upstream_out,
                    });
                }
            }
        }

        Ok(())
    }

    /// Returns the number of dense layers.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Returns the network's declared input width.
    pub fn input_dimension(&self) -> usize {
        self.layers[0].fan_in()
    }

    /// Returns the point width at every layer boundary.
    ///
    /// Index `0` is the input width, index `i` the output width of layer
    /// `i - 1`; the result has `layer_count() + 1` entries.
    pub fn widths(&self) -> Vec<usize> {
        let mut widths = Vec::with_capacity(self.layers.len() + 1);
        widths.push(self.input_dimension());
        widths.extend(self.layers.iter().map(|layer| layer.fan_out()));
        widths
    }

    /// Returns the display name declared for a layer, if any.
    pub fn layer_name(&self, layer: usize) -> Option<&str> {
        self.layers.get(layer).and_then(|l| l.name())
    }

    /// Returns a layer's current weights and biases.
    pub fn weights(&self, layer: usize) -> Result<(&Array2<f32>, &Array1<f32>)> {
        let l = self.layer(layer)?;
        Ok((l.weights(), l.biases()))
    }

    /// Replaces a layer's weights and biases.
    ///
    /// The new arrays must match the layer's declared fan-in/fan-out; on a
    /// shape mismatch the model is left untouched.
    pub fn set_weights(
        &mut self,
        layer: usize,
        weights: Array2<f32>,
        biases: Array1<f32>,
    ) -> Result<()> {
        let expected = {
            let l = self.layer(layer)?;
            (l.fan_in(), l.fan_out(), l.fan_out())
        };
        let got = (weights.nrows(), weights.ncols(), biases.len());

        if got != expected {
            return Err(ModelErr::ParameterShape {
                layer,
                got,
                expected,
            });
        }

        self.layers[layer].set_params(weights, biases);
        Ok(())
    }

    /// Evaluates the network truncated at a layer boundary.
    ///
    /// # Arguments
    /// * `points` - Input points, `input_dimension() × samples`.
    /// * `layer` - The boundary: `0` returns the points unchanged, `i` the
    ///   output of layer `i - 1`.
    ///
    /// # Returns
    /// The transformed points, `widths()[layer] × samples`.
    pub fn activations_up_to(&self, points: ArrayView2<f32>, layer: usize) -> Result<Array2<f32>> {
        if layer > self.layers.len() {
            return Err(ModelErr::LayerOutOfRange {
                got: layer,
                count: self.layers.len(),
            });
        }

        if points.nrows() != self.input_dimension() {
            return Err(ModelErr::InputWidth {
                got: points.nrows(),
                expected: self.input_dimension(),
            });
        }

        let mut x = points.to_owned();
        for l in &self.layers[..layer] {
            x = l.forward(x.view());
        }

        Ok(x)
    }

    /// Serializes the network to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Deserializes a network from a JSON file, revalidating the layer chain.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let network: Self = serde_json::from_reader(BufReader::new(file))?;
        network.validate()?;
        Ok(network)
    }

    fn layer(&self, layer: usize) -> Result<&DenseLayer> {
        self.layers.get(layer).ok_or(ModelErr::LayerOutOfRange {
            got: layer,
            count: self.layers.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::ActFn;

    fn two_two_one() -> Network {
        Network::new(vec![DenseLayer::zeros(2, 2, None), DenseLayer::zeros(2, 1, None)]).unwrap()
    }

    #[test]
    fn rejects_broken_chain() {
        let err = Network::new(vec![DenseLayer::zeros(2, 3, None), DenseLayer::zeros(2, 1, None)])
            .unwrap_err();

        assert!(matches!(
            err,
            ModelErr::BrokenChain {
                layer: 1,
                fan_in: 2,
                upstream_out: 3
            }
        ));
    }

    #[test]
    fn widths_cover_every_boundary() {
        let network = two_two_one();
        assert_eq!(network.widths(), [2, 2, 1]);
        assert_eq!(network.layer_count(), 2);
        assert_eq!(network.input_dimension(), 2);
    }

    #[test]
    fn activations_at_zero_are_identity() {
        let network = two_two_one();
        let points = array![[0.0, 1.0, 0.0, 1.0], [0.0, 0.0, 1.0, 1.0]];

        let out = network.activations_up_to(points.view(), 0).unwrap();
        assert_eq!(out, points);
    }

    #[test]
    fn activations_truncate_at_the_requested_layer() {
        let mut network = two_two_one();
        network
            .set_weights(0, array![[1.0, 0.0], [0.0, 0.0]], array![0.0, 0.0])
            .unwrap();

        let points = array![[0.0, 1.0, 0.0, 1.0], [0.0, 0.0, 1.0, 1.0]];
        let hidden = network.activations_up_to(points.view(), 1).unwrap();

        assert_eq!(hidden.row(0), array![0.0, 1.0, 0.0, 1.0]);
        assert_eq!(hidden.row(1), array![0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn set_weights_rejects_bad_shapes() {
        let mut network = two_two_one();
        let before = network.weights(0).unwrap().0.clone();

        let err = network
            .set_weights(0, Array2::zeros((3, 2)), Array1::zeros(2))
            .unwrap_err();

        assert!(matches!(err, ModelErr::ParameterShape { layer: 0, .. }));
        assert_eq!(network.weights(0).unwrap().0, &before);
    }

    #[test]
    fn rejects_input_width_mismatch() {
        let network = two_two_one();
        let points = Array2::zeros((3, 4));

        let err = network.activations_up_to(points.view(), 1).unwrap_err();
        assert!(matches!(err, ModelErr::InputWidth { got: 3, expected: 2 }));
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("network.json");

        let mut network = Network::new(vec![
            DenseLayer::zeros(2, 2, Some(ActFn::Sigmoid)).named("hidden"),
            DenseLayer::zeros(2, 1, None),
        ])
        .unwrap();
        network
            .set_weights(0, array![[0.5, -0.5], [1.0, 2.0]], array![0.1, 0.2])
            .unwrap();

        network.save(&path).unwrap();
        let loaded = Network::load(&path).unwrap();

        assert_eq!(loaded.widths(), network.widths());
        assert_eq!(loaded.weights(0).unwrap().0, network.weights(0).unwrap().0);
        assert_eq!(loaded.layer_name(0), Some("hidden"));
    }
}
