pub mod activations;
pub mod error;
pub mod layer;
pub mod network;

pub use activations::ActFn;
pub use error::{ModelErr, Result};
pub use layer::DenseLayer;
pub use network::Network;
