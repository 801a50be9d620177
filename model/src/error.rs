use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// The result type used in the entire model module.
pub type Result<T> = std::result::Result<T, ModelErr>;

/// The model module's error type.
#[derive(Debug)]
pub enum ModelErr {
    /// A weight or bias array disagrees with the layer's declared shape.
    ParameterShape {
        layer: usize,
        got: (usize, usize, usize),
        expected: (usize, usize, usize),
    },
    /// Input points don't match the network's declared input width.
    InputWidth {
        got: usize,
        expected: usize,
    },
    /// A layer index beyond the network's layer count.
    LayerOutOfRange {
        got: usize,
        count: usize,
    },
    /// Consecutive layers disagree on fan-in/fan-out.
    BrokenChain {
        layer: usize,
        fan_in: usize,
        upstream_out: usize,
    },
    /// A network with no layers at all.
    EmptyNetwork,
    Io(io::Error),
    Serde(serde_json::Error),
}

impl Display for ModelErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelErr::ParameterShape {
                layer,
                got,
                expected,
            } => write!(
                f,
                "parameter shape mismatch at layer {layer}: got {}x{} weights and {} biases, \
                 expected {}x{} and {}",
                got.0, got.1, got.2, expected.0, expected.1, expected.2
            ),
            ModelErr::InputWidth { got, expected } => {
                write!(f, "input width mismatch: got {got} coordinates, expected {expected}")
            }
            ModelErr::LayerOutOfRange { got, count } => {
                write!(f, "layer index {got} out of range, the network has {count} layers")
            }
            ModelErr::BrokenChain {
                layer,
                fan_in,
                upstream_out,
            } => write!(
                f,
                "broken layer chain at layer {layer}: fan-in {fan_in} but the upstream layer \
                 produces {upstream_out} outputs"
            ),
            ModelErr::EmptyNetwork => write!(f, "the network has no layers"),
            ModelErr::Io(e) => write!(f, "io error: {e}"),
            ModelErr::Serde(e) => write!(f, "serialization error: {e}"),
        }
    }
}

impl Error for ModelErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ModelErr::Io(e) => Some(e),
            ModelErr::Serde(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ModelErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ModelErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}
