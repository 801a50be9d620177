use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use model::ModelErr;

/// The result type used in the entire engine module.
pub type Result<T> = std::result::Result<T, EngineErr>;

/// Engine runtime failures.
///
/// Nothing here is fatal to the process; file and recompute errors are
/// recovered at the display boundary and shown to the user.
#[derive(Debug)]
pub enum EngineErr {
    /// Loaded points disagree with the network's declared input width.
    DimensionMismatch {
        got: usize,
        expected: usize,
    },
    /// A points-file row is missing its trailing label column.
    MissingLabel {
        line: usize,
    },
    /// A points-file feature cell failed to parse as a number.
    NonNumericData {
        line: usize,
        column: usize,
    },
    /// A per-layer forward computation failed; isolated to that layer.
    Recompute {
        layer: usize,
        reason: String,
    },
    /// A staged reduction hyperparameter falls outside its valid range.
    InvalidHyperParam {
        name: &'static str,
        got: f64,
        min: f64,
        max: f64,
    },
    /// A layer index beyond the loaded network's boundaries.
    LayerOutOfRange {
        got: usize,
        count: usize,
    },
    Io(io::Error),
    Model(ModelErr),
}

impl Display for EngineErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineErr::DimensionMismatch { got, expected } => write!(
                f,
                "dimension mismatch: points have {got} features, the network expects {expected}"
            ),
            EngineErr::MissingLabel { line } => {
                write!(f, "line {line} is missing the trailing label column")
            }
            EngineErr::NonNumericData { line, column } => {
                write!(f, "non-numeric data at line {line}, column {column}")
            }
            EngineErr::Recompute { layer, reason } => {
                write!(f, "recompute failed for layer {layer}: {reason}")
            }
            EngineErr::InvalidHyperParam {
                name,
                got,
                min,
                max,
            } => write!(
                f,
                "hyperparameter {name} = {got} outside the valid range [{min}, {max}]"
            ),
            EngineErr::LayerOutOfRange { got, count } => {
                write!(f, "layer index {got} out of range, {count} layers are loaded")
            }
            EngineErr::Io(e) => write!(f, "io error: {e}"),
            EngineErr::Model(e) => write!(f, "model error: {e}"),
        }
    }
}

impl Error for EngineErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EngineErr::Io(e) => Some(e),
            EngineErr::Model(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for EngineErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ModelErr> for EngineErr {
    fn from(value: ModelErr) -> Self {
        Self::Model(value)
    }
}
