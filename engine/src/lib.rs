pub mod coordinator;
pub mod error;
pub mod geometry;
pub mod ingest;
pub mod queue;
pub mod recompute;
pub mod reduction;
pub mod state;

pub use coordinator::{ChangeCoordinator, ParamEdit};
pub use error::{EngineErr, Result};
pub use geometry::{Polygon, PolygonImage};
pub use recompute::{ActiveLayerSet, DisplaySink, Frontier, NullSink, PassSummary, RecomputeEngine};
pub use reduction::{PcaConfig, ReductionMethod, TsneConfig, TsneParams};
pub use state::{DisplayConfig, DisplayFrame, LayerState, Segment};
