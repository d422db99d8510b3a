pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod expressed_chart;
pub mod pad;
pub mod performed_chart;
pub mod seed;
pub mod sm;
pub mod step_graph;
pub mod step_types;

pub const PADGEN_VERSION: &str = env!("CARGO_PKG_VERSION");

pub use config::{ConfigFile, CoreConfig};
pub use driver::{process_chart, ConversionContext};
pub use error::{CoreError, ExpressionFailure, FallbackWarning, MinePlacementWarning, PerformanceFailure};
pub use events::{ChartId, InputChart, InputEvent, MineType, OutputChart, OutputEvent, PassthroughEvent, Position};
pub use expressed_chart::{express, ExpressedChart, MineEvent, StepEvent};
pub use pad::PadDescriptor;
pub use performed_chart::{perform, PerformedChart, SubstitutionCache};
pub use step_graph::{GraphLink, GraphLinkInstance, GraphNode, NodeId, StepGraph};
pub use step_types::{Foot, FootAction, FootPortion, StepType};
