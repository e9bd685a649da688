// Evaluation Graph Module
// StateGraph runtime plus the startup evaluation pipeline built on it

pub mod builder;
pub mod fallback;
pub mod node;
pub mod routing;
pub mod runtime;
pub mod stage;
pub mod state;
pub mod worklist;

pub mod nodes;

pub use builder::build_pipeline_graph;
pub use node::{GraphError, Node, NodeContext, NodeOutput};
pub use runtime::{EdgeCondition, GraphBuilder, GraphRuntime, END};
pub use state::{PipelineState, ReportOutcome, StagePatch, Startup};
