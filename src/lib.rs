pub mod core;
pub mod graph;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod rag;
pub mod report;
pub mod server;
pub mod state;
pub mod tools;
