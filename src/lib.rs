pub mod bridge;
pub mod compiler;
pub mod error;
pub mod parser;
pub mod recorder;
pub mod report;
pub mod runner;

// Re-export common items
pub use error::EngineError;
pub use report::generate_report;
pub use runner::{compile_scenarios, run_scenarios};
