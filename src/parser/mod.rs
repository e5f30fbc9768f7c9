//! Scenario text parsing: header + ordered, typed step list.

pub mod scenario;
pub mod types;

pub use scenario::{parse_scenario_file, parse_scenario_text, substitute_env};
pub use types::{ScenarioDefinition, ScenarioStep};
