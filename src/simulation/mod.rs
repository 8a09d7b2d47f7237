//! Random scenario generation and execution for stress testing.

pub mod scenario;

pub use scenario::{
    generate_random_scenario, run_scenario, PoolSpec, Scenario, ScenarioConfig, ScenarioOp,
    ScenarioReport,
};
