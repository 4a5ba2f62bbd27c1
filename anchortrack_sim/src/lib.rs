//! AnchorTrack simulation harness.
//!
//! Runs the tracking engine against a scripted spatial-anchoring service:
//! a seeded ground-truth world of placed objects, a mock service that
//! answers detection queries by geometric containment and raises events
//! from real background threads, and a scenario runner driving the main
//! tick at a fixed rate. Any run is reproducible from its seed.

pub mod menu;
pub mod oracle;
pub mod runner;
pub mod service;

pub use menu::RecordingSink;
pub use oracle::{SimObject, WorldOracle};
pub use runner::{run_scenario, ScenarioConfig, ScenarioReport};
pub use service::SimAnchorService;
