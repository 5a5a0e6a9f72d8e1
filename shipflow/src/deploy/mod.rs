//! The deployment state machine and its orchestrator.

mod orchestrator;
mod record;
mod stage;
pub mod tags;


pub use orchestrator::{Orchestrator, RecoveredOutcome};
pub use record::{DeployMode, DeployOutcome, DeploymentRecord, OutcomeStatus};
pub use stage::DeployStage;
