//! Deployment stages.

use serde::{Deserialize, Serialize};

/// The state machine's nodes. Transitions are strictly forward; no
/// stage is re-entered except the internal poll loop in
/// `AwaitingReady`. `Failed` is terminal and reachable from any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStage {
    /// Nothing has happened yet.
    Idle,
    /// Pushing the artifact to the computed store location.
    Uploading,
    /// Issuing the code-update call against the remote function.
    UpdatingCode,
    /// Polling the remote function until the update settles.
    AwaitingReady,
    /// Creating the immutable version snapshot.
    PublishingVersion,
    /// Re-pointing the environment alias.
    UpdatingAlias,
    /// Attaching audit metadata.
    Tagging,
    /// Finished successfully.
    Done,
    /// Aborted.
    Failed,
}

impl DeployStage {
    /// Stage name for logging and error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::UpdatingCode => "updating-code",
            Self::AwaitingReady => "awaiting-ready",
            Self::PublishingVersion => "publishing-version",
            Self::UpdatingAlias => "updating-alias",
            Self::Tagging => "tagging",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Whether the stage is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for DeployStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
