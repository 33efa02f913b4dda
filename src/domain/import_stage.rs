use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-request import state machine.
///
/// `Validating -> Rendering -> Extracting -> Downloading -> Done`, with `Failed`
/// reachable only from `Validating` and `Rendering`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStage {
    Validating,
    Rendering,
    Extracting,
    Downloading,
    Done,
    Failed,
}

impl ImportStage {
    /// Next stage on the success path
    pub const fn next(self) -> Self {
        match self {
            Self::Validating => Self::Rendering,
            Self::Rendering => Self::Extracting,
            Self::Extracting => Self::Downloading,
            Self::Downloading | Self::Done => Self::Done,
            Self::Failed => Self::Failed,
        }
    }

    /// Whether a fatal error may be raised while in this stage
    pub const fn can_fail(self) -> bool {
        matches!(self, Self::Validating | Self::Rendering)
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Rendering => "rendering",
            Self::Extracting => "extracting",
            Self::Downloading => "downloading",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
