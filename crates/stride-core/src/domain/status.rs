//! Processing status of a work item's result record.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle of a `ProcessingResult`.
///
/// State transitions:
/// - Pending -> Processing -> Completed
/// - Pending -> Processing -> Failed -> Processing (retry) -> ...
/// - Pending -> Failed (failure before the first Processing write landed)
/// - Processing -> Processing (redelivery after a worker crash)
///
/// Completed is terminal: nothing leaves it.
///
/// Persisted as the lowercase variant name (`"pending"`, ...). Reading an
/// unknown string is a data-corruption error, never a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ResultStatus {
    pub const ALL: [ResultStatus; 4] = [
        ResultStatus::Pending,
        ResultStatus::Processing,
        ResultStatus::Completed,
        ResultStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResultStatus::Pending => "pending",
            ResultStatus::Processing => "processing",
            ResultStatus::Completed => "completed",
            ResultStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ResultStatus::Completed)
    }

    /// Is `self -> next` an allowed transition?
    pub fn can_transition_to(self, next: ResultStatus) -> bool {
        use ResultStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Failed)
                | (Processing, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Failed, Processing)
        )
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown result status '{0}'")]
pub struct StatusParseError(pub String);

impl FromStr for ResultStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ResultStatus::Pending),
            "processing" => Ok(ResultStatus::Processing),
            "completed" => Ok(ResultStatus::Completed),
            "failed" => Ok(ResultStatus::Failed),
            other => Err(StatusParseError(other.to_string())),
        }
    }
}
