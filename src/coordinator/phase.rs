//! Member phases

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four ordered states a member occupies within a group's workflow.
///
/// Every member starts at `Ready` and the whole group must reach one
/// phase before anyone advances past it; see
/// [`GroupCoordinator`](crate::coordinator::GroupCoordinator) for the
/// transition rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Waiting for this member's artifact.
    Ready,
    /// Artifact received; waiting for the rest of the group.
    Submitted,
    /// Member accepted the composed artifact.
    Approved,
    /// Member has seen the group fully approved.
    Done,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Ready, Phase::Submitted, Phase::Approved, Phase::Done];

    /// The literal name exchanged on the checkpoint wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Ready => "Ready",
            Phase::Submitted => "Submitted",
            Phase::Approved => "Approved",
            Phase::Done => "Done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Ready" => Ok(Phase::Ready),
            "Submitted" => Ok(Phase::Submitted),
            "Approved" => Ok(Phase::Approved),
            "Done" => Ok(Phase::Done),
            other => Err(crate::Error::MalformedSnapshot(format!(
                "unknown phase: {}",
                other
            ))),
        }
    }
}
