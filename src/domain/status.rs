use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome a client reports for a rollout.
///
/// The wire names are the ones stored in the labels hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeploymentStatus {
    #[serde(rename = "DeploymentSucceeded")]
    Succeeded,
    #[serde(rename = "DeploymentFailed")]
    Failed,
    #[serde(rename = "Downloaded")]
    Downloaded,
}

impl DeploymentStatus {
    pub const ALL: [DeploymentStatus; 3] = [Self::Succeeded, Self::Failed, Self::Downloaded];

    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentStatus::Succeeded => "DeploymentSucceeded",
            DeploymentStatus::Failed => "DeploymentFailed",
            DeploymentStatus::Downloaded => "Downloaded",
        }
    }

    /// Parses a wire name; anything outside the closed set is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown deployment status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for DeploymentStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| UnknownStatus(value.to_string()))
    }
}
