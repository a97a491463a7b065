//! Shared domain enumerations aligned with persisted status columns.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Lifecycle status of a cloud-PC record.
///
/// Stored as text in the `cloudpcs.status` column; transitional states
/// (`Starting`, `Stopping`, `Restarting`, `Deleting`) are resolved to their
/// settled state by the transition scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudPcStatus {
    Creating,
    Starting,
    Running,
    Stopping,
    Stopped,
    Restarting,
    Deleting,
    Error,
}

impl CloudPcStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CloudPcStatus::Creating => "creating",
            CloudPcStatus::Starting => "starting",
            CloudPcStatus::Running => "running",
            CloudPcStatus::Stopping => "stopping",
            CloudPcStatus::Stopped => "stopped",
            CloudPcStatus::Restarting => "restarting",
            CloudPcStatus::Deleting => "deleting",
            CloudPcStatus::Error => "error",
        }
    }

    /// True while a simulated transition is pending for this status.
    pub fn is_transitional(self) -> bool {
        matches!(
            self,
            CloudPcStatus::Creating
                | CloudPcStatus::Starting
                | CloudPcStatus::Stopping
                | CloudPcStatus::Restarting
                | CloudPcStatus::Deleting
        )
    }

    /// Validate a requested lifecycle operation against the current status.
    ///
    /// Returns the transitional status to persist, or a domain error when the
    /// operation is not legal from the current state.
    pub fn begin_transition(self, op: LifecycleOp) -> Result<CloudPcStatus, DomainError> {
        let next = match (op, self) {
            (LifecycleOp::Start, CloudPcStatus::Stopped | CloudPcStatus::Error) => {
                CloudPcStatus::Starting
            }
            (LifecycleOp::Stop, CloudPcStatus::Running | CloudPcStatus::Error) => {
                CloudPcStatus::Stopping
            }
            (LifecycleOp::Restart, CloudPcStatus::Running) => CloudPcStatus::Restarting,
            (op, current) => {
                return Err(DomainError::invalid_transition(
                    op.as_str(),
                    current.as_str(),
                ));
            }
        };
        Ok(next)
    }

    /// The status a transitional state settles into once its timer fires.
    pub fn settled(self) -> CloudPcStatus {
        match self {
            CloudPcStatus::Creating | CloudPcStatus::Starting | CloudPcStatus::Restarting => {
                CloudPcStatus::Running
            }
            CloudPcStatus::Stopping => CloudPcStatus::Stopped,
            other => other,
        }
    }
}

impl fmt::Display for CloudPcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloudPcStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "creating" => Ok(CloudPcStatus::Creating),
            "starting" => Ok(CloudPcStatus::Starting),
            "running" => Ok(CloudPcStatus::Running),
            "stopping" => Ok(CloudPcStatus::Stopping),
            "stopped" => Ok(CloudPcStatus::Stopped),
            "restarting" => Ok(CloudPcStatus::Restarting),
            "deleting" => Ok(CloudPcStatus::Deleting),
            "error" => Ok(CloudPcStatus::Error),
            other => Err(DomainError::validation(format!(
                "unknown cloud-pc status `{other}`"
            ))),
        }
    }
}

/// Lifecycle operations exposed over the HTTP API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleOp {
    Start,
    Stop,
    Restart,
}

impl LifecycleOp {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleOp::Start => "start",
            LifecycleOp::Stop => "stop",
            LifecycleOp::Restart => "restart",
        }
    }
}

/// Access role of a user account. Stored as text in `users.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Member,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Member => "member",
        }
    }
}

impl FromStr for UserRole {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(UserRole::Admin),
            "member" => Ok(UserRole::Member),
            other => Err(DomainError::validation(format!(
                "unknown user role `{other}`"
            ))),
        }
    }
}
