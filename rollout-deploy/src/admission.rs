//! Admission control: may this deploy proceed right now?
//!
//! Decision table, first match wins:
//!
//! | status   | equivalent | force | outcome                                  |
//! |----------|------------|-------|------------------------------------------|
//! | updating | true       | any   | reject: up to date, currently updating   |
//! | updating | false      | false | reject: different deployment updating    |
//! | updating | false      | true  | proceed                                  |
//! | idle     | any        | any   | proceed                                  |

use serde::{Deserialize, Serialize};

use rollout_core::DeploymentStatus;

/// Caller-supplied deploy flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployOptions {
    /// Allow overriding a conflicting in-flight deployment.
    #[serde(default)]
    pub force: bool,
    /// Suppress the "already up to date" message. Never affects admission.
    #[serde(default)]
    pub ignore_cache: bool,
}

/// Why a deploy was turned away. Rejections are successful, informative responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The same context is already being applied.
    UpToDateUpdating,
    /// Another context is being applied and `force` was not set.
    DifferentDeploymentUpdating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Admission {
    Proceed,
    Reject(RejectReason),
}

impl Admission {
    pub fn is_proceed(&self) -> bool {
        matches!(self, Admission::Proceed)
    }
}

/// Apply the decision table. Pure.
pub fn admit(status: DeploymentStatus, equivalent: bool, options: &DeployOptions) -> Admission {
    match (status, equivalent, options.force) {
        (DeploymentStatus::Updating, true, _) => Admission::Reject(RejectReason::UpToDateUpdating),
        (DeploymentStatus::Updating, false, false) => {
            Admission::Reject(RejectReason::DifferentDeploymentUpdating)
        }
        (DeploymentStatus::Updating, false, true) | (DeploymentStatus::Idle, _, _) => {
            Admission::Proceed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    use DeploymentStatus::{Idle, Updating};

    #[rstest]
    #[case(Updating, true, false, Admission::Reject(RejectReason::UpToDateUpdating))]
    #[case(Updating, true, true, Admission::Reject(RejectReason::UpToDateUpdating))]
    #[case(Updating, false, false, Admission::Reject(RejectReason::DifferentDeploymentUpdating))]
    #[case(Updating, false, true, Admission::Proceed)]
    #[case(Idle, true, false, Admission::Proceed)]
    #[case(Idle, true, true, Admission::Proceed)]
    #[case(Idle, false, false, Admission::Proceed)]
    #[case(Idle, false, true, Admission::Proceed)]
    fn decision_table(
        #[case] status: DeploymentStatus,
        #[case] equivalent: bool,
        #[case] force: bool,
        #[case] expected: Admission,
    ) {
        for ignore_cache in [false, true] {
            let options = DeployOptions {
                force,
                ignore_cache,
            };
            assert_eq!(
                admit(status, equivalent, &options),
                expected,
                "status={status} equivalent={equivalent} force={force} ignore_cache={ignore_cache}"
            );
        }
    }

    #[test]
    fn admission_serializes_with_reason() {
        let json = serde_json::to_value(Admission::Reject(RejectReason::UpToDateUpdating))
            .expect("serialize");
        assert_eq!(json["decision"], "reject");
        assert_eq!(json["reason"], "up_to_date_updating");
    }
}
