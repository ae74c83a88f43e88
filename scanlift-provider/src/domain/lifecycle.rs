//! Cloud provisioning state machine

use std::fmt;

use scanlift_core::domain::ComputeTier;

/// Where a cloud provisioning run stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningState {
    NotStarted,
    /// Applying with spot / preemptible capacity
    ProvisioningLowCost,
    /// Applying with on-demand capacity
    ProvisioningStandard,
    /// The low-cost attempt failed for lack of capacity
    CapacityFailed,
    Ready,
    OtherFailed,
}

impl ProvisioningState {
    /// Returns the set of valid target states from the current state.
    ///
    /// ```text
    /// NotStarted ──► ProvisioningLowCost ──► Ready
    ///   │                 │   └──► OtherFailed
    ///   │                 ▼
    ///   │           CapacityFailed
    ///   │                 │
    ///   └─────────► ProvisioningStandard ──► Ready | OtherFailed
    /// ```
    pub fn valid_transitions(&self) -> &[ProvisioningState] {
        match self {
            Self::NotStarted => &[Self::ProvisioningLowCost, Self::ProvisioningStandard],
            Self::ProvisioningLowCost => &[Self::Ready, Self::CapacityFailed, Self::OtherFailed],
            Self::CapacityFailed => &[Self::ProvisioningStandard],
            Self::ProvisioningStandard => &[Self::Ready, Self::OtherFailed],
            Self::Ready | Self::OtherFailed => &[],
        }
    }

    pub fn can_transition_to(&self, target: &ProvisioningState) -> bool {
        self.valid_transitions().contains(target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::OtherFailed)
    }

    /// The state that starts an attempt at `tier`
    pub fn attempting(tier: ComputeTier) -> Self {
        match tier {
            ComputeTier::LowCost => Self::ProvisioningLowCost,
            ComputeTier::Standard => Self::ProvisioningStandard,
        }
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NotStarted"),
            Self::ProvisioningLowCost => write!(f, "ProvisioningLowCost"),
            Self::ProvisioningStandard => write!(f, "ProvisioningStandard"),
            Self::CapacityFailed => write!(f, "CapacityFailed"),
            Self::Ready => write!(f, "Ready"),
            Self::OtherFailed => write!(f, "OtherFailed"),
        }
    }
}

/// Error returned when an invalid state transition is attempted.
#[derive(Debug, thiserror::Error)]
#[error("Invalid provisioning transition from {from} to {to}")]
pub struct ProvisioningTransitionError {
    pub from: ProvisioningState,
    pub to: ProvisioningState,
}
