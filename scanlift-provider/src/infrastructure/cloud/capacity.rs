//! Capacity-error classification
//!
//! The infrastructure tool only reports free text. These markers are matched
//! case-insensitively against its combined output; they track vendor error codes and are
//! a known fragility across tool and provider plugin versions.

use scanlift_core::domain::CloudVendor;

const AWS_MARKERS: &[&str] = &[
    "InsufficientInstanceCapacity",
    "InsufficientCapacity",
    "SpotMaxPriceTooLow",
    "MaxSpotInstanceCountExceeded",
    "capacity-not-available",
    "InstanceLimitExceeded",
];

const GCP_MARKERS: &[&str] = &[
    "ZONE_RESOURCE_POOL_EXHAUSTED",
    "RESOURCE_POOL_EXHAUSTED",
    "QUOTA_EXCEEDED",
    "does not have enough resources available",
];

const AZURE_MARKERS: &[&str] = &[
    "AllocationFailed",
    "SkuNotAvailable",
    "OverconstrainedAllocationRequest",
    "ZonalAllocationFailed",
    "QuotaExceeded",
];

/// How a failed provisioning attempt should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// No capacity for the requested tier; worth one attempt at another tier
    Capacity,
    /// Anything else; never retried
    Other,
}

pub fn capacity_markers(vendor: CloudVendor) -> &'static [&'static str] {
    match vendor {
        CloudVendor::Aws => AWS_MARKERS,
        CloudVendor::Gcp => GCP_MARKERS,
        CloudVendor::Azure => AZURE_MARKERS,
    }
}

/// Classify the diagnostic output of a failed apply
pub fn classify_failure(vendor: CloudVendor, diagnostics: &str) -> FailureClass {
    let haystack = diagnostics.to_lowercase();
    let capacity = capacity_markers(vendor)
        .iter()
        .any(|marker| haystack.contains(&marker.to_lowercase()));

    if capacity {
        FailureClass::Capacity
    } else {
        FailureClass::Other
    }
}
