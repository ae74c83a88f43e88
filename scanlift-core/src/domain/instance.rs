//! Execution modes, compute tiers and the description of a provisioned engine

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Requested execution mode; `Auto` defers the choice to the provider selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Auto,
    Local,
    Remote,
    Cloud,
}

impl ExecutionMode {
    /// The provider this mode pins, or `None` for `Auto`
    pub fn explicit(self) -> Option<ProviderKind> {
        match self {
            Self::Auto => None,
            Self::Local => Some(ProviderKind::Local),
            Self::Remote => Some(ProviderKind::Remote),
            Self::Cloud => Some(ProviderKind::Cloud),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            "cloud" => Ok(Self::Cloud),
            other => Err(format!(
                "unknown execution mode '{other}' (expected auto, local, remote or cloud)"
            )),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Auto => "auto",
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Cloud => "cloud",
        };
        f.write_str(text)
    }
}

/// Concrete provider variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Local,
    Remote,
    Cloud,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Cloud => "cloud",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute pricing tier for cloud instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComputeTier {
    /// Spot / preemptible capacity
    #[serde(rename = "spot", alias = "low-cost", alias = "preemptible")]
    LowCost,
    /// Regular on-demand capacity
    #[serde(rename = "on-demand", alias = "standard")]
    Standard,
}

impl ComputeTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LowCost => "spot",
            Self::Standard => "on-demand",
        }
    }
}

impl fmt::Display for ComputeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cloud vendor whose infrastructure module is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudVendor {
    Aws,
    Gcp,
    Azure,
}

impl CloudVendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Gcp => "gcp",
            Self::Azure => "azure",
        }
    }
}

impl fmt::Display for CloudVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend-specific facts about a provisioned engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProviderMetadata {
    Local {
        container_name: String,
        /// Whether this session started the container (as opposed to reusing one)
        started_here: bool,
    },
    Remote {
        version: String,
    },
    Cloud {
        vendor: CloudVendor,
        region: String,
        /// Tier actually provisioned, after any capacity fallback
        compute_tier: ComputeTier,
        host: String,
    },
}

/// A reachable scan engine, produced by a successful `provision()`
///
/// Owned by exactly one session and never reused.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceInfo {
    pub session_id: Uuid,
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub mode: ProviderKind,
    pub metadata: ProviderMetadata,
}

impl InstanceInfo {
    pub fn compute_tier(&self) -> Option<ComputeTier> {
        match self.metadata {
            ProviderMetadata::Cloud { compute_tier, .. } => Some(compute_tier),
            _ => None,
        }
    }
}

/// A plan the engine has accepted and started
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanHandle {
    pub plan_id: String,
    /// Where the engine sees the plan file
    pub engine_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_mode_parsing() {
        assert_eq!("Cloud".parse::<ExecutionMode>().unwrap(), ExecutionMode::Cloud);
        assert_eq!(" auto ".parse::<ExecutionMode>().unwrap(), ExecutionMode::Auto);
        assert!("kubernetes".parse::<ExecutionMode>().is_err());
        assert_eq!(ExecutionMode::Auto.explicit(), None);
        assert_eq!(ExecutionMode::Remote.explicit(), Some(ProviderKind::Remote));
    }

    #[test]
    fn test_compute_tier_serde_names() {
        let tier: ComputeTier = serde_json::from_str("\"spot\"").unwrap();
        assert_eq!(tier, ComputeTier::LowCost);
        let tier: ComputeTier = serde_json::from_str("\"standard\"").unwrap();
        assert_eq!(tier, ComputeTier::Standard);
        assert_eq!(
            serde_json::to_string(&ComputeTier::Standard).unwrap(),
            "\"on-demand\""
        );
    }

    #[test]
    fn test_instance_info_hides_api_key() {
        let info = InstanceInfo {
            session_id: Uuid::new_v4(),
            base_url: "http://localhost:8090".into(),
            api_key: Some("secret".into()),
            mode: ProviderKind::Local,
            metadata: ProviderMetadata::Local {
                container_name: "scanlift-engine".into(),
                started_here: true,
            },
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"kind\":\"local\""));
        assert_eq!(info.compute_tier(), None);
    }
}
