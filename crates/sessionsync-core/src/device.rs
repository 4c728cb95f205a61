//! Device types for tracking discovered consoles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::classify::Confidence;
use crate::model::{ConsoleModel, Family};

/// Identity of a console, derived from its model and address (e.g. `X32-10.0.0.10`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(model: ConsoleModel, ip: IpAddr) -> Self {
        Self(format!("{}-{}", model.as_str(), ip))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a console was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMethod {
    /// Passive service advertisement (mDNS)
    Advertised,
    /// Active UDP probe
    Probed,
}

/// Outcome of the secondary confirmation query
///
/// Every discovery event starts at `Unverified` and resolves to exactly one of
/// `Verified` or `Failed`. A re-discovery of the same identity resets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationState {
    #[default]
    Unverified,
    Verified,
    Failed,
}

/// A discovered console
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: DeviceId,
    #[serde(rename = "type")]
    pub model: ConsoleModel,
    /// Display name (service name or "<product> at <ip>")
    pub name: String,
    pub ip: IpAddr,
    pub port: u16,
    pub family: Family,
    /// Input channel count of the model
    pub channels: u8,
    /// `FamilyDefault` when the model was assumed from the family alone
    pub confidence: Confidence,
    #[serde(rename = "via")]
    pub method: DiscoveryMethod,
    pub verification: VerificationState,
    /// Set when verification failed
    pub error: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl DeviceRecord {
    /// Create an unverified record seen just now
    pub fn new(
        model: ConsoleModel,
        name: String,
        ip: IpAddr,
        port: u16,
        method: DiscoveryMethod,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: DeviceId::new(model, ip),
            model,
            name,
            ip,
            port,
            family: model.family(),
            channels: model.max_channels(),
            confidence: Confidence::Exact,
            method,
            verification: VerificationState::Unverified,
            error: None,
            first_seen: now,
            last_seen: now,
        }
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    /// Name given to consoles found by probing
    pub fn probed_name(model: ConsoleModel, ip: IpAddr) -> String {
        format!("{} at {}", model.product_name(), ip)
    }

    pub fn mark_verified(&mut self) {
        self.verification = VerificationState::Verified;
        self.error = None;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.verification = VerificationState::Failed;
        self.error = Some(error.into());
    }
}
