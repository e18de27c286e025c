/*!
Wire-level payloads for the mesh node's REST API.

Everything here is treated as untrusted input: enums decode with an explicit
fallback variant, optional fields default, and `AlertMeta::normalized` repairs
payloads that violate the cross-check invariant instead of trusting them.
Domain conversion (into `mesh::node` / `mesh::edge` types) happens in the
reconciler, not here.
*/

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Alert category as broadcast by the origin device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlertType {
    Fire,
    Medical,
    Security,
    /// Anything we don't recognize. Kept explicit so the fallback is visible
    /// and testable rather than buried in a lookup-table default.
    Unknown,
}

impl Default for AlertType {
    fn default() -> Self {
        AlertType::Unknown
    }
}

impl From<String> for AlertType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "FIRE" => AlertType::Fire,
            "MEDICAL" => AlertType::Medical,
            "SECURITY" => AlertType::Security,
            _ => AlertType::Unknown,
        }
    }
}

impl From<AlertType> for String {
    fn from(t: AlertType) -> Self {
        t.wire_name().to_string()
    }
}

impl AlertType {
    pub fn wire_name(&self) -> &'static str {
        match self {
            AlertType::Fire => "FIRE",
            AlertType::Medical => "MEDICAL",
            AlertType::Security => "SECURITY",
            AlertType::Unknown => "UNKNOWN",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            AlertType::Fire => "🔥",
            AlertType::Medical => "⚕",
            AlertType::Security => "⚠",
            AlertType::Unknown => "❓",
        }
    }

    /// All broadcastable types, for the raise-alert form.
    pub const SELECTABLE: [AlertType; 3] = [AlertType::Fire, AlertType::Medical, AlertType::Security];
}

/// Coarse confidence bucket computed by the backend from cross-check count.
/// Ordered so `max()` picks the strongest level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TrustLevel {
    Low,
    Medium,
    High,
}

impl Default for TrustLevel {
    fn default() -> Self {
        TrustLevel::Low
    }
}

impl From<String> for TrustLevel {
    fn from(s: String) -> Self {
        match s.as_str() {
            "HIGH" => TrustLevel::High,
            "MEDIUM" => TrustLevel::Medium,
            // LOW and any malformed value alike; an untrusted payload never
            // gets to claim more than the floor by being unparseable.
            _ => TrustLevel::Low,
        }
    }
}

impl From<TrustLevel> for String {
    fn from(t: TrustLevel) -> Self {
        t.wire_name().to_string()
    }
}

impl TrustLevel {
    pub fn wire_name(&self) -> &'static str {
        match self {
            TrustLevel::Low => "LOW",
            TrustLevel::Medium => "MEDIUM",
            TrustLevel::High => "HIGH",
        }
    }
}

/// Full per-alert record as served by `/api/events`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertMeta {
    pub event_id: String,
    #[serde(rename = "type", default)]
    pub kind: AlertType,
    #[serde(default)]
    pub origin_device: String,
    #[serde(default)]
    pub max_hop: u32,
    #[serde(default)]
    pub devices_reached: u32,
    #[serde(default)]
    pub devices_reached_ids: HashSet<String>,
    #[serde(default)]
    pub cross_checks: u32,
    #[serde(default)]
    pub cross_check_ids: HashSet<String>,
    #[serde(default)]
    pub trust: TrustLevel,
    #[serde(default)]
    pub authorized_node: bool,
    #[serde(default)]
    pub first_seen: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub pending_verify: bool,
    #[serde(default)]
    pub dismissed: bool,
}

impl AlertMeta {
    /// Enforce the cross-check invariant on an untrusted record:
    /// `cross_check_ids ⊆ devices_reached_ids \ {origin_device}` and
    /// `cross_checks == |cross_check_ids|`.
    pub fn normalized(mut self) -> Self {
        self.cross_check_ids.remove(&self.origin_device);
        if !self.devices_reached_ids.is_empty() {
            self.cross_check_ids
                .retain(|id| self.devices_reached_ids.contains(id));
            self.devices_reached = self.devices_reached_ids.len() as u32;
        }
        self.cross_checks = self.cross_check_ids.len() as u32;
        self
    }

    pub fn verified_by(&self, device_id: &str) -> bool {
        self.cross_check_ids.contains(device_id)
    }

    pub fn originated_by(&self, device_id: &str) -> bool {
        self.origin_device == device_id
    }
}

/// Per-alert summary embedded in the topology snapshot. `/api/hops` only
/// carries enough to style edges; the full record comes from `/api/events`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventSummary {
    #[serde(rename = "type", default)]
    pub kind: AlertType,
    #[serde(default)]
    pub trust: TrustLevel,
    #[serde(default)]
    pub devices_reached: u32,
    #[serde(default)]
    pub cross_checks: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireNode {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub is_self: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEdge {
    #[serde(rename = "from")]
    pub from_id: String,
    #[serde(rename = "to")]
    pub to_id: String,
    pub event_id: String,
    #[serde(default)]
    pub hop: u32,
}

/// One polled point-in-time view of the mesh, `/api/hops` shape.
/// `nodes` and `edges` are required on purpose: a payload missing either is
/// malformed and the whole snapshot is discarded by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub nodes: Vec<WireNode>,
    pub edges: Vec<WireEdge>,
    #[serde(default)]
    pub events: HashMap<String, EventSummary>,
    #[serde(default)]
    pub self_id: String,
}

/// Success body of `POST /api/events/<id>/verify`.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyReceipt {
    #[serde(default)]
    pub verified_by: String,
    pub cross_checks: u32,
    pub trust: TrustLevel,
}

/// Request body of `POST /api/broadcast` for locally raised alerts.
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastRequest {
    pub event_id: String,
    #[serde(rename = "type")]
    pub kind: AlertType,
    pub device_id: String,
    pub description: String,
    pub location: String,
}
