use serde::{Deserialize, Serialize};

use crate::api::wire::WireNode;

pub type DeviceId = String;

/// Identity prefix the backend synthesizes for peers it has only seen by
/// address. Such nodes are placeholders until the device announces itself.
const PLACEHOLDER_PREFIX: &str = "PEER@";
const DEVICE_PREFIX: &str = "DEVICE-";

/// A mesh participant as rendered by the visualizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceNode {
    pub id: DeviceId,
    pub label: String,
    pub ip: Option<String>,
    pub is_self: bool,
}

impl DeviceNode {
    /// True for address-only identities that should yield to a stable device
    /// id carrying the same IP.
    pub fn is_placeholder(&self) -> bool {
        self.id.starts_with(PLACEHOLDER_PREFIX)
    }
}

impl From<WireNode> for DeviceNode {
    fn from(wire: WireNode) -> Self {
        let label = if wire.label.is_empty() {
            short_label(&wire.id)
        } else {
            wire.label
        };
        let ip = Some(wire.ip).filter(|ip| !ip.is_empty());
        Self {
            id: wire.id,
            label,
            ip,
            is_self: wire.is_self,
        }
    }
}

/// Compact display label derived from a device identity.
fn short_label(id: &str) -> String {
    if let Some(rest) = id.strip_prefix(PLACEHOLDER_PREFIX) {
        return rest.to_string();
    }
    if let Some(rest) = id.strip_prefix(DEVICE_PREFIX) {
        return rest.to_string();
    }
    id.chars().take(10).collect()
}
