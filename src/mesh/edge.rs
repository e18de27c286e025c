use serde::{Deserialize, Serialize};

use crate::api::wire::WireEdge;
use crate::mesh::node::DeviceId;

/// A directed record that one alert hopped from one device to another.
/// Not unique over time: the same `(from, to, event_id)` may recur across
/// polls; novelty is decided against the previously observed key set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayEdge {
    pub from_id: DeviceId,
    pub to_id: DeviceId,
    pub event_id: String,
    pub hop: u32,
}

impl RelayEdge {
    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            from_id: self.from_id.clone(),
            to_id: self.to_id.clone(),
            event_id: self.event_id.clone(),
        }
    }
}

impl From<WireEdge> for RelayEdge {
    fn from(wire: WireEdge) -> Self {
        Self {
            from_id: wire.from_id,
            to_id: wire.to_id,
            event_id: wire.event_id,
            hop: wire.hop,
        }
    }
}

/// Composite identity of a relay link; the hop depth is display data and
/// deliberately not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeKey {
    pub from_id: DeviceId,
    pub to_id: DeviceId,
    pub event_id: String,
}
