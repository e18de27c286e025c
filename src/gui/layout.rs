//! Deterministic ring layout for the mesh canvas.
//!
//! Pure and stateless: the same node set and viewport always produce the same
//! positions, so re-rendering never jitters. Recomputation is the caller's
//! decision (resize or node-set cardinality change only).

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use egui::{Pos2, Rect};

use crate::mesh::node::{DeviceId, DeviceNode};

const RING_RADIUS_FRAC: f32 = 0.36;
const RADIUS_JITTER_FRAC: f32 = 0.06;
const ANGLE_JITTER_RAD: f32 = 0.09;

/// Place the self node at the viewport center and all peers on a ring around
/// it, evenly spaced by their current order. Each peer gets a small radius and
/// angle offset derived from a stable hash of its id, so the ring reads as
/// organic without ever moving between calls.
pub fn ring_layout(nodes: &[DeviceNode], rect: Rect) -> HashMap<DeviceId, Pos2> {
    let center = rect.center();
    let base_radius = rect.width().min(rect.height()) * RING_RADIUS_FRAC;

    let mut positions = HashMap::with_capacity(nodes.len());
    if let Some(self_node) = nodes.iter().find(|n| n.is_self) {
        positions.insert(self_node.id.clone(), center);
    }

    let peers: Vec<&DeviceNode> = nodes.iter().filter(|n| !n.is_self).collect();
    let slice = std::f32::consts::TAU / peers.len().max(1) as f32;
    for (index, peer) in peers.iter().enumerate() {
        let (radius_jitter, angle_jitter) = id_jitter(&peer.id);
        let angle = slice * index as f32 + angle_jitter;
        let radius = base_radius * (1.0 + radius_jitter);
        positions.insert(
            peer.id.clone(),
            Pos2::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
            ),
        );
    }
    positions
}

/// Two jitter lanes in `[-1, 1]` scaled to their limits, from one stable
/// hash of the id. `DefaultHasher::new()` uses fixed keys, so identical ids
/// yield identical offsets on every call.
fn id_jitter(id: &str) -> (f32, f32) {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    let bits = hasher.finish();
    let lane_a = ((bits & 0xffff) as f32 / 65535.0) * 2.0 - 1.0;
    let lane_b = (((bits >> 16) & 0xffff) as f32 / 65535.0) * 2.0 - 1.0;
    (lane_a * RADIUS_JITTER_FRAC, lane_b * ANGLE_JITTER_RAD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::Vec2;

    fn node(id: &str, is_self: bool) -> DeviceNode {
        DeviceNode {
            id: id.into(),
            label: id.into(),
            ip: None,
            is_self,
        }
    }

    fn viewport(w: f32, h: f32) -> Rect {
        Rect::from_min_size(Pos2::ZERO, Vec2::new(w, h))
    }

    #[test]
    fn test_layout_is_deterministic() {
        let nodes = vec![node("SELF", true), node("A", false), node("B", false), node("C", false)];
        let rect = viewport(800.0, 600.0);
        assert_eq!(ring_layout(&nodes, rect), ring_layout(&nodes, rect));
    }

    #[test]
    fn test_self_node_is_centered_regardless_of_peer_count() {
        for peer_count in [0usize, 1, 5, 40] {
            let mut nodes = vec![node("SELF", true)];
            for i in 0..peer_count {
                nodes.push(node(&format!("P{i}"), false));
            }
            let positions = ring_layout(&nodes, viewport(640.0, 480.0));
            assert_eq!(positions["SELF"], Pos2::new(320.0, 240.0));
            assert_eq!(positions.len(), peer_count + 1);
        }
    }

    #[test]
    fn test_empty_ring_yields_self_only() {
        let positions = ring_layout(&[node("SELF", true)], viewport(400.0, 400.0));
        assert_eq!(positions.len(), 1);

        let none = ring_layout(&[], viewport(400.0, 400.0));
        assert!(none.is_empty());
    }

    #[test]
    fn test_peers_stay_near_the_ring() {
        let nodes: Vec<DeviceNode> = (0..12).map(|i| node(&format!("P{i}"), false)).collect();
        let rect = viewport(1000.0, 700.0);
        let base_radius = 700.0 * RING_RADIUS_FRAC;
        let center = rect.center();

        for (_, pos) in ring_layout(&nodes, rect) {
            let distance = (pos - center).length();
            assert!(distance >= base_radius * (1.0 - RADIUS_JITTER_FRAC) - 0.5);
            assert!(distance <= base_radius * (1.0 + RADIUS_JITTER_FRAC) + 0.5);
        }
    }

    #[test]
    fn test_jitter_is_stable_per_id() {
        assert_eq!(id_jitter("DEVICE-X"), id_jitter("DEVICE-X"));
        // Not a guarantee in general, but these two must not collide for the
        // jitter to be worth anything.
        assert_ne!(id_jitter("DEVICE-X"), id_jitter("DEVICE-Y"));
    }
}
