/*!
Snapshot reconciliation for the alert mesh.

This module defines:
- `MeshModel`: the reconciled topology plus per-alert metadata. Replaced
  wholesale at the end of each reconciliation pass so the draw pass always
  reads a consistent snapshot.
- `Reconciler`: holds the last known good model and the edge-key set observed
  on the previous pass, and turns raw snapshots into model updates plus a list
  of newly observed relay edges.
*/

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::api::wire::{AlertMeta, AlertType, TopologySnapshot, TrustLevel};
use crate::mesh::edge::{EdgeKey, RelayEdge};
use crate::mesh::node::{DeviceId, DeviceNode};

#[derive(Debug, Clone, Default, Serialize)]
pub struct MeshModel {
    pub nodes: Vec<DeviceNode>,
    pub edges: Vec<RelayEdge>,
    pub events: HashMap<String, AlertMeta>,
    pub self_id: Option<DeviceId>,
    /// Per-device detail payloads, rebuilt once per reconciliation pass so
    /// the draw pass reads them without allocating.
    #[serde(skip)]
    pub details: HashMap<DeviceId, NodeDetail>,
}

impl MeshModel {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Detail payload for one device: which alert types it relayed, the
    /// strongest trust among them, and the alerts it actually authored.
    /// Cached; see `rebuild_details`.
    pub fn node_detail(&self, device_id: &str) -> NodeDetail {
        self.details.get(device_id).cloned().unwrap_or_default()
    }

    /// Recompute the per-device detail map. Called at the end of every
    /// reconciliation pass, never from the render path. Relayed kinds keep
    /// edge order (first appearance wins), authored alerts sort newest first.
    fn rebuild_details(&mut self) {
        let mut details: HashMap<DeviceId, NodeDetail> =
            HashMap::with_capacity(self.nodes.len());

        for edge in &self.edges {
            let Some(meta) = self.events.get(&edge.event_id) else {
                continue;
            };
            let entry = details.entry(edge.from_id.clone()).or_default();
            if !entry.relayed_kinds.contains(&meta.kind) {
                entry.relayed_kinds.push(meta.kind);
            }
            entry.top_trust = entry.top_trust.max(Some(meta.trust));
        }

        for meta in self.events.values() {
            if meta.origin_device.is_empty() {
                continue;
            }
            details
                .entry(meta.origin_device.clone())
                .or_default()
                .authored
                .push(meta.clone());
        }
        for detail in details.values_mut() {
            detail
                .authored
                .sort_by(|a, b| b.first_seen.total_cmp(&a.first_seen));
        }

        self.details = details;
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodeDetail {
    pub relayed_kinds: Vec<AlertType>,
    pub top_trust: Option<TrustLevel>,
    pub authored: Vec<AlertMeta>,
}

/// What one reconciliation pass produced for the callers downstream.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Edges whose key was absent from the previous pass. Animation spawning
    /// keys off this list, never off the raw edge list.
    pub new_edges: Vec<RelayEdge>,
    /// The deduplicated node count changed; positions must be recomputed.
    pub cardinality_changed: bool,
}

#[derive(Default)]
pub struct Reconciler {
    model: MeshModel,
    seen_edge_keys: HashSet<EdgeKey>,
}

impl Reconciler {
    pub fn model(&self) -> &MeshModel {
        &self.model
    }

    /// Ingest one topology snapshot. The previous model stays untouched until
    /// the very end of the pass, where it is replaced in one assignment; the
    /// edge-key set swaps at the same point.
    pub fn apply(&mut self, snapshot: TopologySnapshot) -> ReconcileOutcome {
        let nodes = dedup_nodes(snapshot.nodes.into_iter().map(DeviceNode::from).collect());
        let edges: Vec<RelayEdge> = snapshot.edges.into_iter().map(RelayEdge::from).collect();

        let mut next_keys: HashSet<EdgeKey> = HashSet::with_capacity(edges.len());
        let mut new_edges = Vec::new();
        for edge in &edges {
            let key = edge.key();
            let first_in_pass = next_keys.insert(key.clone());
            if first_in_pass && !self.seen_edge_keys.contains(&key) {
                new_edges.push(edge.clone());
            }
        }

        let cardinality_changed = nodes.len() != self.model.nodes.len();

        // Fold snapshot event summaries into the alert records we already
        // hold. Counts from a summary never overwrite a full record — the
        // record's id sets stay authoritative for the cross-check invariant.
        let mut events = std::mem::take(&mut self.model.events);
        for (event_id, summary) in snapshot.events {
            let entry = events.entry(event_id.clone()).or_insert_with(|| AlertMeta {
                event_id,
                ..Default::default()
            });
            entry.kind = summary.kind;
            entry.trust = summary.trust;
            if entry.devices_reached_ids.is_empty() {
                entry.devices_reached = summary.devices_reached;
            }
            if entry.cross_check_ids.is_empty() {
                entry.cross_checks = summary.cross_checks;
            }
        }

        let self_id = Some(snapshot.self_id).filter(|id| !id.is_empty());
        self.model = MeshModel {
            nodes,
            edges,
            events,
            self_id: self_id.or_else(|| self.model.self_id.take()),
            details: HashMap::new(),
        };
        self.model.rebuild_details();
        self.seen_edge_keys = next_keys;

        ReconcileOutcome {
            new_edges,
            cardinality_changed,
        }
    }

    /// Fold the polled alert list into the model. Full records win over the
    /// partial summaries the topology snapshot carries.
    pub fn merge_alerts(&mut self, alerts: Vec<AlertMeta>) {
        for alert in alerts {
            let alert = alert.normalized();
            self.model.events.insert(alert.event_id.clone(), alert);
        }
        self.model.rebuild_details();
    }
}

/// Drop a non-stable (address-only) node iff a stable node exists with the
/// same IP.
fn dedup_nodes(nodes: Vec<DeviceNode>) -> Vec<DeviceNode> {
    let stable_ips: HashSet<String> = nodes
        .iter()
        .filter(|n| !n.is_placeholder())
        .filter_map(|n| n.ip.clone())
        .collect();
    let mut out = nodes;
    out.retain(|node| {
        !(node.is_placeholder()
            && node
                .ip
                .as_ref()
                .is_some_and(|ip| stable_ips.contains(ip)))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::wire::{EventSummary, WireEdge, WireNode};

    fn wire_node(id: &str, ip: &str, is_self: bool) -> WireNode {
        WireNode {
            id: id.into(),
            label: String::new(),
            ip: ip.into(),
            is_self,
        }
    }

    fn wire_edge(from: &str, to: &str, event_id: &str, hop: u32) -> WireEdge {
        WireEdge {
            from_id: from.into(),
            to_id: to.into(),
            event_id: event_id.into(),
            hop,
        }
    }

    fn snapshot(nodes: Vec<WireNode>, edges: Vec<WireEdge>) -> TopologySnapshot {
        let mut events = HashMap::new();
        for edge in &edges {
            events.insert(
                edge.event_id.clone(),
                EventSummary {
                    kind: AlertType::Fire,
                    trust: TrustLevel::Low,
                    devices_reached: 2,
                    cross_checks: 0,
                },
            );
        }
        TopologySnapshot {
            nodes,
            edges,
            events,
            self_id: "SELF".into(),
        }
    }

    #[test]
    fn test_placeholder_dropped_for_stable_node_with_same_ip() {
        let mut rec = Reconciler::default();
        rec.apply(snapshot(
            vec![
                wire_node("PEER@10.0.0.2", "10.0.0.2", false),
                wire_node("DEVICE-X", "10.0.0.2", false),
            ],
            vec![],
        ));

        let ids: Vec<&str> = rec.model().nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["DEVICE-X"]);
    }

    #[test]
    fn test_placeholder_kept_without_stable_twin() {
        let mut rec = Reconciler::default();
        rec.apply(snapshot(
            vec![
                wire_node("PEER@10.0.0.7", "10.0.0.7", false),
                wire_node("DEVICE-X", "10.0.0.2", false),
            ],
            vec![],
        ));
        assert_eq!(rec.model().nodes.len(), 2);
    }

    #[test]
    fn test_edge_novelty_only_on_first_observation() {
        let mut rec = Reconciler::default();
        let make = || {
            snapshot(
                vec![wire_node("A", "", false), wire_node("B", "", false)],
                vec![wire_edge("A", "B", "E1", 0)],
            )
        };

        let first = rec.apply(make());
        assert_eq!(first.new_edges.len(), 1);
        assert_eq!(first.new_edges[0].key().event_id, "E1");

        let second = rec.apply(make());
        assert!(second.new_edges.is_empty());

        let third = rec.apply(make());
        assert!(third.new_edges.is_empty());
    }

    #[test]
    fn test_duplicate_edges_in_one_snapshot_spawn_once() {
        let mut rec = Reconciler::default();
        let outcome = rec.apply(snapshot(
            vec![wire_node("A", "", false), wire_node("B", "", false)],
            vec![wire_edge("A", "B", "E1", 0), wire_edge("A", "B", "E1", 2)],
        ));
        assert_eq!(outcome.new_edges.len(), 1);
    }

    #[test]
    fn test_cardinality_change_detection() {
        let mut rec = Reconciler::default();
        let two = vec![wire_node("SELF", "", true), wire_node("A", "", false)];
        let three = vec![
            wire_node("SELF", "", true),
            wire_node("A", "", false),
            wire_node("B", "", false),
        ];

        assert!(rec.apply(snapshot(two.clone(), vec![])).cardinality_changed);
        // Same cardinality, changed content: positions must stay put.
        let mut relabeled = two.clone();
        relabeled[1].label = "renamed".into();
        assert!(!rec.apply(snapshot(relabeled, vec![])).cardinality_changed);
        assert!(rec.apply(snapshot(three, vec![])).cardinality_changed);
    }

    #[test]
    fn test_full_alert_record_wins_over_summary_counts() {
        let mut rec = Reconciler::default();
        rec.merge_alerts(vec![AlertMeta {
            event_id: "E1".into(),
            origin_device: "A".into(),
            devices_reached_ids: ["A", "B", "C"].iter().map(|s| s.to_string()).collect(),
            cross_check_ids: ["B", "C"].iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }]);

        rec.apply(snapshot(
            vec![wire_node("A", "", false), wire_node("B", "", false)],
            vec![wire_edge("A", "B", "E1", 0)],
        ));

        let meta = rec.model().events.get("E1").expect("alert missing");
        assert_eq!(meta.cross_checks, 2);
        assert_eq!(meta.devices_reached, 3);
        // Summary still refreshes the display enums.
        assert_eq!(meta.kind, AlertType::Fire);
    }

    #[test]
    fn test_detail_map_rebuilt_per_pass() {
        let mut rec = Reconciler::default();
        rec.apply(snapshot(
            vec![wire_node("A", "", false), wire_node("B", "", false)],
            vec![wire_edge("A", "B", "E1", 0)],
        ));

        // Populated at reconcile time, ready before any draw pass asks.
        let detail = rec.model().details.get("A").expect("detail missing");
        assert_eq!(detail.relayed_kinds, vec![AlertType::Fire]);
        assert!(!rec.model().details.contains_key("B"));

        // A later pass without the edge drops the stale entry.
        rec.apply(snapshot(
            vec![wire_node("A", "", false), wire_node("B", "", false)],
            vec![],
        ));
        assert!(!rec.model().details.contains_key("A"));

        // merge_alerts refreshes authored entries too.
        rec.merge_alerts(vec![AlertMeta {
            event_id: "E9".into(),
            origin_device: "B".into(),
            ..Default::default()
        }]);
        assert_eq!(rec.model().details["B"].authored.len(), 1);
    }

    #[test]
    fn test_node_detail_aggregation() {
        let mut rec = Reconciler::default();
        rec.apply(TopologySnapshot {
            nodes: vec![wire_node("A", "", false), wire_node("B", "", false)],
            edges: vec![wire_edge("A", "B", "E1", 0), wire_edge("A", "B", "E2", 0)],
            events: HashMap::new(),
            self_id: "SELF".into(),
        });
        rec.merge_alerts(vec![
            AlertMeta {
                event_id: "E1".into(),
                kind: AlertType::Fire,
                trust: TrustLevel::Low,
                origin_device: "A".into(),
                ..Default::default()
            },
            AlertMeta {
                event_id: "E2".into(),
                kind: AlertType::Medical,
                trust: TrustLevel::High,
                origin_device: "B".into(),
                ..Default::default()
            },
        ]);

        let detail = rec.model().node_detail("A");
        assert_eq!(detail.relayed_kinds, vec![AlertType::Fire, AlertType::Medical]);
        assert_eq!(detail.top_trust, Some(TrustLevel::High));
        assert_eq!(detail.authored.len(), 1);
        assert_eq!(detail.authored[0].event_id, "E1");

        let empty = rec.model().node_detail("B");
        assert!(empty.relayed_kinds.is_empty());
        assert_eq!(empty.top_trust, None);
    }
}
