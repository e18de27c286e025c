/*!
GUI-facing mesh feed interface.

This module defines:
- `FeedError`: error taxonomy for feed access (transport vs payload).
- `MeshFeed`: an async trait covering everything the visualizer consumes or
  issues — topology snapshots, the alert list, verification, dismissal and
  locally raised broadcasts.
- `HttpMeshFeed`: the REST implementation against a local mesh node.

Tests and the reconciler scenario suite implement `MeshFeed` with scripted
in-memory feeds instead of a live node.
*/

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::api::wire::{AlertMeta, BroadcastRequest, TopologySnapshot, VerifyReceipt};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

#[derive(Debug, Error)]
pub enum FeedError {
    /// Underlying transport error (connect, timeout, TLS, ...).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The node answered with a non-success status.
    #[error("unexpected status {0}: {1}")]
    Status(u16, String),
    /// The body arrived but did not decode into the expected shape.
    #[error("payload error: {0}")]
    Payload(String),
}

pub type FeedResult<T> = Result<T, FeedError>;

#[async_trait]
pub trait MeshFeed: Send + Sync {
    /// Fetch the relay topology, optionally narrowed to a single alert.
    async fn fetch_topology(&self, event_filter: Option<&str>) -> FeedResult<TopologySnapshot>;

    /// Fetch the full alert list, newest first.
    async fn fetch_alerts(&self) -> FeedResult<Vec<AlertMeta>>;

    /// Record the local viewer as an independent cross-check for an alert.
    async fn submit_verification(&self, event_id: &str) -> FeedResult<VerifyReceipt>;

    /// Record that the local viewer cannot confirm an alert. Does not touch
    /// cross-check counts.
    async fn submit_dismissal(&self, event_id: &str) -> FeedResult<()>;

    /// Broadcast a locally raised alert into the mesh.
    async fn broadcast_alert(&self, request: &BroadcastRequest) -> FeedResult<()>;
}

pub struct HttpMeshFeed {
    client: reqwest::Client,
    base_url: String,
}

impl Default for HttpMeshFeed {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl HttpMeshFeed {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> FeedResult<T> {
        let response = self.client.get(&url).send().await?;
        Self::decode(response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        url: String,
        body: Option<&impl serde::Serialize>,
    ) -> FeedResult<T> {
        let mut request = self.client.post(&url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> FeedResult<T> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16(), text));
        }
        serde_json::from_str(&text).map_err(|e| FeedError::Payload(e.to_string()))
    }
}

#[async_trait]
impl MeshFeed for HttpMeshFeed {
    async fn fetch_topology(&self, event_filter: Option<&str>) -> FeedResult<TopologySnapshot> {
        let url = match event_filter {
            Some(event_id) => format!("{}?event_id={}", self.endpoint("/api/hops"), event_id),
            None => self.endpoint("/api/hops"),
        };
        self.get_json(url).await
    }

    async fn fetch_alerts(&self) -> FeedResult<Vec<AlertMeta>> {
        self.get_json(self.endpoint("/api/events")).await
    }

    async fn submit_verification(&self, event_id: &str) -> FeedResult<VerifyReceipt> {
        let url = self.endpoint(&format!("/api/events/{}/verify", event_id));
        self.post_json(url, None::<&()>).await
    }

    async fn submit_dismissal(&self, event_id: &str) -> FeedResult<()> {
        let url = self.endpoint(&format!("/api/events/{}/dismiss", event_id));
        // Fire-and-forget acknowledgment; only the status matters.
        let _: serde_json::Value = self.post_json(url, None::<&()>).await?;
        Ok(())
    }

    async fn broadcast_alert(&self, request: &BroadcastRequest) -> FeedResult<()> {
        let _: serde_json::Value = self
            .post_json(self.endpoint("/api/broadcast"), Some(request))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::api::wire::{AlertType, EventSummary, TrustLevel, WireEdge, WireNode};
    use crate::gui::layout::ring_layout;
    use crate::gui::packet_anim::{PacketAnimation, PacketQueue};
    use crate::mesh::edge::RelayEdge;
    use crate::mesh::model::Reconciler;
    use crate::mesh::node::DeviceId;
    use crate::mesh::verify::{self, Settled, VerifyEvent, VerifyState};

    fn spawn_packets(
        packets: &mut PacketQueue,
        new_edges: &[RelayEdge],
        positions: &std::collections::HashMap<DeviceId, egui::Pos2>,
    ) {
        for edge in new_edges {
            let (Some(&from), Some(&to)) =
                (positions.get(&edge.from_id), positions.get(&edge.to_id))
            else {
                continue;
            };
            packets.push(PacketAnimation::new(from, to, egui::Color32::RED));
        }
    }

    #[test]
    fn test_endpoint_building() {
        let feed = HttpMeshFeed::new("http://10.0.0.5:5000/");
        assert_eq!(feed.endpoint("/api/hops"), "http://10.0.0.5:5000/api/hops");
        assert_eq!(
            feed.endpoint("/api/events/E1/verify"),
            "http://10.0.0.5:5000/api/events/E1/verify"
        );
    }

    /// Replays canned snapshots in order, then reports unavailable.
    struct ScriptedFeed {
        snapshots: Mutex<Vec<TopologySnapshot>>,
        alerts: Vec<AlertMeta>,
    }

    #[async_trait]
    impl MeshFeed for ScriptedFeed {
        async fn fetch_topology(
            &self,
            _event_filter: Option<&str>,
        ) -> FeedResult<TopologySnapshot> {
            let mut snapshots = self
                .snapshots
                .lock()
                .map_err(|_| FeedError::Payload("lock poisoned".into()))?;
            if snapshots.is_empty() {
                return Err(FeedError::Status(503, "script exhausted".into()));
            }
            Ok(snapshots.remove(0))
        }

        async fn fetch_alerts(&self) -> FeedResult<Vec<AlertMeta>> {
            Ok(self.alerts.clone())
        }

        async fn submit_verification(&self, _event_id: &str) -> FeedResult<VerifyReceipt> {
            Ok(VerifyReceipt {
                verified_by: "DEVICE-SELF".into(),
                cross_checks: 1,
                trust: TrustLevel::Medium,
            })
        }

        async fn submit_dismissal(&self, _event_id: &str) -> FeedResult<()> {
            Ok(())
        }

        async fn broadcast_alert(&self, _request: &BroadcastRequest) -> FeedResult<()> {
            Ok(())
        }
    }

    fn wire_node(id: &str, is_self: bool) -> WireNode {
        WireNode {
            id: id.into(),
            label: String::new(),
            ip: String::new(),
            is_self,
        }
    }

    fn wire_edge(from: &str, to: &str) -> WireEdge {
        WireEdge {
            from_id: from.into(),
            to_id: to.into(),
            event_id: "E1".into(),
            hop: 0,
        }
    }

    fn snapshot(nodes: Vec<WireNode>, edges: Vec<WireEdge>) -> TopologySnapshot {
        let mut events = HashMap::new();
        events.insert(
            "E1".to_string(),
            EventSummary {
                kind: AlertType::Fire,
                trust: TrustLevel::Low,
                devices_reached: 2,
                cross_checks: 0,
            },
        );
        TopologySnapshot {
            nodes,
            edges,
            events,
            self_id: "DEVICE-SELF".into(),
        }
    }

    #[tokio::test]
    async fn test_scripted_feed_drives_reconciliation_and_verification() {
        let feed = ScriptedFeed {
            snapshots: Mutex::new(vec![
                snapshot(
                    vec![wire_node("DEVICE-SELF", true), wire_node("DEVICE-A", false)],
                    vec![wire_edge("DEVICE-SELF", "DEVICE-A")],
                ),
                snapshot(
                    vec![
                        wire_node("DEVICE-SELF", true),
                        wire_node("DEVICE-A", false),
                        wire_node("DEVICE-B", false),
                    ],
                    vec![
                        wire_edge("DEVICE-SELF", "DEVICE-A"),
                        wire_edge("DEVICE-A", "DEVICE-B"),
                    ],
                ),
            ]),
            alerts: vec![AlertMeta {
                event_id: "E1".into(),
                kind: AlertType::Fire,
                origin_device: "DEVICE-A".into(),
                ..Default::default()
            }],
        };

        let mut rec = Reconciler::default();
        let mut packets = PacketQueue::default();
        let canvas = egui::Rect::from_min_size(egui::Pos2::ZERO, egui::Vec2::new(800.0, 600.0));

        let first = rec.apply(feed.fetch_topology(None).await.unwrap());
        assert_eq!(first.new_edges.len(), 1);
        assert!(first.cardinality_changed);

        let mut positions = ring_layout(&rec.model().nodes, canvas);
        assert_eq!(positions.len(), rec.model().nodes.len());
        spawn_packets(&mut packets, &first.new_edges, &positions);
        assert_eq!(packets.len(), 1);

        let second = rec.apply(feed.fetch_topology(None).await.unwrap());
        assert_eq!(second.new_edges.len(), 1, "only the unseen edge is new");
        assert_eq!(second.new_edges[0].to_id, "DEVICE-B");
        assert!(second.cardinality_changed);

        positions = ring_layout(&rec.model().nodes, canvas);
        spawn_packets(&mut packets, &second.new_edges, &positions);
        assert_eq!(packets.len(), 2);

        // Exhausted script degrades to an error, not a panic.
        assert!(feed.fetch_topology(None).await.is_err());

        rec.merge_alerts(feed.fetch_alerts().await.unwrap());
        let meta = rec.model().events.get("E1").unwrap();

        let mut state = VerifyState::for_viewer(meta, "DEVICE-SELF");
        assert_eq!(state, VerifyState::Idle);
        state = verify::step(state, VerifyEvent::Initiate);
        state = verify::step(state, VerifyEvent::Acknowledge);
        state = verify::step(state, VerifyEvent::Submit);
        assert!(state.is_in_flight());

        let receipt = feed.submit_verification("E1").await.unwrap();
        state = verify::step(
            state,
            VerifyEvent::Settled(Settled::Verified {
                cross_checks: receipt.cross_checks,
                trust: receipt.trust,
            }),
        );
        assert_eq!(
            state,
            VerifyState::Done(Settled::Verified {
                cross_checks: 1,
                trust: TrustLevel::Medium,
            })
        );
    }
}
