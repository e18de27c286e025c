use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use eframe::egui;
use egui::{
    CentralPanel, CollapsingHeader, Context, Id, Pos2, Rect, ScrollArea, Sense, SidePanel, Ui,
};
use egui_extras::{Column, TableBuilder};
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::api::client::{HttpMeshFeed, MeshFeed};
use crate::api::wire::{AlertMeta, BroadcastRequest, TopologySnapshot, VerifyReceipt};
use crate::gui::alert_feed::{self, AlertDraft, FeedCommand};
use crate::gui::detail_panel::{DeviceDetailPanel, device_detail_section};
use crate::gui::layout::ring_layout;
use crate::gui::mesh_view::{self, alert_color, resolve_hover};
use crate::gui::packet_anim::{PacketAnimation, PacketQueue};
use crate::mesh::model::Reconciler;
use crate::mesh::node::DeviceId;
use crate::mesh::verify::{self, Settled, VerifyEvent, VerifyState};

const POLL_INTERVAL: Duration = Duration::from_secs(2);

pub fn get_theme() -> catppuccin_egui::Theme {
    catppuccin_egui::MOCHA
}

pub fn main(rt: Arc<Runtime>) {
    let native_options = eframe::NativeOptions::default();
    let result = eframe::run_native(
        "MeshVis",
        native_options,
        Box::new(|cc| Ok(Box::new(App::new(cc, rt.clone())) as Box<dyn eframe::App>)),
    );

    if let Err(e) = result {
        eprintln!("{}", e);
    }
}

/// Everything the poll tasks and request tasks push back to the UI thread.
/// Drained with `try_recv` at the top of every frame, so handling never
/// blocks painting.
enum PollUpdate {
    Topology(TopologySnapshot),
    Alerts(Vec<AlertMeta>),
    VerifyOutcome {
        event_id: String,
        result: Result<VerifyReceipt, String>,
    },
    DismissOutcome {
        event_id: String,
        result: Result<(), String>,
    },
    BroadcastOutcome {
        result: Result<(), String>,
    },
}

struct App {
    feed: Arc<dyn MeshFeed>,
    runtime: Arc<Runtime>,
    egui_ctx: Context,

    reconciler: Reconciler,
    positions: HashMap<DeviceId, Pos2>,
    packets: PacketQueue,
    verify_states: HashMap<String, VerifyState>,
    alerts: Vec<AlertMeta>,

    selected_node: Option<DeviceId>,
    draft: AlertDraft,
    focused_event: Option<String>,
    status_line: Option<String>,

    focus_tx: watch::Sender<Option<String>>,
    updates_tx: mpsc::Sender<PollUpdate>,
    updates_rx: mpsc::Receiver<PollUpdate>,
    poll_tasks: Vec<JoinHandle<()>>,

    last_canvas: Option<Rect>,
}

impl App {
    fn new(cc: &eframe::CreationContext<'_>, runtime: Arc<Runtime>) -> Self {
        catppuccin_egui::set_theme(&cc.egui_ctx, get_theme());

        let feed: Arc<dyn MeshFeed> = Arc::new(HttpMeshFeed::default());
        let (updates_tx, updates_rx) = mpsc::channel();
        let (focus_tx, focus_rx) = watch::channel(None::<String>);

        let poll_tasks = spawn_poll_tasks(
            &runtime,
            feed.clone(),
            updates_tx.clone(),
            focus_rx,
            cc.egui_ctx.clone(),
        );

        Self {
            feed,
            runtime,
            egui_ctx: cc.egui_ctx.clone(),

            reconciler: Reconciler::default(),
            positions: HashMap::new(),
            packets: PacketQueue::default(),
            verify_states: HashMap::new(),
            alerts: Vec::new(),

            selected_node: None,
            draft: AlertDraft::default(),
            focused_event: None,
            status_line: None,

            focus_tx,
            updates_tx,
            updates_rx,
            poll_tasks,

            last_canvas: None,
        }
    }

    fn drain_updates(&mut self) {
        while let Ok(update) = self.updates_rx.try_recv() {
            self.handle_update(update);
        }
    }

    fn handle_update(&mut self, update: PollUpdate) {
        match update {
            PollUpdate::Topology(snapshot) => {
                let outcome = self.reconciler.apply(snapshot);
                if outcome.cardinality_changed || self.positions.is_empty() {
                    self.relayout();
                }

                for edge in &outcome.new_edges {
                    let (Some(&from), Some(&to)) = (
                        self.positions.get(&edge.from_id),
                        self.positions.get(&edge.to_id),
                    ) else {
                        // Endpoint not placed yet; its packet shows up on a
                        // later pass instead.
                        continue;
                    };
                    let color = self
                        .reconciler
                        .model()
                        .events
                        .get(&edge.event_id)
                        .map(|meta| alert_color(meta.kind))
                        .unwrap_or(get_theme().overlay1);
                    self.packets.push(PacketAnimation::new(from, to, color));
                }
                self.packets.compact();
                self.sync_verify_states();
            }
            PollUpdate::Alerts(alerts) => {
                self.reconciler.merge_alerts(alerts.clone());
                self.alerts = alerts.into_iter().map(AlertMeta::normalized).collect();
                self.sync_verify_states();
            }
            PollUpdate::VerifyOutcome { event_id, result } => {
                let event = match result {
                    Ok(receipt) => VerifyEvent::Settled(Settled::Verified {
                        cross_checks: receipt.cross_checks,
                        trust: receipt.trust,
                    }),
                    Err(message) => VerifyEvent::Failed { message },
                };
                self.step_state(&event_id, event);
            }
            PollUpdate::DismissOutcome { event_id, result } => {
                let event = match result {
                    Ok(()) => VerifyEvent::Settled(Settled::Dismissed),
                    Err(message) => VerifyEvent::Failed { message },
                };
                self.step_state(&event_id, event);
            }
            PollUpdate::BroadcastOutcome { result } => {
                self.status_line = Some(match result {
                    Ok(()) => "Alert broadcast into the mesh.".to_string(),
                    Err(e) => format!("Broadcast failed: {e}"),
                });
            }
        }
    }

    /// Make sure every known alert has a verification state, and refresh
    /// states the mesh has since decided for us. Interactive progress and
    /// in-flight requests are never overwritten.
    fn sync_verify_states(&mut self) {
        let Some(self_id) = self.reconciler.model().self_id.clone() else {
            return;
        };
        for meta in self.reconciler.model().events.values() {
            let state = self
                .verify_states
                .entry(meta.event_id.clone())
                .or_insert_with(|| VerifyState::for_viewer(meta, &self_id));

            let refreshable = matches!(
                state,
                VerifyState::Idle
                    | VerifyState::Prompting
                    | VerifyState::Confirming
                    | VerifyState::Dismissing
            );
            if refreshable && meta.originated_by(&self_id) {
                *state = VerifyState::OwnAlert;
            } else if refreshable && meta.verified_by(&self_id) {
                *state = VerifyState::Done(Settled::Verified {
                    cross_checks: meta.cross_checks,
                    trust: meta.trust,
                });
            }
        }
    }

    fn step_state(&mut self, event_id: &str, event: VerifyEvent) {
        if let Some(state) = self.verify_states.get_mut(event_id) {
            *state = verify::step(state.clone(), event);
        }
    }

    fn relayout(&mut self) {
        if let Some(rect) = self.last_canvas {
            self.positions = ring_layout(&self.reconciler.model().nodes, rect);
        }
    }

    fn process_commands(&mut self, commands: Vec<FeedCommand>) {
        for command in commands {
            match command {
                FeedCommand::Step { event_id, event } => self.step_state(&event_id, event),
                FeedCommand::SubmitVerification { event_id } => {
                    // Only one request per alert may be outstanding; anything
                    // but Confirming means the click raced a state change.
                    if self.verify_states.get(&event_id) != Some(&VerifyState::Confirming) {
                        continue;
                    }
                    self.step_state(&event_id, VerifyEvent::Submit);

                    let feed = self.feed.clone();
                    let tx = self.updates_tx.clone();
                    let ctx = self.egui_ctx.clone();
                    self.runtime.spawn(async move {
                        let result = feed
                            .submit_verification(&event_id)
                            .await
                            .map_err(|e| e.to_string());
                        let _ = tx.send(PollUpdate::VerifyOutcome { event_id, result });
                        ctx.request_repaint();
                    });
                }
                FeedCommand::SubmitDismissal { event_id } => {
                    if self.verify_states.get(&event_id) != Some(&VerifyState::Dismissing) {
                        continue;
                    }
                    self.step_state(&event_id, VerifyEvent::ConfirmDismiss);

                    let feed = self.feed.clone();
                    let tx = self.updates_tx.clone();
                    let ctx = self.egui_ctx.clone();
                    self.runtime.spawn(async move {
                        let result = feed
                            .submit_dismissal(&event_id)
                            .await
                            .map_err(|e| e.to_string());
                        let _ = tx.send(PollUpdate::DismissOutcome { event_id, result });
                        ctx.request_repaint();
                    });
                }
                FeedCommand::Focus(filter) => {
                    if self.focus_tx.send(filter.clone()).is_err() {
                        eprintln!("[app] focus update dropped, topology poll stopped");
                    }
                    self.focused_event = filter;
                }
                FeedCommand::RaiseAlert(draft) => self.raise_alert(draft),
            }
        }
    }

    fn raise_alert(&mut self, draft: AlertDraft) {
        let Some(device_id) = self.reconciler.model().self_id.clone() else {
            self.status_line =
                Some("Cannot broadcast yet, the mesh has not reported this device's id.".into());
            return;
        };
        let request = BroadcastRequest {
            event_id: Uuid::new_v4().to_string(),
            kind: draft.kind,
            device_id,
            description: draft.description.trim().to_string(),
            location: draft.location.trim().to_string(),
        };
        println!(
            "[app] Broadcasting {} alert {}",
            request.kind.wire_name(),
            request.event_id
        );

        let feed = self.feed.clone();
        let tx = self.updates_tx.clone();
        let ctx = self.egui_ctx.clone();
        self.runtime.spawn(async move {
            let result = feed.broadcast_alert(&request).await.map_err(|e| e.to_string());
            let _ = tx.send(PollUpdate::BroadcastOutcome { result });
            ctx.request_repaint();
        });
        self.status_line = Some("Broadcasting alert…".into());
    }

    fn render_devices_section(&mut self, ui: &mut Ui) {
        CollapsingHeader::new("Devices")
            .default_open(false)
            .show(ui, |ui| {
                let model = self.reconciler.model();
                let mut rows: Vec<_> = model
                    .nodes
                    .iter()
                    .map(|node| (node.clone(), model.node_detail(&node.id)))
                    .collect();
                rows.sort_by(|a, b| {
                    b.0.is_self.cmp(&a.0.is_self).then(a.0.label.cmp(&b.0.label))
                });

                let mut clicked: Option<DeviceId> = None;
                let table = TableBuilder::new(ui)
                    .striped(true)
                    .resizable(true)
                    .column(Column::auto().at_least(90.0))
                    .column(Column::auto().at_least(80.0))
                    .column(Column::auto().at_least(60.0))
                    .column(Column::auto().at_least(55.0));

                table
                    .header(20.0, |mut header| {
                        header.col(|ui| { ui.strong("Device"); });
                        header.col(|ui| { ui.strong("IP"); });
                        header.col(|ui| { ui.strong("Relaying"); });
                        header.col(|ui| { ui.strong("Trust"); });
                    })
                    .body(|mut body| {
                        for (node, detail) in &rows {
                            body.row(22.0, |mut row| {
                                row.col(|ui| {
                                    if ui.link(&node.label).clicked() {
                                        clicked = Some(node.id.clone());
                                    }
                                });
                                row.col(|ui| {
                                    ui.label(node.ip.as_deref().unwrap_or("-"));
                                });
                                row.col(|ui| {
                                    if detail.relayed_kinds.is_empty() {
                                        ui.label("-");
                                    } else {
                                        let icons: Vec<&str> = detail
                                            .relayed_kinds
                                            .iter()
                                            .map(|kind| kind.icon())
                                            .collect();
                                        ui.label(icons.join(" "));
                                    }
                                });
                                row.col(|ui| {
                                    ui.label(
                                        detail
                                            .top_trust
                                            .map(|t| t.wire_name())
                                            .unwrap_or("-"),
                                    );
                                });
                            });
                        }
                    });

                if let Some(id) = clicked {
                    self.selected_node = Some(id);
                }
            });
    }

    fn render(&mut self, ctx: &Context) -> Vec<FeedCommand> {
        let mut commands = Vec::new();

        SidePanel::right("alert_panel")
            .min_width(300.0)
            .show(ctx, |ui| {
                ui.heading("Alerts");
                ScrollArea::vertical()
                    .auto_shrink([false, true])
                    .max_height(ui.available_height() - 160.0)
                    .show(ui, |ui| {
                        alert_feed::show_alert_feed(
                            ui,
                            &self.alerts,
                            &self.verify_states,
                            self.focused_event.as_deref(),
                            &mut commands,
                        );
                    });

                ui.separator();
                self.render_devices_section(ui);

                ui.separator();
                CollapsingHeader::new("Raise an alert")
                    .default_open(false)
                    .show(ui, |ui| {
                        alert_feed::show_raise_alert_form(ui, &mut self.draft, &mut commands);
                    });

                if let Some(status) = &self.status_line {
                    ui.separator();
                    ui.weak(status);
                }
            });

        CentralPanel::default().show(ctx, |ui| {
            let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::click());
            let rect = response.rect;
            if self.last_canvas != Some(rect) {
                self.last_canvas = Some(rect);
                self.relayout();
            }

            let hovered_id: Option<DeviceId> = response.hover_pos().and_then(|pointer| {
                resolve_hover(pointer, &self.reconciler.model().nodes, &self.positions)
                    .map(|node| node.id.clone())
            });
            if response.clicked() {
                self.selected_node = hovered_id.clone();
            }

            mesh_view::paint_mesh(
                &painter,
                rect,
                self.reconciler.model(),
                &self.positions,
                &mut self.packets,
                hovered_id.as_deref(),
                self.selected_node.as_deref(),
            );

            if let Some(id) = self.selected_node.clone().or(hovered_id) {
                let model = self.reconciler.model();
                if let (Some(node), Some(&anchor)) = (
                    model.nodes.iter().find(|n| n.id == id),
                    self.positions.get(&id),
                ) {
                    let detail = model.node_detail(&id);
                    let panel = DeviceDetailPanel::new(Id::new(("device_panel", &id)), anchor);
                    let resp = panel.show(ctx, &node.label, |ui, _ctx| {
                        device_detail_section(ui, node, &detail);
                    });
                    if resp.close_clicked {
                        self.selected_node = None;
                    }
                }
            }

            if !self.packets.is_empty() {
                ui.ctx().request_repaint();
            }
        });

        commands
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _: &mut eframe::Frame) {
        self.drain_updates();
        let commands = self.render(ctx);
        self.process_commands(commands);
    }
}

impl Drop for App {
    fn drop(&mut self) {
        for task in &self.poll_tasks {
            task.abort();
        }
    }
}

fn spawn_poll_tasks(
    runtime: &Runtime,
    feed: Arc<dyn MeshFeed>,
    tx: mpsc::Sender<PollUpdate>,
    focus_rx: watch::Receiver<Option<String>>,
    ctx: Context,
) -> Vec<JoinHandle<()>> {
    let topology = {
        let feed = feed.clone();
        let tx = tx.clone();
        let ctx = ctx.clone();
        runtime.spawn(async move {
            let mut ticker = tokio::time::interval(POLL_INTERVAL);
            loop {
                ticker.tick().await;
                let filter = focus_rx.borrow().clone();
                match feed.fetch_topology(filter.as_deref()).await {
                    Ok(snapshot) => {
                        if tx.send(PollUpdate::Topology(snapshot)).is_err() {
                            break;
                        }
                        ctx.request_repaint();
                    }
                    Err(e) => eprintln!("[poll] topology fetch failed: {}", e),
                }
            }
        })
    };

    let alerts = runtime.spawn(async move {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        loop {
            ticker.tick().await;
            match feed.fetch_alerts().await {
                Ok(alerts) => {
                    if tx.send(PollUpdate::Alerts(alerts)).is_err() {
                        break;
                    }
                    ctx.request_repaint();
                }
                Err(e) => eprintln!("[poll] alert fetch failed: {}", e),
            }
        }
    });

    vec![topology, alerts]
}
