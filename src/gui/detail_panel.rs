use egui::{
    self, CollapsingHeader, Context, Frame, Id, InnerResponse, Label, Order, Pos2, Response, Ui,
    Vec2,
};

use crate::gui::mesh_view::alert_color;
use crate::mesh::model::NodeDetail;
use crate::mesh::node::DeviceNode;

/// A floating panel anchored near a device on the canvas, used for the
/// hover/selection detail view.
///
/// Typical usage:
/// - Create from the device's screen position.
/// - Call `show` with a closure that builds the content.
/// - Use `device_detail_section` / `collapsible_section` to keep content
///   modular.
///
/// The panel persists a "pinned" flag per `Id` in egui's memory so the user
/// can drag it around and keep it open independently from hover/selection.
#[derive(Debug, Clone)]
pub struct DeviceDetailPanel {
    id: Id,
    anchor: Pos2,
    options: DetailPanelOptions,
}

#[derive(Debug, Clone)]
pub struct DetailPanelOptions {
    /// Offset applied to the anchor position. Positive y moves downward.
    pub offset: Vec2,
    pub min_width: f32,
    pub order: Order,
    pub pinned_default: bool,
}

impl Default for DetailPanelOptions {
    fn default() -> Self {
        Self {
            offset: Vec2 { x: 14.0, y: -60.0 },
            min_width: 240.0,
            order: Order::Foreground,
            pinned_default: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetailPanelResponse {
    pub rect: egui::Rect,
    pub pinned: bool,
    pub close_clicked: bool,
    pub area_response: Response,
}

impl DeviceDetailPanel {
    pub fn new(id: Id, anchor: Pos2) -> Self {
        Self {
            id,
            anchor,
            options: DetailPanelOptions::default(),
        }
    }

    /// Show the floating panel and build its contents with the provided
    /// closure.
    pub fn show(
        &self,
        ctx: &Context,
        title: &str,
        add_contents: impl FnOnce(&mut Ui, &Context),
    ) -> DetailPanelResponse {
        let pos = self.anchor + self.options.offset;
        let mut pinned_state = persisted_pin(ctx, self.id).unwrap_or(self.options.pinned_default);
        let mut close_clicked = false;

        let area: InnerResponse<()> = egui::Area::new(self.id)
            .order(self.options.order)
            .movable(pinned_state)
            .interactable(true)
            .constrain(true)
            .fixed_pos(pos)
            .show(ctx, |ui| {
                let frame = Frame::popup(ui.style());
                frame.show(ui, |ui| {
                    ui.set_min_width(self.options.min_width);

                    ui.horizontal(|ui| {
                        ui.strong(title);
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if ui
                                .add(egui::Button::new("✕").small())
                                .on_hover_text("Close")
                                .clicked()
                            {
                                close_clicked = true;
                            }
                            let pin_label = if pinned_state { "📌" } else { "📍" };
                            if ui
                                .add(egui::Button::new(pin_label).small())
                                .on_hover_text(if pinned_state {
                                    "Unpin (panel will follow selection/hover)"
                                } else {
                                    "Pin (panel becomes draggable and remains visible)"
                                })
                                .clicked()
                            {
                                pinned_state = !pinned_state;
                            }
                        });
                    });

                    ui.add_space(6.0);
                    add_contents(ui, ctx);
                });
            });

        set_persisted_pin(ctx, self.id, pinned_state);

        DetailPanelResponse {
            rect: area.response.rect,
            pinned: pinned_state,
            close_clicked,
            area_response: area.response,
        }
    }
}

/// Standard body for the device detail panel: identity, relayed alert types
/// with the strongest trust among them, and the alerts this device authored.
pub fn device_detail_section(ui: &mut Ui, node: &DeviceNode, detail: &NodeDetail) {
    ui.add(label_no_wrap(format!("Device ID: {}", node.id)));
    if let Some(ip) = &node.ip {
        ui.add(label_no_wrap(format!("IP: {ip}")));
    }
    if node.is_self {
        ui.label("This device");
    }

    ui.separator();

    if detail.relayed_kinds.is_empty() {
        ui.label("No alerts relayed through this device.");
    } else {
        ui.horizontal(|ui| {
            ui.label("Relaying:");
            for kind in &detail.relayed_kinds {
                ui.colored_label(alert_color(*kind), format!("{} {}", kind.icon(), kind.wire_name()));
            }
        });
        if let Some(trust) = detail.top_trust {
            ui.label(format!("Highest trust: {}", trust.wire_name()));
        }
    }

    if !detail.authored.is_empty() {
        collapsible_section(ui, "Alerts raised by this device", true, |ui| {
            bullet_list(
                ui,
                detail.authored.iter().map(|meta| {
                    format!(
                        "{} {} — {} cross-checks",
                        meta.kind.icon(),
                        meta.kind.wire_name(),
                        meta.cross_checks
                    )
                }),
            );
        });
    }
}

/// Convenience: render a collapsible section with a standard grouped frame.
pub fn collapsible_section(
    ui: &mut Ui,
    title: impl Into<egui::WidgetText>,
    default_open: bool,
    add_contents: impl FnOnce(&mut Ui),
) {
    CollapsingHeader::new(title)
        .default_open(default_open)
        .show(ui, |ui| {
            Frame::group(ui.style()).show(ui, |ui| {
                add_contents(ui);
            });
        });
}

pub fn label_no_wrap(text: impl Into<egui::WidgetText>) -> Label {
    Label::new(text).wrap_mode(egui::TextWrapMode::Extend)
}

/// Tiny helper to render a bullet point list.
pub fn bullet_list<I, S>(ui: &mut Ui, items: I)
where
    I: IntoIterator<Item = S>,
    S: ToString,
{
    for item in items {
        ui.horizontal(|ui| {
            ui.label("•");
            ui.label(item.to_string());
        });
    }
}

fn persisted_pin(ctx: &Context, id: Id) -> Option<bool> {
    ctx.data_mut(|d| d.get_persisted::<bool>(id))
}

fn set_persisted_pin(ctx: &Context, id: Id, value: bool) {
    ctx.data_mut(|d| d.insert_persisted(id, value));
}
