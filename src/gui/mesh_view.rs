/*!
The mesh canvas: one paint pass per frame over the reconciled model.

Draw order matters: edges first (colored by alert type, styled by trust),
then directional arrowheads and hop labels, then the live packet dots, then
nodes on top. Packet progress is advanced while the packet is painted — the
animation tick is co-located with drawing, there is no separate timer.

The pass only reads the model and position map; the one thing it mutates is
the packet queue it owns for the frame. It never blocks.
*/

use std::collections::HashMap;

use egui::{Align2, Color32, FontId, Painter, Pos2, Rect, Shape, Stroke, Vec2};

use crate::api::wire::{AlertType, TrustLevel};
use crate::gui::app;
use crate::gui::packet_anim::PacketQueue;
use crate::mesh::model::MeshModel;
use crate::mesh::node::{DeviceId, DeviceNode};

pub const PEER_RADIUS: f32 = 13.0;
pub const SELF_RADIUS: f32 = 18.0;
const HOVER_MARGIN: f32 = 4.0;
const PACKET_RADIUS: f32 = 3.5;
const ARROW_LEN: f32 = 9.0;
const EDGE_GAP: f32 = 2.0;

pub fn node_radius(node: &DeviceNode) -> f32 {
    if node.is_self { SELF_RADIUS } else { PEER_RADIUS }
}

pub fn alert_color(kind: AlertType) -> Color32 {
    let theme = app::get_theme();
    match kind {
        AlertType::Fire => theme.red,
        AlertType::Medical => theme.teal,
        AlertType::Security => theme.yellow,
        AlertType::Unknown => theme.overlay1,
    }
}

/// Stroke treatment per trust level: the less corroborated an alert is, the
/// thinner, fainter and more broken its edges render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrustStyle {
    pub width: f32,
    pub alpha: f32,
    pub dashed: bool,
}

pub fn trust_style(level: TrustLevel) -> TrustStyle {
    match level {
        TrustLevel::Low => TrustStyle {
            width: 1.2,
            alpha: 0.40,
            dashed: true,
        },
        TrustLevel::Medium => TrustStyle {
            width: 2.0,
            alpha: 0.75,
            dashed: false,
        },
        TrustLevel::High => TrustStyle {
            width: 3.0,
            alpha: 1.0,
            dashed: false,
        },
    }
}

fn with_alpha(color: Color32, alpha: f32) -> Color32 {
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), (alpha * 255.0) as u8)
}

/// First node (in the node set's natural order) whose circle, padded by a
/// small margin, contains the pointer. Deterministic tie-break: first match
/// wins.
pub fn resolve_hover<'a>(
    pointer: Pos2,
    nodes: &'a [DeviceNode],
    positions: &HashMap<DeviceId, Pos2>,
) -> Option<&'a DeviceNode> {
    nodes.iter().find(|node| {
        positions
            .get(&node.id)
            .is_some_and(|pos| (pointer - *pos).length() <= node_radius(node) + HOVER_MARGIN)
    })
}

pub fn paint_mesh(
    painter: &Painter,
    rect: Rect,
    model: &MeshModel,
    positions: &HashMap<DeviceId, Pos2>,
    packets: &mut PacketQueue,
    hovered: Option<&str>,
    selected: Option<&str>,
) {
    let theme = app::get_theme();
    painter.rect_filled(rect, 0.0, theme.mantle);

    if model.is_empty() {
        paint_empty_state(painter, rect, theme);
        return;
    }

    // At most one node is self, and it carries the self id.
    let radius_of = |id: &str| {
        if model.self_id.as_deref() == Some(id) {
            SELF_RADIUS
        } else {
            PEER_RADIUS
        }
    };

    for edge in &model.edges {
        let (Some(&from), Some(&to)) = (positions.get(&edge.from_id), positions.get(&edge.to_id))
        else {
            // Expected transient: the endpoint arrived after the last layout.
            continue;
        };
        let (color, style) = match model.events.get(&edge.event_id) {
            Some(meta) => (alert_color(meta.kind), trust_style(meta.trust)),
            None => (theme.overlay0, trust_style(TrustLevel::Low)),
        };
        paint_edge(
            painter,
            from,
            to,
            radius_of(&edge.from_id),
            radius_of(&edge.to_id),
            edge.hop,
            color,
            style,
            theme,
        );
    }

    for packet in packets.iter_mut() {
        painter.circle_filled(packet.position(), PACKET_RADIUS, packet.color);
        *packet = packet.advanced();
    }

    for node in &model.nodes {
        let Some(&pos) = positions.get(&node.id) else {
            continue;
        };
        let is_hovered = hovered == Some(node.id.as_str());
        let is_selected = selected == Some(node.id.as_str());
        paint_node(painter, node, pos, model, is_hovered || is_selected, theme);
    }
}

fn paint_empty_state(painter: &Painter, rect: Rect, theme: catppuccin_egui::Theme) {
    painter.text(
        rect.center(),
        Align2::CENTER_CENTER,
        "Mesh is empty",
        FontId::proportional(18.0),
        theme.overlay1,
    );
    painter.text(
        rect.center() + Vec2::new(0.0, 24.0),
        Align2::CENTER_CENTER,
        "Waiting for peers and relayed alerts…",
        FontId::proportional(13.0),
        theme.overlay0,
    );
}

/// Retract an edge to its endpoint node boundaries. `None` when the nodes sit
/// so close that no visible segment remains between them.
fn edge_span(from: Pos2, to: Pos2, from_radius: f32, to_radius: f32) -> Option<(Pos2, Pos2)> {
    let span = to - from;
    let length = span.length();
    if length <= from_radius + to_radius + 2.0 * EDGE_GAP {
        return None;
    }
    let dir = span / length;
    Some((
        from + dir * (from_radius + EDGE_GAP),
        to - dir * (to_radius + EDGE_GAP),
    ))
}

fn paint_edge(
    painter: &Painter,
    from: Pos2,
    to: Pos2,
    from_radius: f32,
    to_radius: f32,
    hop: u32,
    color: Color32,
    style: TrustStyle,
    theme: catppuccin_egui::Theme,
) {
    let Some((start, end)) = edge_span(from, to, from_radius, to_radius) else {
        return;
    };
    let dir = (end - start).normalized();

    let stroke = Stroke {
        width: style.width,
        color: with_alpha(color, style.alpha),
    };
    if style.dashed {
        let segment_len = (end - start).length();
        painter.extend(Shape::dashed_line(
            &[start, end],
            stroke,
            segment_len / 12.0,
            segment_len / 18.0,
        ));
    } else {
        painter.line_segment([start, end], stroke);
    }

    // Directional arrowhead at the receiving end.
    let normal = Vec2::new(-dir.y, dir.x);
    let tip = end;
    let left = tip - dir * ARROW_LEN + normal * (ARROW_LEN * 0.5);
    let right = tip - dir * ARROW_LEN - normal * (ARROW_LEN * 0.5);
    painter.line_segment([tip, left], stroke);
    painter.line_segment([tip, right], stroke);

    // Hop depth label, offset perpendicular to the edge so it clears the line.
    let mid = Pos2::new((start.x + end.x) * 0.5, (start.y + end.y) * 0.5);
    painter.text(
        mid + normal * 9.0,
        Align2::CENTER_CENTER,
        format!("h{hop}"),
        FontId::proportional(10.0),
        with_alpha(theme.subtext0, style.alpha.max(0.6)),
    );
}

fn paint_node(
    painter: &Painter,
    node: &DeviceNode,
    pos: Pos2,
    model: &MeshModel,
    highlighted: bool,
    theme: catppuccin_egui::Theme,
) {
    let radius = node_radius(node);
    // Reads the detail map rebuilt at reconcile time; no per-frame assembly.
    let detail = model.details.get(&node.id);

    // Ring color follows the strongest alert this device carries; idle peers
    // stay neutral.
    let ring_color = detail
        .and_then(|d| d.relayed_kinds.first())
        .map(|kind| alert_color(*kind))
        .unwrap_or(if node.is_self { theme.blue } else { theme.overlay1 });
    let ring_width = match detail.and_then(|d| d.top_trust) {
        Some(TrustLevel::High) => 3.0,
        Some(TrustLevel::Medium) => 2.2,
        Some(TrustLevel::Low) => 1.5,
        None => 1.2,
    };

    if node.is_self {
        // Soft glow behind the self node.
        painter.circle_filled(pos, radius + 7.0, with_alpha(theme.blue, 0.12));
    }

    let fill = if node.is_self { theme.surface2 } else { theme.surface0 };
    painter.circle_filled(pos, radius, fill);
    painter.circle_stroke(
        pos,
        radius,
        Stroke {
            width: ring_width,
            color: ring_color,
        },
    );

    // Hover/selection ring fades in and out, same trick the partition
    // highlight uses elsewhere in egui land.
    let fade = painter
        .ctx()
        .animate_bool(egui::Id::new(("node_highlight", &node.id)), highlighted);
    if fade > 0.01 {
        painter.circle_stroke(
            pos,
            radius + 3.0 + 2.0 * fade,
            Stroke {
                width: 2.0 * fade,
                color: with_alpha(theme.yellow, fade),
            },
        );
    }

    painter.text(
        pos + Vec2::new(0.0, radius + 5.0),
        Align2::CENTER_TOP,
        &node.label,
        FontId::proportional(11.0),
        if node.is_self { theme.text } else { theme.subtext1 },
    );
}
