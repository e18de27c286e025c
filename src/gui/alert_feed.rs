//! The alert feed: one card per alert with the verification flow controls.
//!
//! The cards are a pure view over `AlertMeta` plus the per-alert
//! `VerifyState`; every interaction comes back as a `FeedCommand` for the app
//! to process, so no flow logic lives in here.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use egui::{Frame, Ui};

use crate::api::wire::{AlertMeta, AlertType, TrustLevel};
use crate::gui::app;
use crate::gui::mesh_view::alert_color;
use crate::mesh::verify::{Settled, VerifyEvent, VerifyState};

#[derive(Debug, Clone)]
pub enum FeedCommand {
    /// A pure state-machine transition (no request involved).
    Step {
        event_id: String,
        event: VerifyEvent,
    },
    /// The viewer submitted their confirmation; start the verify request.
    SubmitVerification { event_id: String },
    /// The viewer confirmed the dismissal; start the dismiss request.
    SubmitDismissal { event_id: String },
    /// Narrow the topology poll to one alert, or clear the filter.
    Focus(Option<String>),
    /// Broadcast a locally raised alert.
    RaiseAlert(AlertDraft),
}

/// Form state for raising a new alert.
#[derive(Debug, Clone)]
pub struct AlertDraft {
    pub kind: AlertType,
    pub description: String,
    pub location: String,
}

impl Default for AlertDraft {
    fn default() -> Self {
        Self {
            kind: AlertType::Fire,
            description: String::new(),
            location: String::new(),
        }
    }
}

pub fn show_alert_feed(
    ui: &mut Ui,
    alerts: &[AlertMeta],
    states: &HashMap<String, VerifyState>,
    focused: Option<&str>,
    commands: &mut Vec<FeedCommand>,
) {
    if alerts.is_empty() {
        ui.weak("No alerts yet.");
        return;
    }
    for meta in feed_order(alerts) {
        alert_card(ui, meta, states.get(&meta.event_id), focused, commands);
        ui.add_space(4.0);
    }
}

/// Alerts awaiting the viewer's decision come first, then newest first.
fn feed_order(alerts: &[AlertMeta]) -> Vec<&AlertMeta> {
    let mut order: Vec<&AlertMeta> = alerts.iter().collect();
    order.sort_by(|a, b| {
        let a_pending = a.pending_verify && !a.dismissed;
        let b_pending = b.pending_verify && !b.dismissed;
        b_pending
            .cmp(&a_pending)
            .then(b.first_seen.total_cmp(&a.first_seen))
    });
    order
}

fn trust_badge_color(level: TrustLevel) -> egui::Color32 {
    let theme = app::get_theme();
    match level {
        TrustLevel::Low => theme.overlay1,
        TrustLevel::Medium => theme.sapphire,
        TrustLevel::High => theme.green,
    }
}

fn age_text(first_seen: f64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs_f64();
    let age = Duration::from_secs((now - first_seen).max(0.0) as u64);
    format!("{} ago", humantime::format_duration(age))
}

fn alert_card(
    ui: &mut Ui,
    meta: &AlertMeta,
    state: Option<&VerifyState>,
    focused: Option<&str>,
    commands: &mut Vec<FeedCommand>,
) {
    let theme = app::get_theme();
    Frame::group(ui.style()).show(ui, |ui| {
        ui.set_width(ui.available_width());

        ui.horizontal(|ui| {
            ui.colored_label(
                alert_color(meta.kind),
                format!("{} {}", meta.kind.icon(), meta.kind.wire_name()),
            );
            if meta.authorized_node {
                ui.colored_label(theme.green, "✔ authorized");
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.colored_label(trust_badge_color(meta.trust), meta.trust.wire_name());
            });
        });

        if !meta.description.is_empty() {
            ui.label(&meta.description);
        }
        if !meta.location.is_empty() {
            ui.weak(format!("📍 {}", meta.location));
        }
        ui.weak(format!(
            "reach {} · cross-checks {} · max hop {} · {}",
            meta.devices_reached,
            meta.cross_checks,
            meta.max_hop,
            age_text(meta.first_seen)
        ));

        let is_focused = focused == Some(meta.event_id.as_str());
        if ui
            .selectable_label(is_focused, "🔍 Focus topology on this alert")
            .clicked()
        {
            commands.push(FeedCommand::Focus(if is_focused {
                None
            } else {
                Some(meta.event_id.clone())
            }));
        }

        verification_controls(ui, meta, state, commands);
    });
}

fn verification_controls(
    ui: &mut Ui,
    meta: &AlertMeta,
    state: Option<&VerifyState>,
    commands: &mut Vec<FeedCommand>,
) {
    // No state yet means we don't know our own device id; nothing to offer.
    let Some(state) = state else {
        return;
    };
    let theme = app::get_theme();
    let step = |commands: &mut Vec<FeedCommand>, event: VerifyEvent| {
        commands.push(FeedCommand::Step {
            event_id: meta.event_id.clone(),
            event,
        });
    };

    match state {
        VerifyState::OwnAlert => {
            ui.weak("Your alert — cross-checking is up to the others.");
        }
        VerifyState::Done(Settled::Verified {
            cross_checks,
            trust,
        }) => {
            ui.colored_label(
                theme.green,
                format!(
                    "✅ Verified by you — {} cross-checks, trust {}",
                    cross_checks,
                    trust.wire_name()
                ),
            );
        }
        VerifyState::Done(Settled::Dismissed) => {
            ui.weak("Dismissed — you could not confirm this alert.");
        }
        VerifyState::Idle => {
            ui.horizontal(|ui| {
                if ui.button("👁 Verify…").clicked() {
                    step(commands, VerifyEvent::Initiate);
                }
                if ui.button("Dismiss…").clicked() {
                    step(commands, VerifyEvent::Dismiss);
                }
            });
        }
        VerifyState::Prompting => {
            ui.label("Can you independently confirm this alert is real?");
            ui.horizontal(|ui| {
                if ui.button("I can confirm").clicked() {
                    step(commands, VerifyEvent::Acknowledge);
                }
                if ui.button("I can't confirm").clicked() {
                    step(commands, VerifyEvent::Dismiss);
                }
                if ui.button("Back").clicked() {
                    step(commands, VerifyEvent::Back);
                }
            });
        }
        VerifyState::Confirming => {
            ui.label("Submit your witness confirmation? It counts as an independent cross-check.");
            ui.horizontal(|ui| {
                if ui.button("Submit confirmation").clicked() {
                    commands.push(FeedCommand::SubmitVerification {
                        event_id: meta.event_id.clone(),
                    });
                }
                if ui.button("Back").clicked() {
                    step(commands, VerifyEvent::Back);
                }
            });
        }
        VerifyState::Dismissing => {
            ui.label("Mark this alert as not confirmable? This does not affect its trust.");
            ui.horizontal(|ui| {
                if ui.button("Confirm dismissal").clicked() {
                    commands.push(FeedCommand::SubmitDismissal {
                        event_id: meta.event_id.clone(),
                    });
                }
                if ui.button("Back").clicked() {
                    step(commands, VerifyEvent::Back);
                }
            });
        }
        VerifyState::Sending { dismissal } => {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.weak(if *dismissal {
                    "Sending dismissal…"
                } else {
                    "Sending verification…"
                });
            });
        }
        VerifyState::Error { message } => {
            ui.colored_label(theme.red, format!("Failed: {message}"));
            if ui.button("Retry").clicked() {
                step(commands, VerifyEvent::Retry);
            }
        }
    }
}

/// Small form for broadcasting a new alert from this device.
pub fn show_raise_alert_form(ui: &mut Ui, draft: &mut AlertDraft, commands: &mut Vec<FeedCommand>) {
    egui::ComboBox::from_label("Type")
        .selected_text(format!("{} {}", draft.kind.icon(), draft.kind.wire_name()))
        .show_ui(ui, |ui| {
            for kind in AlertType::SELECTABLE {
                ui.selectable_value(
                    &mut draft.kind,
                    kind,
                    format!("{} {}", kind.icon(), kind.wire_name()),
                );
            }
        });
    ui.horizontal(|ui| {
        ui.label("What");
        ui.text_edit_singleline(&mut draft.description);
    });
    ui.horizontal(|ui| {
        ui.label("Where");
        ui.text_edit_singleline(&mut draft.location);
    });
    // Backend limits: 280 chars of description, 100 of location.
    truncate_chars(&mut draft.description, 280);
    truncate_chars(&mut draft.location, 100);

    let ready = !draft.description.trim().is_empty();
    if ui
        .add_enabled(ready, egui::Button::new("🚨 Broadcast alert"))
        .clicked()
    {
        commands.push(FeedCommand::RaiseAlert(draft.clone()));
        *draft = AlertDraft {
            kind: draft.kind,
            ..AlertDraft::default()
        };
    }
}

/// Cut `text` to at most `max_chars` characters. `String::truncate` counts
/// bytes and panics off a char boundary, so the cut index comes from
/// `char_indices`.
fn truncate_chars(text: &mut String, max_chars: usize) {
    if let Some((idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str, first_seen: f64, pending: bool, dismissed: bool) -> AlertMeta {
        AlertMeta {
            event_id: id.into(),
            first_seen,
            pending_verify: pending,
            dismissed,
            ..Default::default()
        }
    }

    #[test]
    fn test_truncate_chars_respects_multibyte_boundaries() {
        let mut short = "€".repeat(100); // 300 bytes, 100 chars
        truncate_chars(&mut short, 280);
        assert_eq!(short.chars().count(), 100);

        let mut long = "€".repeat(300);
        truncate_chars(&mut long, 280);
        assert_eq!(long.chars().count(), 280);
        assert!(long.chars().all(|c| c == '€'));

        let mut ascii = "x".repeat(300);
        truncate_chars(&mut ascii, 280);
        assert_eq!(ascii.len(), 280);
    }

    #[test]
    fn test_multibyte_draft_survives_the_form() {
        let ctx = egui::Context::default();
        let mut draft = AlertDraft {
            description: "€".repeat(100),
            location: "é".repeat(120),
            ..AlertDraft::default()
        };
        let mut commands = Vec::new();

        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| {
                show_raise_alert_form(ui, &mut draft, &mut commands);
            });
        });

        assert_eq!(draft.description.chars().count(), 100);
        assert_eq!(draft.location.chars().count(), 100);
    }

    #[test]
    fn test_feed_order_pending_first_then_newest() {
        let alerts = vec![
            meta("old", 100.0, false, false),
            meta("pending", 50.0, true, false),
            meta("new", 200.0, false, false),
            meta("pending-dismissed", 300.0, true, true),
        ];
        let ids: Vec<&str> = feed_order(&alerts)
            .into_iter()
            .map(|m| m.event_id.as_str())
            .collect();
        assert_eq!(ids, vec!["pending", "pending-dismissed", "new", "old"]);
    }
}
