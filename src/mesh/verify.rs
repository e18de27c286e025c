/*!
Per-alert verification flow for the local viewer.

The whole flow is an explicit state machine: a pure `step(state, event)`
transition function plus `VerifyState::for_viewer` which evaluates the
own-alert / already-verified guards once, before any interactive state is
reachable. Rendering reads the state; it never encodes flow logic of its own.

One request may be outstanding per alert: only the `Confirming -> Sending` and
`Dismissing -> Sending` transitions start a request, and `Sending` absorbs
every submit-like event until the outcome arrives.
*/

use crate::api::wire::{AlertMeta, TrustLevel};

/// Terminal outcome of a completed flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled {
    Verified {
        cross_checks: u32,
        trust: TrustLevel,
    },
    Dismissed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyState {
    /// No interaction yet; the viewer may start verifying or dismissing.
    Idle,
    /// The viewer opened the verification prompt.
    Prompting,
    /// The viewer acknowledged intent to witness-confirm.
    Confirming,
    /// The viewer is about to declare the alert not confirmable.
    Dismissing,
    /// A request is in flight. `dismissal` tells the two flows apart.
    Sending { dismissal: bool },
    Done(Settled),
    /// A user-initiated submission failed; retry is offered.
    Error { message: String },
    /// The viewer authored this alert; verification is permanently disabled.
    OwnAlert,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyEvent {
    /// Viewer opens the verification prompt.
    Initiate,
    /// Viewer acknowledges intent to confirm.
    Acknowledge,
    /// Viewer backs out of the prompt or confirmation step.
    Back,
    /// Viewer submits the confirmation; starts the verify request.
    Submit,
    /// Viewer declines to verify.
    Dismiss,
    /// Viewer confirms the dismissal; starts the dismiss request.
    ConfirmDismiss,
    /// The in-flight request settled successfully.
    Settled(Settled),
    /// The in-flight request failed.
    Failed { message: String },
    /// Viewer retries after a failure.
    Retry,
}

impl VerifyState {
    /// Initial state for a `(alert, viewer)` pair. The short-circuit guards
    /// run here exactly once; `step` never re-opens them.
    pub fn for_viewer(meta: &AlertMeta, viewer_device_id: &str) -> Self {
        if meta.originated_by(viewer_device_id) {
            return VerifyState::OwnAlert;
        }
        if meta.verified_by(viewer_device_id) {
            return VerifyState::Done(Settled::Verified {
                cross_checks: meta.cross_checks,
                trust: meta.trust,
            });
        }
        // The mesh flagged this alert as awaiting our decision; skip straight
        // to the prompt.
        if meta.pending_verify && !meta.dismissed {
            return VerifyState::Prompting;
        }
        VerifyState::Idle
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, VerifyState::Sending { .. })
    }
}

/// Total transition function. Unknown `(state, event)` pairs keep the state,
/// so stray UI events can never corrupt the flow.
pub fn step(state: VerifyState, event: VerifyEvent) -> VerifyState {
    use VerifyEvent as E;
    use VerifyState as S;

    match (state, event) {
        // Absorbing states first.
        (S::OwnAlert, _) => S::OwnAlert,
        (S::Done(settled), _) => S::Done(settled),

        (S::Idle, E::Initiate) => S::Prompting,
        (S::Idle, E::Dismiss) => S::Dismissing,

        (S::Prompting, E::Acknowledge) => S::Confirming,
        (S::Prompting, E::Back) => S::Idle,
        (S::Prompting, E::Dismiss) => S::Dismissing,

        (S::Confirming, E::Submit) => S::Sending { dismissal: false },
        (S::Confirming, E::Back) => S::Idle,

        (S::Dismissing, E::ConfirmDismiss) => S::Sending { dismissal: true },
        (S::Dismissing, E::Back) => S::Idle,

        (S::Sending { .. }, E::Settled(settled)) => S::Done(settled),
        (S::Sending { .. }, E::Failed { message }) => S::Error { message },
        // Re-entering Sending is forbidden by construction.
        (S::Sending { dismissal }, _) => S::Sending { dismissal },

        (S::Error { .. }, E::Retry) => S::Idle,

        (state, _) => state,
    }
}
