//! Delivery state machine
//!
//! Per-recipient status moves only forward: `sent -> delivered -> read`.
//! `delivered` has no driver yet but every transition into and out of it is
//! supported, so a future acknowledgment only needs to call [`transition`].
//!
//! Group status views are computed per viewer and never written back.

use uuid::Uuid;

use crate::shared::messaging::{DeliveryStatus, Message, MessageView, StatusEntry};

/// Result of applying a status to one recipient entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Advanced { from: DeliveryStatus, to: DeliveryStatus },
    /// Already at or beyond the requested status
    Unchanged(DeliveryStatus),
}

pub fn transition(current: DeliveryStatus, target: DeliveryStatus) -> Transition {
    match current.advance(target) {
        Some(to) => Transition::Advanced { from: current, to },
        None => Transition::Unchanged(current),
    }
}

/// Outcome of `markSeen`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkSeenOutcome {
    /// The entry moved to `read`
    Marked { previous: DeliveryStatus },
    /// Idempotent repeat; nothing changed
    AlreadyRead,
    /// The reader is authorized but had no entry (joined after the send)
    NotTracked,
}

impl MarkSeenOutcome {
    pub fn from_transition(t: Option<Transition>) -> Self {
        match t {
            Some(Transition::Advanced { from, .. }) => MarkSeenOutcome::Marked { previous: from },
            Some(Transition::Unchanged(_)) => MarkSeenOutcome::AlreadyRead,
            None => MarkSeenOutcome::NotTracked,
        }
    }

    pub fn changed(&self) -> bool {
        matches!(self, MarkSeenOutcome::Marked { .. })
    }
}

/// Least-advanced status across recipients.
///
/// A message with no recipients counts as `sent`.
pub fn aggregate_status(entries: &[StatusEntry]) -> DeliveryStatus {
    entries
        .iter()
        .map(|e| e.status)
        .min()
        .unwrap_or(DeliveryStatus::Sent)
}

/// Annotate a message for one viewer.
///
/// For group messages the viewer's own entry displays as `read`: a member
/// fetching the message has seen it.
pub fn view_for(mut message: Message, viewer: Uuid) -> MessageView {
    let is_your = message.sender == viewer;
    if message.is_group && !is_your {
        for entry in message.status.iter_mut().filter(|e| e.user_id == viewer) {
            entry.status = DeliveryStatus::Read;
        }
    }
    let overall_status = aggregate_status(&message.status);
    MessageView {
        message,
        is_your,
        overall_status,
    }
}
