//! Ticket status workflow policy.
//!
//! Maps a ticket's current status and the viewer's relationships to it onto
//! the statuses the viewer may request next. This only decides what the
//! client offers; the server independently accepts or rejects transitions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    ToBeApproved,
    Approved,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub const ALL: [Self; 6] = [
        Self::Open,
        Self::InProgress,
        Self::ToBeApproved,
        Self::Approved,
        Self::Resolved,
        Self::Closed,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::ToBeApproved => "to_be_approved",
            Self::Approved => "approved",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::InProgress => "In Progress",
            Self::ToBeApproved => "To Be Approved",
            Self::Approved => "Approved",
            Self::Resolved => "Resolved",
            Self::Closed => "Closed",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relationship {
    Creator,
    Assignee,
    Approver,
}

/// Relationship set of a viewer with respect to one ticket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Relationships {
    pub creator: bool,
    pub assignee: bool,
    pub approver: bool,
}

impl Relationships {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, relationship: Relationship) -> Self {
        match relationship {
            Relationship::Creator => self.creator = true,
            Relationship::Assignee => self.assignee = true,
            Relationship::Approver => self.approver = true,
        }
        self
    }

    #[must_use]
    pub fn contains(self, relationship: Relationship) -> bool {
        match relationship {
            Relationship::Creator => self.creator,
            Relationship::Assignee => self.assignee,
            Relationship::Approver => self.approver,
        }
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        !(self.creator || self.assignee || self.approver)
    }
}

impl FromIterator<Relationship> for Relationships {
    fn from_iter<I: IntoIterator<Item = Relationship>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::none(), |relationships, relationship| {
                relationships.with(relationship)
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    CreatorOrAssignee,
    Assignee,
    Approver,
}

impl Gate {
    fn admits(self, relationships: Relationships) -> bool {
        match self {
            Self::CreatorOrAssignee => relationships.creator || relationships.assignee,
            Self::Assignee => relationships.assignee,
            Self::Approver => relationships.approver,
        }
    }
}

struct TransitionRule {
    targets: &'static [TicketStatus],
    gate: Option<Gate>,
}

const OPEN_TARGETS: [TicketStatus; 2] = [TicketStatus::InProgress, TicketStatus::ToBeApproved];
const IN_PROGRESS_TARGETS: [TicketStatus; 1] = [TicketStatus::Resolved];
const TO_BE_APPROVED_TARGETS: [TicketStatus; 1] = [TicketStatus::Approved];
const APPROVED_TARGETS: [TicketStatus; 1] = [TicketStatus::InProgress];
const RESOLVED_TARGETS: [TicketStatus; 2] = [TicketStatus::Closed, TicketStatus::Open];

fn rule(current: TicketStatus) -> TransitionRule {
    match current {
        TicketStatus::Open => TransitionRule {
            targets: &OPEN_TARGETS,
            gate: Some(Gate::CreatorOrAssignee),
        },
        TicketStatus::InProgress => TransitionRule {
            targets: &IN_PROGRESS_TARGETS,
            gate: Some(Gate::Assignee),
        },
        TicketStatus::ToBeApproved => TransitionRule {
            targets: &TO_BE_APPROVED_TARGETS,
            gate: Some(Gate::Approver),
        },
        TicketStatus::Approved => TransitionRule {
            targets: &APPROVED_TARGETS,
            gate: Some(Gate::Assignee),
        },
        TicketStatus::Resolved => TransitionRule {
            targets: &RESOLVED_TARGETS,
            gate: Some(Gate::CreatorOrAssignee),
        },
        TicketStatus::Closed => TransitionRule {
            targets: &[],
            gate: None,
        },
    }
}

/// Action text for moving from `current` to `target`.
#[must_use]
pub fn transition_label(current: TicketStatus, target: TicketStatus) -> &'static str {
    match (current, target) {
        (TicketStatus::Open, TicketStatus::InProgress) => "Start Ticket without Approval",
        (TicketStatus::Approved, TicketStatus::InProgress) => "Start Progress",
        (_, TicketStatus::ToBeApproved) => "Send Ticket for Approval",
        (_, TicketStatus::Approved) => "Approve Ticket",
        (_, TicketStatus::Resolved) => "Resolve Ticket",
        (_, TicketStatus::Closed) => "Close Ticket",
        (_, other) => other.display_name(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransitionOption {
    pub value: TicketStatus,
    pub label: &'static str,
    pub selectable: bool,
}

/// Options for the status control: the current status first (never
/// selectable), followed by every target the relationships admit.
#[must_use]
pub fn compute_transitions(
    current: TicketStatus,
    relationships: Relationships,
) -> Vec<TransitionOption> {
    let rule = rule(current);
    let admitted = rule.gate.is_some_and(|gate| gate.admits(relationships));

    let mut options = Vec::with_capacity(rule.targets.len() + 1);
    options.push(TransitionOption {
        value: current,
        label: current.display_name(),
        selectable: false,
    });
    if admitted {
        options.extend(rule.targets.iter().map(|&target| TransitionOption {
            value: target,
            label: transition_label(current, target),
            selectable: true,
        }));
    }
    options
}

#[must_use]
pub fn can_request_transition(
    current: TicketStatus,
    target: TicketStatus,
    relationships: Relationships,
) -> bool {
    compute_transitions(current, relationships)
        .iter()
        .any(|option| option.selectable && option.value == target)
}
