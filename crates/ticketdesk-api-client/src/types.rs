//! Request payloads sent to the backend, with their local form checks.

use serde::Serialize;
use ticketdesk_client_core::auth::normalize_email;
use ticketdesk_client_core::model::ConfigKind;
use ticketdesk_client_core::validation::{
    ValidationErrors, require_email, require_max_chars, require_min_chars, require_non_empty,
};
use ticketdesk_client_core::{TicketStatus, UserRole};

pub const TICKET_TITLE_MAX_CHARS: usize = 120;
pub const COMMENT_MAX_CHARS: usize = 2_000;
pub const PASSWORD_MIN_CHARS: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    pub priority: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver: Option<String>,
}

impl NewTicket {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_non_empty(&mut errors, "title", &self.title);
        require_max_chars(&mut errors, "title", &self.title, TICKET_TITLE_MAX_CHARS);
        require_non_empty(&mut errors, "description", &self.description);
        require_non_empty(&mut errors, "category", &self.category);
        require_non_empty(&mut errors, "priority", &self.priority);
        errors.into_result()
    }
}

/// Partial ticket edit. Status is deliberately absent; status changes go
/// through the transition gate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TicketUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver: Option<String>,
}

impl TicketUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            return Err(ValidationErrors::single("ticket", "no changes to save"));
        }
        let mut errors = ValidationErrors::new();
        if let Some(title) = self.title.as_deref() {
            require_non_empty(&mut errors, "title", title);
            require_max_chars(&mut errors, "title", title, TICKET_TITLE_MAX_CHARS);
        }
        if let Some(description) = self.description.as_deref() {
            require_non_empty(&mut errors, "description", description);
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct StatusChange {
    pub status: TicketStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
}

impl NewUser {
    /// Checks the form and lowercases the email.
    pub fn normalized(&self) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_non_empty(&mut errors, "name", &self.name);
        require_email(&mut errors, "email", &self.email);
        require_min_chars(&mut errors, "password", &self.password, PASSWORD_MIN_CHARS);
        errors.into_result()?;
        Ok(Self {
            name: self.name.trim().to_string(),
            email: normalize_email(&self.email),
            password: self.password.clone(),
            role: self.role,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl UserUpdate {
    pub fn normalized(&self) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = self.name.as_deref() {
            require_non_empty(&mut errors, "name", name);
        }
        if let Some(email) = self.email.as_deref() {
            require_email(&mut errors, "email", email);
        }
        if let Some(password) = self.password.as_deref() {
            require_min_chars(&mut errors, "password", password, PASSWORD_MIN_CHARS);
        }
        errors.into_result()?;
        Ok(Self {
            name: self.name.as_deref().map(|name| name.trim().to_string()),
            email: self.email.as_deref().map(normalize_email),
            ..self.clone()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewComment {
    #[serde(rename = "comment")]
    pub body: String,
}

impl NewComment {
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_non_empty(&mut errors, "comment", &self.body);
        require_max_chars(&mut errors, "comment", &self.body, COMMENT_MAX_CHARS);
        errors.into_result()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewConfigEntry {
    #[serde(rename = "type")]
    pub kind: ConfigKind,
    pub name: String,
    #[serde(rename = "parentId", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NewConfigEntry {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_non_empty(&mut errors, "name", &self.name);
        let has_parent = self
            .parent_id
            .as_deref()
            .is_some_and(|parent| !parent.trim().is_empty());
        if self.kind == ConfigKind::Subcategory && !has_parent {
            errors.push("parent_id", "a subcategory needs a parent category");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewActivity {
    #[serde(rename = "ticketId", skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl NewActivity {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_non_empty(&mut errors, "action", &self.action);
        errors.into_result()
    }
}

/// A local file to attach to a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl AttachmentUpload {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require_non_empty(&mut errors, "file_name", &self.file_name);
        if self.bytes.is_empty() {
            errors.push("file", "is empty");
        }
        errors.into_result()
    }
}
