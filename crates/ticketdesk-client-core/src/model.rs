//! Records exchanged with the TicketDesk REST backend.
//!
//! The backend is not consistent about identifier types (numeric in some
//! payloads, strings in others), so identifiers are normalised to `String`
//! on the way in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::auth::UserRole;
use crate::workflow::{Relationships, TicketStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    #[serde(alias = "_id", deserialize_with = "id_from_string_or_number")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TicketStatus,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(
        default,
        alias = "createdBy",
        alias = "creator_id",
        deserialize_with = "optional_id_from_string_or_number"
    )]
    pub created_by: Option<String>,
    #[serde(
        default,
        alias = "assignedTo",
        alias = "assignee_id",
        deserialize_with = "optional_id_from_string_or_number"
    )]
    pub assigned_to: Option<String>,
    #[serde(
        default,
        alias = "approverId",
        alias = "approver_id",
        deserialize_with = "optional_id_from_string_or_number"
    )]
    pub approver: Option<String>,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// The viewer's relationships to this ticket; several may hold at once.
    #[must_use]
    pub fn viewer_relationships(&self, viewer_id: &str) -> Relationships {
        let is = |candidate: &Option<String>| candidate.as_deref() == Some(viewer_id);
        Relationships {
            creator: is(&self.created_by),
            assignee: is(&self.assigned_to),
            approver: is(&self.approver),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(alias = "_id", deserialize_with = "id_from_string_or_number")]
    pub id: String,
    #[serde(alias = "userName", alias = "username")]
    pub name: String,
    pub email: String,
    pub role: UserRole,
    #[serde(default, alias = "isActive", skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(alias = "_id", deserialize_with = "id_from_string_or_number")]
    pub id: String,
    #[serde(
        default,
        alias = "ticketId",
        deserialize_with = "optional_id_from_string_or_number"
    )]
    pub ticket_id: Option<String>,
    #[serde(default, alias = "userName", alias = "author_name")]
    pub author: Option<String>,
    #[serde(alias = "comment", alias = "text")]
    pub body: String,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(alias = "_id", deserialize_with = "id_from_string_or_number")]
    pub id: String,
    #[serde(
        default,
        alias = "ticketId",
        deserialize_with = "optional_id_from_string_or_number"
    )]
    pub ticket_id: Option<String>,
    #[serde(alias = "fileName", alias = "filename", alias = "original_name")]
    pub file_name: String,
    #[serde(default, alias = "contentType", alias = "mimetype", alias = "mime_type")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(
        default,
        alias = "uploadedBy",
        deserialize_with = "optional_id_from_string_or_number"
    )]
    pub uploaded_by: Option<String>,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A downloaded attachment body with the name and type recovered from headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKind {
    Category,
    Subcategory,
    Priority,
    Status,
}

impl ConfigKind {
    pub const ALL: [Self; 4] = [
        Self::Category,
        Self::Subcategory,
        Self::Priority,
        Self::Status,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Subcategory => "subcategory",
            Self::Priority => "priority",
            Self::Status => "status",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "category" | "categories" => Some(Self::Category),
            "subcategory" | "subcategories" | "sub_category" => Some(Self::Subcategory),
            "priority" | "priorities" => Some(Self::Priority),
            "status" | "statuses" => Some(Self::Status),
            _ => None,
        }
    }
}

/// One node of the configuration taxonomy managed by administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    #[serde(alias = "_id", deserialize_with = "id_from_string_or_number")]
    pub id: String,
    #[serde(alias = "type", alias = "configType")]
    pub kind: ConfigKind,
    pub name: String,
    #[serde(
        default,
        alias = "parentId",
        deserialize_with = "optional_id_from_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    #[serde(alias = "_id", deserialize_with = "id_from_string_or_number")]
    pub id: String,
    #[serde(
        default,
        alias = "ticketId",
        deserialize_with = "optional_id_from_string_or_number"
    )]
    pub ticket_id: Option<String>,
    #[serde(
        default,
        alias = "userId",
        deserialize_with = "optional_id_from_string_or_number"
    )]
    pub user_id: Option<String>,
    pub action: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default, alias = "createdAt", alias = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(text) => text,
            RawId::Number(number) => number.to_string(),
        }
    }
}

pub(crate) fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

pub(crate) fn optional_id_from_string_or_number<'de, D>(
    deserializer: D,
) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}
