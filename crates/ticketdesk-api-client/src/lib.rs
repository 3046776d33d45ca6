//! reqwest-backed transport and typed resource client for the TicketDesk
//! REST backend.

mod client;
mod download;
mod transport;
mod types;

pub use client::{ATTACHMENT_FIELD, TicketDeskClient};
pub use download::{content_disposition_file_name, downloaded_file};
pub use transport::{
    DEFAULT_TIMEOUT_MS, ReqwestTransport, ReqwestTransportConfig, TransportConfigError,
};
pub use types::{
    AttachmentUpload, COMMENT_MAX_CHARS, NewActivity, NewComment, NewConfigEntry, NewTicket,
    NewUser, PASSWORD_MIN_CHARS, TICKET_TITLE_MAX_CHARS, TicketUpdate, UserUpdate,
};
