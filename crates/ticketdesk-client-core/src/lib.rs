//! Client core for TicketDesk: session lifecycle, transport seam, ticket
//! workflow policy, and the local helpers the views build on.

pub mod auth;
pub mod error;
pub mod listing;
pub mod model;
pub mod session;
pub mod storage;
pub mod transport;
pub mod validation;
pub mod workflow;

pub use auth::{AuthError, LoginCredentials, SessionUser, UserRole};
pub use error::ClientError;
pub use session::{Navigator, SessionManager, SessionStatus};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
pub use transport::{ApiRequest, ApiResponse, HttpMethod, HttpTransport, TransportError};
pub use workflow::{
    Relationship, Relationships, TicketStatus, TransitionOption, compute_transitions,
};
