//! Innovation Portal backend
//!
//! REST service for the innovator verification workflow, project
//! collaboration requests, funding/certificate request tracking, and the
//! notification fan-out those workflows produce.

pub mod auth;
pub mod collaboration;
pub mod config;
pub mod error;
pub mod notify;
pub mod requests;
pub mod routes;
pub mod state;
pub mod store;
pub mod verification;

pub use config::Config;
pub use error::PortalError;
pub use notify::NotificationKind;
pub use state::AppState;
pub use store::{
    InMemorySessionStore, InMemoryStore, PortalStore, SessionStore, SqliteStore,
};
