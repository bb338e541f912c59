//! Local HTTP API consumed by the browser front-end.
//!
//! `api_router()` returns a `Router` with every screening step under
//! `/api/`; `start_api_server()` binds and runs it in the background.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer, ServerInfo};
pub use types::ApiContext;
