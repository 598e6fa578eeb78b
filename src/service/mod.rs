//! Connection handling: the event protocol per job and the HTTP server that
//! carries it.

pub mod server;
pub mod session;

pub use server::{router, serve};
pub use session::{bind_commands, serve_connection, SessionContext};
