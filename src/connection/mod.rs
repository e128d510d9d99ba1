//! Connection-scoped data handed to handlers.

mod ambient;
mod context;

pub use ambient::Ambient;
pub use context::{ConnectionContext, ConnectionId};
