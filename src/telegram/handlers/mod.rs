//! Update routing
//!
//! `schema` builds the dptree handler that routes commands, bare links and
//! quality button presses to the `JobController`.

mod schema;
mod types;

pub use schema::schema;
pub use types::{HandlerDeps, HandlerError};
