//! Application layer: command and query handlers.

pub mod command_handlers;
pub mod enrollment;
pub mod query_handlers;
