//! SportHub API: the HTTP surface of the activities and search services.
//!
//! Both binaries share the error mapping, configuration, telemetry setup and
//! requester extraction defined here.

pub mod config;
pub mod error;
pub mod extract;
pub mod requester;
pub mod routes;
pub mod shutdown;
pub mod state;
pub mod sync;
pub mod telemetry;
pub mod users;
