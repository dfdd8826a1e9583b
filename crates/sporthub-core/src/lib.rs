//! SportHub Core: shared domain model and ports.
//!
//! This crate defines the entities, event envelopes, and trait seams that the
//! activities and search services depend on. It contains no infrastructure
//! code: brokers, databases, caches, and HTTP clients live in their own crates
//! and implement the traits declared here.

pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod model;
pub mod publisher;
pub mod repository;
pub mod search;
