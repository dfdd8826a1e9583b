//! Domain layer: commands, pricing rules and the search projection.

pub mod commands;
pub mod pricing;
pub mod search_document;
