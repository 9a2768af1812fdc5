//! Pure domain layer for the tag service.
//!
//! Everything in this crate is I/O-free: identifiers, the tag data model,
//! authorization predicates, and the frequently-used aggregation. The db,
//! cache, and api crates build on these types.

pub mod auth;
pub mod classes;
pub mod error;
pub mod frequent;
pub mod tag;
pub mod types;
