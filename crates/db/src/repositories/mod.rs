//! Repository layer.
//!
//! Repositories are zero-sized structs providing async methods that take
//! `&PgPool` (or a transaction connection) as the first argument.

pub mod tag_repo;

pub use tag_repo::TagRepo;
