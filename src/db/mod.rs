//! Database module: SQLite-backed communication store.
//!
//! - `model`: insert models for communications and their responses.
//! - `repo`: SQL-only functions plus the `SqliteStore` source.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::{NewCommunication, NewResponse};
