//! A per-user reading list, served by perch as JSON and as protobuf.
//!
//! Callers authenticate with `Authorization: Bearer <token>`. Links live in a
//! [`Db`]; the bundled [`InMemoryDb`] keeps them for the life of the process.

pub mod auth;
pub mod db;
pub mod model;
pub mod service;

pub use auth::{StaticUsers, User, Users};
pub use db::{Db, InMemoryDb};
pub use service::{Namespace, ReadingList};
