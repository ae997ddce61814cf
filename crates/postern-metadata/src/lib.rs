//! Metadata storage for Postern
//!
//! Collaborator traits consumed by the login flow, and a SQLite store that
//! implements all of them.

pub mod repository;
pub mod traits;

pub use repository::MetadataStore;
pub use traits::*;
