//! Core library for Huddle.
//!
//! This crate provides the domain models, collaboration services, and
//! database operations for Huddle, independent of any transport layer.
//!
//! Every operation takes an explicit, already-authenticated actor identity;
//! there is no ambient "current user". Mutations are atomic: the state
//! change, its activity entry, and any notifications it fans out commit or
//! roll back together.
//!
//! # Usage
//!
//! ```no_run
//! use huddle_core::db::Database;
//! use huddle_core::models::*;
//! use huddle_core::services::ProjectService;
//! use uuid::Uuid;
//!
//! let db = Database::open_default()?;
//! db.migrate()?;
//!
//! let projects = ProjectService::new(db.clone());
//! let mine = projects.list_for_user(Uuid::new_v4())?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod db;
pub mod directory;
pub mod error;
pub mod models;
pub mod permissions;
pub mod services;

// Re-export commonly used types at crate root
pub use db::Database;
pub use error::{Conflict, DomainError, DomainResult};
