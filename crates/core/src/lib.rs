//! dmfo core library.
//!
//! Git diff and merge driver for Office documents. This crate prepares the
//! files Git hands over (absolute paths, LFS pointers smudged, target
//! extension, writable), drives the host application through an automation
//! session, and restores the working tree afterwards.

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod extension;
pub mod installer;
pub mod lfs;
pub mod models;
pub mod permissions;
pub mod prompt;
pub mod runner;
pub mod staging;

// Re-exports for convenience.
pub use config::DmfoConfig;
pub use models::{Mode, Outcome, Role, RoleMap, StagedFile, TargetExtension};
pub use runner::{DriverRequest, Runner};
