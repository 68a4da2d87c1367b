//! Media Interface Core Library
//!
//! This crate normalizes camera card layouts into logical media items:
//! - Data-driven handler definitions describing each device's file naming
//! - Classification of files into roles and items
//! - Grouping of chaptered recordings into ordered parts, reconciled with
//!   known-missing files
//! - Lowest/highest quality listings and whole-item lookups

pub mod builtin;
pub mod classify;
pub mod config;
pub mod context;
pub mod errata;
pub mod error;
pub mod fs;
pub mod group;
pub mod handler;
pub mod media;
pub mod query;
pub mod scan;

pub use config::Config;
pub use context::{MediaContext, SourceMediaRoot};
pub use error::{ConfigError, Error, ErrorKind, Result};
pub use fs::{FileSystem, RealFileSystem};
pub use handler::{HandlerDefinition, HandlerRegistry, HandlerSpec, RuleSpec};
pub use media::{FileType, ItemType};
pub use query::{FileEntry, Quality, QueryRequest, QueryResponse, QueryService};
