//! Error types for media-interface core operations.
//!
//! Errors are grouped by domain. [`ConfigError`] covers everything that is
//! wrong with handler definitions, errata or the config file itself and is
//! raised while the [`MediaContext`](crate::MediaContext) is built, never at
//! classification time. The remaining variants of [`Error`] are query-time
//! failures that end up in the response envelope.

use std::path::PathBuf;

use thiserror::Error;

use crate::media::{FileType, ItemType};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Malformed or self-contradictory configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The config file declares the wrong `data_type`.
    #[error("Invalid data type on the config file: {found}")]
    InvalidDataType {
        /// Value found in the file.
        found: String,
    },

    /// The config file is not valid JSON for the expected schema.
    #[error("Failed to parse config file {path}: {reason}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// A handler definition has an empty id.
    #[error("Handler definition has an empty id")]
    EmptyHandlerId,

    /// A handler definition has no rules.
    #[error("Handler '{handler}' has no file pattern rules")]
    NoRules {
        /// Handler id.
        handler: String,
    },

    /// Two handlers share an id.
    #[error("Handler '{handler}' is defined more than once")]
    DuplicateHandler {
        /// Handler id.
        handler: String,
    },

    /// A regular expression in a rule does not compile.
    #[error("Handler '{handler}' rule {rule}: invalid {field} regex: {reason}")]
    InvalidPattern {
        /// Handler id.
        handler: String,
        /// Zero-based rule index.
        rule: usize,
        /// Which matcher field held the regex.
        field: &'static str,
        /// Compiler message.
        reason: String,
    },

    /// Two rules have the same matcher, so rule order cannot decide between them.
    #[error("Handler '{handler}' rules {first} and {second} have identical matchers")]
    DuplicateRule {
        /// Handler id.
        handler: String,
        /// Zero-based index of the earlier rule.
        first: usize,
        /// Zero-based index of the later rule.
        second: usize,
    },

    /// A rule extractor cannot derive its value for every accepted file name.
    #[error("Handler '{handler}' rule {rule}: {reason}")]
    PartialExtractor {
        /// Handler id.
        handler: String,
        /// Zero-based rule index.
        rule: usize,
        /// What is wrong with the extractor.
        reason: String,
    },

    /// A handler's part limit is zero or too large.
    #[error("Handler '{handler}' max_parts {max_parts} is outside 1..=9999")]
    InvalidPartLimit {
        /// Handler id.
        handler: String,
        /// Configured limit.
        max_parts: u32,
    },

    /// A required file type can never be produced by any rule of that item type.
    #[error("Handler '{handler}' requires {file_type} files for {item_type} items but no rule produces them")]
    UnsatisfiableRequirement {
        /// Handler id.
        handler: String,
        /// Item type the requirement belongs to.
        item_type: ItemType,
        /// Required file type.
        file_type: FileType,
    },

    /// A source media entry references a handler that does not exist.
    #[error("Unknown handler ID '{handler}'")]
    UnknownHandler {
        /// Handler id.
        handler: String,
    },

    /// A source media location cannot be resolved.
    #[error("Error reading source media dir {path}: {reason}")]
    UnreadableRoot {
        /// Location path.
        path: PathBuf,
        /// Underlying error.
        reason: String,
    },

    /// A known-missing file does not fall under any source media location.
    #[error("Known missing file {path} is not under any source media location")]
    ErrataOutsideRoots {
        /// Errata path.
        path: PathBuf,
    },

    /// A known-missing file matches no rule of its root's handler.
    #[error("Known missing file {path} matches no rule of handler '{handler}'")]
    UnclassifiedErrata {
        /// Errata path.
        path: PathBuf,
        /// Handler id.
        handler: String,
    },
}

/// Filesystem access failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FileSystemError {
    /// Path does not exist.
    #[error("Path not found: {path}")]
    NotFound {
        /// Missing path.
        path: PathBuf,
    },

    /// Reading a file or directory failed.
    #[error("Failed to read {path}: {reason}")]
    ReadFailed {
        /// Path being read.
        path: PathBuf,
        /// Underlying error.
        reason: String,
    },
}

/// Errors that can occur in media-interface core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Filesystem error.
    #[error(transparent)]
    FileSystem(#[from] FileSystemError),

    /// The queried path does not exist.
    #[error("Path not found: {path}")]
    PathNotFound {
        /// Queried path.
        path: PathBuf,
    },

    /// The queried path exists but no configured source media location contains it.
    #[error("Couldn't find handler responsible for a dir in the path of {path}")]
    PathNotUnderKnownRoot {
        /// Queried path.
        path: PathBuf,
    },

    /// A listing was requested for something that is not a directory.
    #[error("List path is not a directory: {path}")]
    NotADirectory {
        /// Queried path.
        path: PathBuf,
    },

    /// The requested file matches no rule of its handler.
    #[error("File {path} matches no rule of handler '{handler}'")]
    UnclassifiedFile {
        /// Requested file.
        path: PathBuf,
        /// Handler id.
        handler: String,
    },

    /// Two files claim the same grouping slot.
    #[error("Files {first} and {second} both occupy slot {slot}")]
    AmbiguousGrouping {
        /// Human-readable slot description.
        slot: String,
        /// First file in path order.
        first: PathBuf,
        /// Second file in path order.
        second: PathBuf,
    },

    /// An item lacks required files that are not declared known-missing.
    #[error("Item {item} is incomplete: missing {}", .missing.join(", "))]
    IncompleteItem {
        /// Item description.
        item: String,
        /// One entry per unexpectedly absent slot.
        missing: Vec<String>,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error category for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Configuration problems.
    Config,
    /// Filesystem access problems.
    FileSystem,
    /// Path could not be found or attributed to a source media root.
    Path,
    /// File matched no handler rule.
    Unclassified,
    /// Grouping conflict.
    Ambiguous,
    /// Item has unexpectedly absent files.
    Incomplete,
    /// Output could not be produced.
    Serialization,
}

impl Error {
    /// Returns the category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::FileSystem(_) => ErrorKind::FileSystem,
            Self::PathNotFound { .. }
            | Self::PathNotUnderKnownRoot { .. }
            | Self::NotADirectory { .. } => ErrorKind::Path,
            Self::UnclassifiedFile { .. } => ErrorKind::Unclassified,
            Self::AmbiguousGrouping { .. } => ErrorKind::Ambiguous,
            Self::IncompleteItem { .. } => ErrorKind::Incomplete,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }
}
