// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Core error types for envpkg
#[derive(Error, Debug)]
pub enum Error {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database initialization error
    #[error("Failed to initialize database: {0}")]
    InitError(String),

    /// Database not found
    #[error("Database not found at path: {0}")]
    DatabaseNotFound(String),

    /// I/O error with context
    #[error("I/O error: {0}")]
    IoError(String),

    /// Transport-level download failure
    #[error("Download error: {0}")]
    DownloadError(String),

    /// Downloaded archive does not match its recorded checksum
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Malformed metadata, specifier or index file
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Prefix is not a registered installation
    #[error("No environment found at prefix: {}", .0.display())]
    EnvironmentNotFound(PathBuf),

    /// No build of the named package is active in the environment
    #[error("Package '{name}' is not activated in environment {}", prefix.display())]
    PackageNotActivated { name: String, prefix: PathBuf },

    /// Requested canonical name has no match in package metadata
    #[error("Unknown package: {0}")]
    UnknownPackage(String),

    /// Record queried by canonical name is missing from the dependency index
    #[error("Package not found in index: {0}")]
    NotInIndex(String),

    /// Two records share a canonical name
    #[error("Duplicate package record: {0}")]
    DuplicateRecord(String),

    /// A record lists itself among its dependencies
    #[error("Package {0} depends on itself")]
    SelfDependency(String),

    /// Packages still to download form a dependency cycle
    #[error("Dependency cycle detected involving: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),

    /// A plan item failed to transfer
    #[error("Failed to download {name} ({completed} package(s) completed): {source}")]
    Transfer {
        name: String,
        completed: usize,
        #[source]
        source: Box<Error>,
    },
}

/// Result type alias using envpkg's Error type
pub type Result<T> = std::result::Result<T, Error>;
