// src/packages/mod.rs

//! Package records and dependency specifiers
//!
//! A `PackageRecord` describes one build of a package; its `depends` list
//! holds `Requirement`s that other records in the index may satisfy.

mod record;
mod requirement;

pub use record::PackageRecord;
pub use requirement::Requirement;
