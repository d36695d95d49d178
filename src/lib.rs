// src/lib.rs

//! envpkg
//!
//! Dependency queries and package downloads for isolated installation
//! prefixes ("environments").
//!
//! # Architecture
//!
//! - Database-first: package metadata, environments and activations in SQLite
//! - Index: arena-indexed dependency graph with depth-bounded closures
//! - Cache: archives appear only by atomic rename, guarded by per-package locks
//! - Plans: dependency-ordered downloads with partial-progress retention

pub mod cache;
pub mod config;
pub mod db;
pub mod download;
pub mod environment;
mod error;
pub mod index;
pub mod packages;
pub mod repository;
pub mod version;

pub use error::{Error, Result};
