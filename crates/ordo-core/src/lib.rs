//! Core data types for the ordo resolver.
//!
//! This crate defines the value types every other ordo crate builds on:
//! PEP 440 versions, version specifiers, project names and identifiers,
//! requirement strings, resolver configuration, and local index files.
//!
//! This crate is intentionally free of resolver state.

pub mod config;
pub mod index;
pub mod name;
pub mod requirement;
pub mod specifier;
pub mod version;
