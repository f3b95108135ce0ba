//! Shared utilities for the ordo resolver.
//!
//! This crate provides the cross-cutting concerns used by the other ordo
//! crates: the unified error type and small filesystem helpers.

pub mod errors;
pub mod fs;
