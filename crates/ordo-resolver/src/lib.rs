//! Dependency resolution engine: PEP 440 aware candidate search, the
//! resolution provider's preference heuristics, a backtracking solver with
//! a round budget, and installation ordering.

pub mod cache;
pub mod candidate;
pub mod conflict;
pub mod constraint;
pub mod factory;
pub mod ordering;
pub mod provider;
pub mod requirement;
pub mod resolve;
pub mod solver;
