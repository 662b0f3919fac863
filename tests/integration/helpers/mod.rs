//! Helper utilities for integration tests.

pub mod assertions;
pub mod sam_generator;

pub use assertions::*;
pub use sam_generator::*;
