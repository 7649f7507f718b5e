//! Pure utility functions.
//!
//! These are stateless helper functions used by binaries and tests.

pub mod bootstrap;
