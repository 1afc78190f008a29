//! Shared runtime helpers for the tracker binaries and services.

pub mod env;
pub mod utils;
