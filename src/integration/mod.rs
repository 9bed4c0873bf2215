//! In-crate integration tests
//!
//! Shared fixtures plus end-to-end scenarios that drive the whole router.

pub mod fixtures;

#[cfg(test)]
mod e2e;
