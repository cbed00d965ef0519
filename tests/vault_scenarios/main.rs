//! Integration tests for the DocVault facade.
//!
//! These drive the full open → write → snapshot → restore → shutdown
//! lifecycle through the public API. Component behavior in isolation is
//! covered by the unit and integration tests of each crate.

#[path = "../common/mod.rs"]
mod common;

mod documents;
mod lifecycle;
mod restore;
mod snapshots;
