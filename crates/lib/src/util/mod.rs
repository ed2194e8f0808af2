//! Shared utilities.
//!
//! Hashing and file-set helpers used by the digest and source modules.

pub mod files;
pub mod hash;
