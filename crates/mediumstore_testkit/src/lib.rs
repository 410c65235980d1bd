//! # Medium Store Testkit
//!
//! Test utilities for the medium store.
//!
//! This crate provides:
//! - Fixtures for memory and temporary-file media
//! - Property-based generators for media content and edit scripts
//! - A naive reference model of edit application for cross-checking flushes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mediumstore_testkit::prelude::*;
//!
//! #[test]
//! fn flush_matches_model() {
//!     let fixture = TestMedium::memory(patterned_content(64));
//!     let mut store = fixture.open_store();
//!     // ... schedule edits, flush, compare with EditModel
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod model;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::model::*;
}

pub use fixtures::*;
pub use generators::*;
pub use model::*;
