//! # veildav testkit
//!
//! Test utilities for veildav.
//!
//! This crate provides:
//! - Record fixtures and fixed keys
//! - Temporary file layouts for file-backed stores
//! - Property-based test generators using proptest
//! - [`PairHarness`]: one local collection and its hidden remote counterpart
//!   on a shared in-memory server, plus a second client to play "someone
//!   else changed the server"
//!
//! ## Usage
//!
//! ```rust
//! use veildav_testkit::prelude::*;
//! use veildav_core::Contact;
//!
//! let harness: PairHarness<Contact> = PairHarness::new("contacts/default");
//! harness.create_local(contact_named("Ada"));
//! assert!(harness.remote_uids().is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod harness;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::harness::*;
}

pub use fixtures::*;
pub use generators::*;
pub use harness::*;
