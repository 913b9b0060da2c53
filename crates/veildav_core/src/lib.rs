//! # veildav core
//!
//! Data model and local side of veildav.
//!
//! This crate provides:
//! - The [`Component`] trait and the two record types it is implemented for,
//!   [`Contact`] and [`Event`]
//! - ETag/CTag tokens and the exposed (on-wire) record shape
//! - The [`LocalCollection`] contract the sync worker drives
//! - A bounded [`PendingOperationQueue`] applied atomically on commit
//! - [`LocalStore`], a transactional store holding many collections,
//!   optionally persisted to a snapshot file
//! - [`SyncStateStore`], the per-collection key-value state (CTag, display
//!   name, color)
//!
//! ## Change flags
//!
//! Editors outside this crate mark local components new, dirty or deleted.
//! The sync worker only reads and clears those flags:
//!
//! | state   | dirty | uid     | deleted |
//! |---------|-------|---------|---------|
//! | new     | yes   | none    | no      |
//! | updated | yes   | present | no      |
//! | deleted | any   | any     | yes     |

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod component;
mod contact;
mod error;
mod event;
mod local;
pub mod persist;
mod queue;
mod state;
mod store;
mod types;

pub use component::{decode_component, encode_component, Component, ComponentETagPair, ComponentKind};
pub use contact::Contact;
pub use error::{CoreError, CoreResult};
pub use event::{Event, RecurrenceLink};
pub use local::{LocalAccount, LocalCollection, LocalComponent};
pub use queue::{PendingOperation, PendingOperationQueue, QueueLimits};
pub use state::{FileStateStore, MemoryStateStore, StateKey, SyncStateStore};
pub use store::{LocalStore, StoreCollection};
pub use types::{Attachment, CTag, ETag, ExposedAttachment, ExposedComponent, LocalId};
