//! Core types and capability traits for the wikiparl importer.
//!
//! No HTTP and no database in here. Besides the record model and claim
//! types it defines the three seams the engines are written against:
//! [`fetch::Fetch`], [`writer::ItemWriter`] and [`state::StateStore`].

// Capability traits spell out `Send` futures in their signatures.
#![allow(async_fn_in_trait)]

pub mod claim;
pub mod error;
pub mod fetch;
pub mod flatten;
pub mod identity;
pub mod mapping;
pub mod record;
pub mod state;
pub mod writer;

pub use error::{Error, Result};
