//! Common types and utilities for OrderMirror
//!
//! This crate provides the key types shared by the cache, the
//! configuration layer and the binary.
//!
//! # Modules
//!
//! - [`error`] - Common error types
//! - [`types`] - Marketplace keys (OrderId, ItemKey, CurrencyKey, OwnerKey) and Side

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
