//! Core types for Tidepool.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod credential;
pub mod id;
pub mod price;

pub use credential::AccessCredential;
pub use id::*;
pub use price::{CurrencyCode, Price};
