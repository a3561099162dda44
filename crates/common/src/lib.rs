//! Common types and utilities for Trip Kitty
//!
//! This crate provides shared types used across all Trip Kitty crates.
//!
//! # Modules
//!
//! - [`error`] - Common error types
//! - [`types`] - Shared domain types (Balance, TokenAmount, Trip, etc.) and
//!   the `alloy-primitives` address and word types they are built on
//! - [`code`] - Six-character trip join codes

pub mod code;
pub mod error;
pub mod types;

pub use code::JoinCode;
pub use error::{Error, Result};
pub use types::*;
