//! Core components, types, and utilities for the impression relay.
//!
//! This module contains the building blocks used throughout the application:
//! - Configuration handling and environment variables.
//! - The submission model and its moderation lifecycle.
//! - Review card rendering and submitter fingerprints.
//! - Common types, errors, and result handling.

pub mod card;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod lifecycle;
pub mod types;
