//! Test Helper Utilities
//!
//! Shared doubles and fixtures for photosku-bot integration tests

#![allow(dead_code)]

pub mod doubles;
pub mod fixtures;

// Re-export commonly used items
pub use doubles::{FaultyEntityStore, FaultyObjectStore, RecordingOutbound, Sent, StaticMediaSource};
pub use fixtures::{document_event, harness, photo_event, sender, text_event, Harness};
