//! # photosku Common Library
//!
//! Shared code for the photosku bot:
//! - Error taxonomy
//! - Configuration loading
//! - Database initialization, schema and models

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
