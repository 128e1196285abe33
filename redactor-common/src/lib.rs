//! # Redactor Common Library
//!
//! Shared code for the Redactor service:
//! - Error type
//! - TOML configuration and root folder resolution
//! - Progress event wire model
//! - Text utilities used between generation stages

pub mod config;
pub mod error;
pub mod events;
pub mod text;

pub use error::{Error, Result};
pub use events::{ProgressEvent, StageId};
