//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the crate:
//! - Math types and matrix construction
//! - Handle-based collections
//! - Frame timing
//! - Logging utilities

pub mod collections;
pub mod logging;
pub mod math;
pub mod time;
