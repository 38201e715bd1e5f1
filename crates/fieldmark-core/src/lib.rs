//! # fieldmark-core
//!
//! Core types, traits, and abstractions for the fieldmark ingest service.
//!
//! This crate provides the foundational data structures and trait
//! definitions that the other fieldmark crates depend on: the record
//! models, the error taxonomy of the import pipeline, geometry building,
//! EXIF orientation handling, and the repository interfaces.

pub mod defaults;
pub mod error;
pub mod exif;
pub mod geometry;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use exif::{orientation, rotation_for, Rotation};
pub use geometry::{LineGeometry, Point};
pub use models::*;
pub use traits::*;
