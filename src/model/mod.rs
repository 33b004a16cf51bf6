// src/model/mod.rs

//! Domain model consumed by branch handlers.
//!
//! - [`document`] parses raw change-feed documents into a typed view with
//!   defaults applied once, at parse time.
//! - [`project`], [`sample`] and [`technology`] describe the project/sample
//!   aggregate that handlers operate on. The dispatch engine never mutates it.

pub mod document;
pub mod project;
pub mod sample;
pub mod technology;

pub use document::ProjectDocument;
pub use project::Project;
pub use sample::{Sample, SampleError};
pub use technology::Technology;
