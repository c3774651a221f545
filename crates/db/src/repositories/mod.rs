//! Repository abstractions for data access.
//!
//! Repositories implement the persistence traits declared in `prism-core`,
//! hiding the `SeaORM` implementation details from the reconciliation logic.

pub mod dead_letter;
pub mod image;

pub use dead_letter::DeadLetterRepository;
pub use image::ImageRepository;
