//! Core business logic for Prism.
//!
//! This crate contains the domain logic with no web-framework or database
//! dependencies. All domain types, the deletion state machine, and the batch
//! jobs live here; persistence is reached only through the repository traits.
//!
//! # Modules
//!
//! - `blobstore` - Typed client for the remote blob store REST API
//! - `reconcile` - Deletion state machine, batch jobs, and scheduler

pub mod blobstore;
pub mod reconcile;
