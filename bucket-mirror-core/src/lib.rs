#![doc = "bucket-mirror-core: reconciliation engine for bucket-mirror."]

//! This crate keeps the objects of a bucket in an S3-compatible store in line
//! with the files below a local directory.
//!
//! The pieces, leaves first:
//! - [`keys`]: filesystem paths to canonical forward-slash store keys
//! - [`content_type`]: extension to MIME type, defaults plus overrides
//! - [`enumerate`]: directory walk producing a [`KeyMapping`]
//! - [`store`]: list / upload / batch-delete over an [`contract::ObjectStore`]
//! - [`reconcile`]: diffing and the create/read/update/delete transitions
//! - [`resource`]: the lifecycle driven by an external state layer
//!
//! Backends live in [`memory`] and (with the `s3` feature) [`s3`].

pub mod config;
pub mod content_type;
pub mod contract;
pub mod enumerate;
pub mod error;
pub mod keys;
pub mod memory;
pub mod reconcile;
pub mod resource;
#[cfg(feature = "s3")]
pub mod s3;
pub mod store;

pub use keys::KeyMapping;
