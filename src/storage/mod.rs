//! Blob storage.
//!
//! The [`backend::BlobStore`] trait abstracts over where blob bytes live;
//! [`local::LocalBlobStore`] keeps them under a directory tree.  Callers go
//! through [`coordinator::FileCoordinator`], which refuses to touch a
//! bucket the registry does not know.

pub mod backend;
pub mod coordinator;
pub mod local;
pub mod naming;
pub mod path;
