//! Metadata storage layer.
//!
//! Credentials and buckets each live in one named [`collection::Collection`].
//! [`json_file::JsonFileCollection`] is the durable implementation;
//! [`memory::MemoryCollection`] backs tests and throwaway deployments.

pub mod buckets;
pub mod collection;
pub mod credentials;
pub mod json_file;
pub mod memory;
