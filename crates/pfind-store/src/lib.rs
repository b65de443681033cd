//! # pfind object stores
//!
//! Concrete [`ObjectStore`](pfind_core::ObjectStore) backends that live on
//! this machine.
//!
//! - **In-memory**: a seeded tree for tests and demos
//! - **File system**: a directory tree where folders are containers and files
//!   are artifacts, with no-clobber creation

mod filesystem;
mod memory;

pub use filesystem::FileSystemObjectStore;
pub use memory::InMemoryObjectStore;
