//! Name and path resolution: built -> resolved.

mod resolve;

pub use resolve::resolve_package;
