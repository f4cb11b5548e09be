//! CI artifact access: the result accessor and the object stores behind it.

pub mod accessor;
pub mod fs;
pub mod http;
pub mod records;

pub use accessor::ArtifactResultAccessor;
pub use fs::FsObjectStore;
pub use http::HttpObjectStore;
