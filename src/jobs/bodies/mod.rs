//! Built-in job bodies.

mod http_directory;

pub use http_directory::HttpDirectoryBody;
