//! Service plumbing: HTTP surface and pass scheduling

pub mod http;
pub mod scheduler;

pub use http::*;
pub use scheduler::*;
