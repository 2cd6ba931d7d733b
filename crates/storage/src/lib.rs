#![forbid(unsafe_code)]

pub mod cache;

pub use cache::{FileSessionCache, MemorySessionCache, SessionCache};
