// src/services/mod.rs
pub mod compositor;
pub mod fetcher;
pub mod image_processor;
pub mod normalizer;
pub mod ranking;
pub mod selection;
pub mod session_driver;
pub mod session_store;

pub use fetcher::{ImageFetcher, SourceFetcher};
pub use session_driver::{PageMove, SessionDriver};
pub use session_store::{MemorySessionStore, RedisSessionStore, SessionStore};
