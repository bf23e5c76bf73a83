//! Key-value storage with native per-key expiration.
//!
//! `MemoryKv` keeps entries in process; `CloudflareKv` talks to a Workers KV
//! namespace. Both hide entries whose expiration has passed.

mod cloudflare;
mod error;
mod store;

pub use cloudflare::CloudflareKv;
pub use error::KvError;
pub use store::{KvStore, MemoryKv};
