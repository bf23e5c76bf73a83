//! Disposable email aliases backed by Cloudflare Email Routing.
//!
//! - `POST /register` creates a forwarding rule and, for temporary aliases,
//!   records when it expires
//! - A background sweep deletes expired rules and their records

pub mod alias;
pub mod api;
pub mod config;
pub mod error;
pub mod registrar;
pub mod sweeper;

pub use config::Config;
pub use error::AliasError;
pub use registrar::{Registrar, Registration};
pub use sweeper::{spawn_sweeper, ExpirySweeper, SweepReport};
