//! # Dayshare Core
//!
//! Shared foundation for the dayshare workspace: the error taxonomy,
//! the closed `Period`/`ContentType` vocabularies, configuration loading,
//! and the trait boundaries behind which the external collaborators
//! (text generation, delivery, source fetch, chat history) live.
//!
//! Nothing in this crate performs I/O beyond reading the config file.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::DayShareConfig;
pub use error::{DayShareError, Result};
