//! Persistent alert cooldowns

pub mod store;

pub use store::{CooldownError, CooldownStore};
