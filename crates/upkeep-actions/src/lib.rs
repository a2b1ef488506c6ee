//! # Upkeep Actions
//!
//! Host-side action bundle for the upkeep runtime: a [`DefaultActionFactory`]
//! over a small set of built-in maintenance actions. Applications with their
//! own administrative work implement `upkeep_core::ActionFactory` directly
//! (or wrap this one) and hand it to the runtime at construction.

mod builtin;
mod factory;

pub use builtin::{Countdown, Linger, Noop};
pub use factory::DefaultActionFactory;
