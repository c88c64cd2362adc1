//! API request handlers.

pub mod health;
pub mod join;
pub mod keys;
