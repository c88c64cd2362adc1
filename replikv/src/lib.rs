//! HTTP front end for the replikv replicated key-value store.
//!
//! The [`api`] module serves the client API on top of a
//! [`replikv_cluster::Node`]; [`observability`] sets up logging for the
//! `replikv` binary.

pub mod api;
pub mod observability;
