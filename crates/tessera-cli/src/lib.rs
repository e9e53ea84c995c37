//! Library half of the `tessera` binary: configuration, logging setup, and
//! the wiring that turns configuration into evaluators and coordinators.

pub mod config;
pub mod observability;
pub mod runtime;
