//! Implementation of `janis-sites` CLI commands.

pub mod config;
pub mod email;
pub mod resubmit;
pub mod templates;
