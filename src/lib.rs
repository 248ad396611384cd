//! Command line tool for the Janis site templates.

pub mod commands;
pub mod config;
