//! Implementation of the config command.

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;

use crate::config::Config;

/// Arguments for the `config` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct Args {
    /// The `config` subcommand to run.
    #[command(subcommand)]
    command: ConfigSubcommand,
}

/// Subcommands for the `config` command.
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Generates a default configuration file.
    Init,

    /// Displays the current configuration.
    Resolve,
}

/// Runs the `config` command.
pub fn config(args: Args, path: Option<&Path>) -> anyhow::Result<()> {
    let config = match args.command {
        ConfigSubcommand::Init => Config::default(),
        ConfigSubcommand::Resolve => Config::load(path)?,
    };

    print!(
        "{}",
        toml::to_string_pretty(&config).context("failed to serialize configuration")?
    );
    Ok(())
}
