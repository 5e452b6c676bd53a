// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Brieftrack - tracks work-order briefs posted in a Telegram group.
//!
//! Binary entry point: `serve` runs the service, `doctor` diagnoses the
//! setup, `config` shows or validates the effective configuration.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod doctor;
mod serve;
mod shutdown;

use std::path::{Path, PathBuf};

use brieftrack_config::{BriefConfig, ConfigError};
use clap::{Parser, Subcommand};

const REDACTED: &str = "<redacted>";

/// Brieftrack - tracks work-order briefs posted in a Telegram group.
#[derive(Parser, Debug)]
#[command(name = "brieftrack", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the service.
    Serve,
    /// Run diagnostics against the configuration and database.
    Doctor {
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Inspect the effective configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the merged configuration with secrets redacted.
    Show,
    /// Validate the configuration and exit.
    Validate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config_file.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            brieftrack_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Doctor { plain }) => {
            if doctor::run_doctor(&config, cli.config_file.as_deref(), plain).await > 0 {
                std::process::exit(1);
            }
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Show => match toml::to_string_pretty(&redacted(config)) {
                Ok(rendered) => print!("{rendered}"),
                Err(e) => {
                    eprintln!("error: failed to render config: {e}");
                    std::process::exit(1);
                }
            },
            ConfigAction::Validate => println!("brieftrack: configuration is valid"),
        },
        None => {
            println!("brieftrack: use --help for available commands");
        }
    }
}

/// The explicit file when given, else the standard locations.
fn load(config_file: Option<&Path>) -> Result<BriefConfig, Vec<ConfigError>> {
    match config_file {
        Some(path) => brieftrack_config::load_and_validate_path(path),
        None => brieftrack_config::load_and_validate(),
    }
}

/// Replace secrets so the output can be pasted into a bug report.
fn redacted(mut config: BriefConfig) -> BriefConfig {
    if config.telegram.bot_token.is_some() {
        config.telegram.bot_token = Some(REDACTED.to_string());
    }
    if config.anthropic.api_key.is_some() {
        config.anthropic.api_key = Some(REDACTED.to_string());
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = brieftrack_config::load_and_validate_str("")
            .expect("default config should be valid");
        assert_eq!(config.service.name, "brieftrack");
    }

    #[test]
    fn show_redacts_secrets() {
        let mut config = BriefConfig::default();
        config.telegram.bot_token = Some("123:secret".into());
        config.anthropic.api_key = Some("sk-ant-secret".into());

        let rendered = toml::to_string_pretty(&redacted(config)).unwrap();
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains(REDACTED));
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["brieftrack", "doctor", "--plain"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Doctor { plain: true })));

        let cli = Cli::try_parse_from(["brieftrack", "config", "show"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config { action: ConfigAction::Show })
        ));
        assert_eq!(cli.config_file, None);
    }

    #[test]
    #[serial_test::serial]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brieftrack.toml");
        std::fs::write(&path, "[service]\nname = \"orders-bot\"\n").unwrap();

        let cli = Cli::try_parse_from([
            "brieftrack",
            "doctor",
            "--config-file",
            path.to_str().unwrap(),
        ])
        .unwrap();
        assert_eq!(cli.config_file.as_deref(), Some(path.as_path()));
        let config = load(cli.config_file.as_deref()).unwrap();
        assert_eq!(config.service.name, "orders-bot");

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[service\n").unwrap();
        assert!(load(Some(&broken)).is_err());
    }
}
