use crate::config::ConfigLoader;
use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration (merged)
    Show {
        /// Extra config file layered above the project config
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Show configuration file paths
    Path,
}

pub fn run(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show { config } => show_config(config),
        ConfigCommands::Path => show_paths(),
    }
}

fn show_config(explicit: Option<PathBuf>) -> Result<()> {
    let config = ConfigLoader::load_with(explicit.as_deref())?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{}", toml_str);
    Ok(())
}

fn show_paths() -> Result<()> {
    println!("User config:    {:?}", ConfigLoader::user_config_path());
    println!("Project config: {:?}", ConfigLoader::project_config_path());
    println!("Archive dir:    {:?}", pairlink_paths::archive_dir());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: ConfigArgs,
    }

    #[test]
    fn test_show_accepts_explicit_file() {
        let cli = TestCli::parse_from(["test", "show", "--config", "/tmp/p.toml"]);
        match cli.config.command {
            ConfigCommands::Show { config } => {
                assert_eq!(config, Some(PathBuf::from("/tmp/p.toml")))
            }
            ConfigCommands::Path => panic!("expected show"),
        }
    }

    #[test]
    fn test_path_subcommand() {
        let cli = TestCli::parse_from(["test", "path"]);
        assert!(matches!(cli.config.command, ConfigCommands::Path));
    }
}
