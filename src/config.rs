use crate::source::SourceDescriptor;

use anyhow::{bail, Context, Result};
use clap::Parser;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Deserialize, Serialize, Debug)]
pub struct Config {
    pub arch: String,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceDescriptor>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .context(format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&data)
            .context(format!("Failed to parse config file {}", path.display()))?;
        config.check_sanity()?;
        Ok(config)
    }

    pub fn check_sanity(&self) -> Result<()> {
        lazy_static! {
            static ref ARCH: Regex = Regex::new("^[a-z0-9][a-z0-9-]*$").unwrap();
        }

        if !ARCH.is_match(&self.arch) {
            bail!("Invalid architecture name {}", self.arch);
        }
        if self.sources.is_empty() {
            bail!("No repository source configured");
        }
        Ok(())
    }
}

#[derive(Parser)]
#[clap(about, version, author)]
pub struct Opts {
    #[clap(
        short,
        long,
        default_value = "/etc/aptcache/config.toml",
        help = "Position of the config file"
    )]
    pub config: PathBuf,
    #[clap(long, help = "Override the architecture in config file")]
    pub arch: Option<String>,
    #[clap(short, long, help = "Print additional debug information")]
    pub verbose: bool,
    #[clap(subcommand)]
    pub subcmd: SubCmd,
}

#[derive(Parser)]
pub enum SubCmd {
    /// Read all repository indices and show a summary
    Refresh,
    /// Show metadata of packages
    Show(ShowPkg),
    /// Download binary or source packages
    Fetch(FetchPkg),
    /// Check if a version is not older than the one in the repositories
    Check(CheckPkg),
    /// Compare two version strings
    Compare(CompareVersions),
}

#[derive(Parser)]
pub struct ShowPkg {
    /// Package names
    #[clap(required = true, min_values = 1)]
    pub names: Vec<String>,
}

#[derive(Parser)]
pub struct FetchPkg {
    /// Package names
    #[clap(required = true, min_values = 1)]
    pub names: Vec<String>,
    /// Download source packages instead of binary packages
    #[clap(long)]
    pub source: bool,
    /// Directory to save downloaded files
    #[clap(short, long, default_value = ".")]
    pub output: PathBuf,
}

#[derive(Parser)]
pub struct CheckPkg {
    /// Package name
    pub name: String,
    /// Version to check
    pub version: String,
}

#[derive(Parser)]
pub struct CompareVersions {
    pub a: String,
    pub b: String,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::source::SourceKind;

    #[test]
    fn parse_config() {
        let config: Config = toml::from_str(
            r#"
            arch = "amd64"

            [[source]]
            url = "https://deb.debian.org/debian"
            suite = "bookworm"
            components = ["main", "contrib"]

            [[source]]
            kind = "deb-src"
            url = "https://deb.debian.org/debian"
            suite = "bookworm"
            components = ["main"]
            "#,
        )
        .unwrap();
        config.check_sanity().unwrap();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[1].kind, SourceKind::Source);
    }

    #[test]
    fn reject_bad_config() {
        let config: Config = toml::from_str(r#"arch = "amd64""#).unwrap();
        assert!(config.check_sanity().is_err());

        let config: Config = toml::from_str(
            r#"
            arch = "../amd64"
            source = ["deb http://x.org/d sid main"]
            "#,
        )
        .unwrap();
        assert!(config.check_sanity().is_err());
    }

    #[test]
    fn parse_opts() {
        let opts = Opts::try_parse_from(["aptcache", "-v", "fetch", "--source", "hello"]).unwrap();
        assert!(opts.verbose);
        match opts.subcmd {
            SubCmd::Fetch(f) => {
                assert!(f.source);
                assert_eq!(f.names, vec!["hello".to_string()]);
                assert_eq!(f.output, PathBuf::from("."));
            }
            _ => panic!("Expected fetch subcommand"),
        }
        assert!(Opts::try_parse_from(["aptcache", "show"]).is_err());
    }
}
