mod apt;
pub use apt::{decode_index, AptSourceReader};
#[cfg(test)]
pub(crate) use apt::test as apt_test;

use crate::{error::SourceReadError, types::PkgRecord};

use anyhow::{bail, format_err, Result};
use async_trait::async_trait;
use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_until},
    character::complete::{char, space0, space1},
    combinator::{eof, opt, value},
    multi::many0,
    sequence::{delimited, preceded, terminated},
    IResult,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Produces package records from one repository source
#[async_trait]
pub trait SourceReader: Send + Sync {
    async fn read(
        &self,
        source: &SourceDescriptor,
        arch: &str,
    ) -> Result<Vec<PkgRecord>, SourceReadError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// `deb`, binary packages
    #[serde(rename = "deb")]
    Binary,
    /// `deb-src`, source packages
    #[serde(rename = "deb-src")]
    Source,
}

impl Default for SourceKind {
    fn default() -> Self {
        SourceKind::Binary
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SourceKind::Binary => f.write_str("deb"),
            SourceKind::Source => f.write_str("deb-src"),
        }
    }
}

/// One repository source, as in a sources.list line
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SourceConfig")]
pub struct SourceDescriptor {
    pub kind: SourceKind,
    pub url: String,
    /// Distribution name, or the index directory for flat repositories (ends with `/`)
    pub suite: String,
    pub components: Vec<String>,
}

/// Sources can be written as a sources.list line or as a table
#[derive(Deserialize)]
#[serde(untagged)]
enum SourceConfig {
    Line(String),
    Table {
        #[serde(default)]
        kind: SourceKind,
        url: String,
        suite: String,
        #[serde(default)]
        components: Vec<String>,
    },
}

impl TryFrom<SourceConfig> for SourceDescriptor {
    type Error = anyhow::Error;

    fn try_from(c: SourceConfig) -> Result<Self> {
        match c {
            SourceConfig::Line(line) => line.parse(),
            SourceConfig::Table {
                kind,
                url,
                suite,
                components,
            } => SourceDescriptor::new(kind, &url, &suite, components),
        }
    }
}

impl SourceDescriptor {
    pub fn new(kind: SourceKind, url: &str, suite: &str, components: Vec<String>) -> Result<Self> {
        let res = SourceDescriptor {
            kind,
            url: normalize_url(url),
            suite: suite.to_owned(),
            components,
        };
        res.check_sanity()?;
        Ok(res)
    }

    /// Flat repositories keep their index right under `url/suite`
    pub fn is_flat(&self) -> bool {
        self.suite.ends_with('/')
    }

    pub fn check_sanity(&self) -> Result<()> {
        if self.url.is_empty() {
            bail!("Repository url is empty");
        }
        if self.is_flat() && !self.components.is_empty() {
            bail!(
                "Flat repository {} ({}) must not list components",
                self.url,
                self.suite
            );
        }
        if !self.is_flat() && self.components.is_empty() {
            bail!("Repository {} ({}) has no components", self.url, self.suite);
        }
        Ok(())
    }

    /// Urls of all compressed indices this source consists of
    pub fn index_urls(&self, arch: &str) -> Vec<String> {
        let index = match self.kind {
            SourceKind::Binary => "Packages.gz",
            SourceKind::Source => "Sources.gz",
        };

        if self.is_flat() {
            let dir = self.suite.trim_end_matches('/');
            if dir.is_empty() || dir == "." {
                return vec![format!("{}/{}", self.url, index)];
            }
            return vec![format!("{}/{}/{}", self.url, dir, index)];
        }

        self.components
            .iter()
            .map(|component| match self.kind {
                SourceKind::Binary => format!(
                    "{}/dists/{}/{}/binary-{}/{}",
                    self.url, self.suite, component, arch, index
                ),
                SourceKind::Source => format!(
                    "{}/dists/{}/{}/source/{}",
                    self.url, self.suite, component, index
                ),
            })
            .collect()
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.kind, self.url, self.suite)?;
        for component in &self.components {
            write!(f, " {}", component)?;
        }
        Ok(())
    }
}

impl FromStr for SourceDescriptor {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (_, (kind, url, suite, components)) = parse_source_line(s.trim())
            .map_err(|e| format_err!("Malformed source line '{}': {}", s, e))?;
        SourceDescriptor::new(
            kind,
            url,
            suite,
            components.into_iter().map(|c| c.to_owned()).collect(),
        )
    }
}

fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_owned()
}

// parser combinators
fn parse_kind(s: &str) -> IResult<&str, SourceKind> {
    alt((
        value(SourceKind::Source, tag("deb-src")),
        value(SourceKind::Binary, tag("deb")),
    ))(s)
}

fn parse_options(s: &str) -> IResult<&str, &str> {
    delimited(char('['), take_until("]"), char(']'))(s)
}

fn parse_word(s: &str) -> IResult<&str, &str> {
    is_not(" \t")(s)
}

fn parse_source_line(s: &str) -> IResult<&str, (SourceKind, &str, &str, Vec<&str>)> {
    let (s, kind) = parse_kind(s)?;
    let (s, _) = space1(s)?;
    // Options like [arch=amd64] are accepted but not used
    let (s, _) = opt(terminated(parse_options, space1))(s)?;
    let (s, url) = parse_word(s)?;
    let (s, _) = space1(s)?;
    let (s, suite) = parse_word(s)?;
    let (s, components) = many0(preceded(space1, parse_word))(s)?;
    let (s, _) = space0(s)?;
    let (s, _) = eof(s)?;
    Ok((s, (kind, url, suite, components)))
}
