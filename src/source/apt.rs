/// Utilities to deal with APT repository indices
use super::{SourceDescriptor, SourceKind, SourceReader};
use crate::{
    debug,
    error::SourceReadError,
    transport::Transport,
    types::{BinPkgInfo, Checksum, PkgRecord, SrcFile, SrcPkgInfo},
};

use anyhow::{bail, format_err, Context, Result};
use async_trait::async_trait;
use debcontrol::{BufParse, Streaming};
use flate2::read::GzDecoder;
use futures_util::future::try_join_all;
use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;
use std::collections::HashMap;

const BIN_FIELDS: &[&str] = &["Package", "Version", "Filename", "Size", "SHA256", "SHA512"];
const SRC_FIELDS: &[&str] = &[
    "Package",
    "Version",
    "Directory",
    "Files",
    "Checksums-Sha256",
];

/// Reads `Packages.gz` / `Sources.gz` indices of an APT repository
pub struct AptSourceReader<T: Transport> {
    transport: T,
}

impl<T: Transport> AptSourceReader<T> {
    pub fn new(transport: T) -> Self {
        AptSourceReader { transport }
    }

    async fn read_index(&self, url: &str, source: &SourceDescriptor) -> Result<Vec<PkgRecord>> {
        let data = self.transport.retrieve(url).await?;
        let records = decode_index(&data, source.kind, &source.url)
            .context(format!("Failed to decode {}", url))?;
        debug!("{} packages in {}", records.len(), url);
        Ok(records)
    }
}

#[async_trait]
impl<T: Transport> SourceReader for AptSourceReader<T> {
    async fn read(
        &self,
        source: &SourceDescriptor,
        arch: &str,
    ) -> Result<Vec<PkgRecord>, SourceReadError> {
        let urls = source.index_urls(arch);
        let indices = try_join_all(urls.iter().map(|url| self.read_index(url, source)))
            .await
            .map_err(|e| SourceReadError::new(source, format!("{:#}", e)))?;

        Ok(indices.into_iter().flatten().collect())
    }
}

/// Decode a gzipped deb822 index into package records, in index order
pub fn decode_index(data: &[u8], kind: SourceKind, baseurl: &str) -> Result<Vec<PkgRecord>> {
    let interested = match kind {
        SourceKind::Binary => BIN_FIELDS,
        SourceKind::Source => SRC_FIELDS,
    };

    let mut buf_parse = BufParse::new(GzDecoder::new(data), 16384);
    let mut paragraphs = Vec::new();
    while let Some(result) = buf_parse
        .try_next()
        .map_err(|e| format_err!("Malformed repository index: {:?}", e))?
    {
        match result {
            Streaming::Item(paragraph) => {
                let mut fields = HashMap::new();
                for field in paragraph.fields {
                    if interested.contains(&field.name) {
                        fields.insert(field.name.to_string(), field.value);
                    }
                }
                paragraphs.push(fields);
            }
            Streaming::Incomplete => buf_parse
                .buffer()
                .context("Failed to decompress repository index")?,
        }
    }

    // Parse fields in parallel
    let records = paragraphs
        .into_par_iter()
        .filter_map(|fields| {
            let res = match kind {
                SourceKind::Binary => fields_to_bin(fields, baseurl).map(PkgRecord::Binary),
                SourceKind::Source => fields_to_src(fields, baseurl).map(PkgRecord::Source),
            };
            match res {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!("Skipping malformed entry: {}", e);
                    None
                }
            }
        })
        .collect();

    Ok(records)
}

fn fields_to_bin(mut f: HashMap<String, String>, baseurl: &str) -> Result<BinPkgInfo> {
    let name = f
        .remove("Package")
        .ok_or_else(|| format_err!("Package without name"))?;
    Ok(BinPkgInfo {
        version: f
            .remove("Version")
            .ok_or_else(|| format_err!("Package {} without Version", name))?,
        filename: f
            .remove("Filename")
            .ok_or_else(|| format_err!("Package {} without Filename", name))?,
        repo_base: baseurl.to_owned(),
        size: match f.get("Size") {
            Some(size) => Some(size.trim().parse()?),
            None => None,
        },
        checksum: {
            if let Some(hex) = f.get("SHA256") {
                Some(Checksum::from_sha256_str(hex.trim())?)
            } else if let Some(hex) = f.get("SHA512") {
                Some(Checksum::from_sha512_str(hex.trim())?)
            } else {
                None
            }
        },
        name,
    })
}

fn fields_to_src(mut f: HashMap<String, String>, baseurl: &str) -> Result<SrcPkgInfo> {
    let name = f
        .remove("Package")
        .ok_or_else(|| format_err!("Source package without name"))?;
    let files = if let Some(list) = f.get("Checksums-Sha256") {
        parse_file_list(list, true)?
    } else if let Some(list) = f.get("Files") {
        // md5sums only, keep the names and sizes
        parse_file_list(list, false)?
    } else {
        bail!("Source package {} without Files", name)
    };
    if files.is_empty() {
        bail!("Source package {} without Files", name)
    }

    Ok(SrcPkgInfo {
        version: f
            .remove("Version")
            .ok_or_else(|| format_err!("Source package {} without Version", name))?,
        directory: f
            .remove("Directory")
            .ok_or_else(|| format_err!("Source package {} without Directory", name))?,
        files,
        repo_base: baseurl.to_owned(),
        name,
    })
}

/// Parse `<hash> <size> <name>` lines
fn parse_file_list(s: &str, sha256: bool) -> Result<Vec<SrcFile>> {
    lazy_static! {
        static ref FILE_LINE: Regex =
            Regex::new("^(?P<chksum>[0-9a-fA-F]+) +(?P<size>[0-9]+) +(?P<name>.+)$").unwrap();
    }

    let mut res = Vec::new();
    for line in s.lines().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        let captures = FILE_LINE
            .captures(line)
            .ok_or_else(|| format_err!("Malformed file entry: {}", line))?;
        let checksum = match (sha256, captures.name("chksum")) {
            (true, Some(hex)) => Some(Checksum::from_sha256_str(hex.as_str())?),
            _ => None,
        };
        res.push(SrcFile {
            name: captures["name"].to_string(),
            size: Some(captures["size"].parse()?),
            checksum,
        });
    }

    Ok(res)
}
