use aptcache::{
    cli,
    config::{Config, FetchPkg, Opts, SubCmd},
    cmp_versions, due_to, error, info, success, warn, AptClient, Freshness,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use console::style;
use std::{cmp::Ordering, path::Path};

/// Exit codes:
/// 1 => program screwed up
/// 3 => `check`: a newer version is available
#[tokio::main(flavor = "current_thread")]
async fn main() {
    match try_main().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            error!("{}", err.to_string());
            err.chain().skip(1).for_each(|cause| {
                due_to!("{}", cause);
            });
            std::process::exit(1);
        }
    }
}

async fn try_main() -> Result<i32> {
    let opts = Opts::parse();
    cli::set_verbose(opts.verbose);

    // Doesn't need any repository
    if let SubCmd::Compare(c) = &opts.subcmd {
        let sign = match cmp_versions(&c.a, &c.b) {
            Ordering::Less => "<",
            Ordering::Equal => "=",
            Ordering::Greater => ">",
        };
        println!("{} {} {}", c.a, sign, c.b);
        return Ok(0);
    }

    let config = Config::load(&opts.config)?;
    let arch = opts.arch.as_deref().unwrap_or(&config.arch);
    let client = AptClient::new(arch, config.sources);

    info!("Reading repository indices for {}...", style(arch).bold());
    let summary = client
        .update()
        .await
        .context("Failed to refresh repository indices")?;

    match &opts.subcmd {
        SubCmd::Refresh => {
            success!(
                "{} binary and {} source packages available for {} from {} source(s).",
                summary.binary,
                summary.source,
                client.arch(),
                client.sources().len()
            );
        }
        SubCmd::Show(s) => {
            let pkgs = client.get_pkg_info(&s.names);
            for name in &s.names {
                if let Some(b) = pkgs.bin.get(name) {
                    println!("{} {} ({})", style(name).bold(), b.version, b.url());
                }
                if let Some(src) = pkgs.src.get(name) {
                    println!(
                        "{} {} (source, {} files in {}/{})",
                        style(name).bold(),
                        src.version,
                        src.files.len(),
                        src.repo_base,
                        src.directory
                    );
                }
                if !pkgs.bin.contains_key(name) && !pkgs.src.contains_key(name) {
                    warn!("Package {} not found.", style(name).bold());
                }
            }
        }
        SubCmd::Fetch(f) => fetch(&client, f).await?,
        SubCmd::Check(c) => match client.freshness(&c.name, &c.version) {
            Freshness::Latest => success!("{} {} is up to date.", c.name, c.version),
            Freshness::Unknown => {
                warn!("Package {} not found, nothing to compare.", style(&c.name).bold())
            }
            Freshness::Outdated => {
                let known = client.known_version(&c.name).unwrap_or_default();
                info!("{} {} is available (have {}).", c.name, known, c.version);
                return Ok(3);
            }
        },
        // Handled above
        SubCmd::Compare(_) => (),
    }

    Ok(0)
}

async fn fetch(client: &AptClient, opts: &FetchPkg) -> Result<()> {
    tokio::fs::create_dir_all(&opts.output)
        .await
        .context(format!("Failed to create {}", opts.output.display()))?;

    let failed = if opts.source {
        let res = client.get_src_files(&opts.names).await;
        for (name, files) in &res.files {
            let dir = opts.output.join(name);
            tokio::fs::create_dir_all(&dir).await?;
            for (filename, data) in files {
                save(&dir, filename, data).await?;
            }
            success!("{} ({} files)", name, files.len());
        }
        report_missing(&opts.names, |n| {
            res.files.contains_key(n) || res.failed.contains_key(n)
        });
        res.failed
    } else {
        let res = client.get_bin_files(&opts.names).await;
        let pkgs = client.get_pkg_info(&opts.names);
        for (name, data) in &res.files {
            let filename = match pkgs.bin.get(name) {
                Some(info) => info.filename.as_str(),
                None => name.as_str(),
            };
            save(&opts.output, filename, data).await?;
            success!("{}", name);
        }
        report_missing(&opts.names, |n| {
            res.files.contains_key(n) || res.failed.contains_key(n)
        });
        res.failed
    };

    for (name, err) in &failed {
        error!("Failed to download {}: {}", style(name).bold(), err);
    }
    if !failed.is_empty() {
        bail!("{} package(s) could not be downloaded", failed.len());
    }
    Ok(())
}

fn report_missing(names: &[String], found: impl Fn(&str) -> bool) {
    for name in names.iter().filter(|n| !found(n.as_str())) {
        warn!("Package {} not found.", style(name).bold());
    }
}

/// Write data to dir, keeping only the last path component of filename
async fn save(dir: &Path, filename: &str, data: &[u8]) -> Result<()> {
    let name = Path::new(filename)
        .file_name()
        .ok_or_else(|| anyhow::format_err!("Invalid file name {}", filename))?;
    let path = dir.join(name);
    tokio::fs::write(&path, data)
        .await
        .context(format!("Failed to write {}", path.display()))?;
    Ok(())
}
