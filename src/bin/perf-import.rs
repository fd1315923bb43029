use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use linux_perf_import::{ImportOptions, PerfImporter};

/// Import a perf.data profile and print the aggregated report as JSON.
///
/// Set the environment variable `RUST_LOG=debug` to see which records,
/// maps and symbols were skipped along the way.
#[derive(Parser)]
#[command(version)]
struct Cmdline {
    /// Path of the perf.data file to import
    input: PathBuf,

    /// nm command used to fetch symbol tables
    #[arg(long, default_value = "nm")]
    nm: String,

    /// objdump command used to disassemble reported functions
    #[arg(long, default_value = "objdump")]
    objdump: String,

    /// Prefix prepended to binary paths recorded in the profile
    #[arg(long, default_value = "")]
    binary_cache_root: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let Cmdline {
        input,
        nm,
        objdump,
        binary_cache_root,
    } = Cmdline::parse();

    let importer = PerfImporter::new(ImportOptions {
        nm,
        objdump,
        binary_cache_root,
    });
    let report = importer
        .import_file(&input)
        .with_context(|| format!("failed to import {}", input.display()))?;

    let stdout = std::io::stdout();
    let mut stdout = stdout.lock();
    serde_json::to_writer_pretty(&mut stdout, &report).context("failed to serialize report")?;
    writeln!(stdout)?;
    Ok(())
}
