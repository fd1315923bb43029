//! A parser and aggregator for Linux `perf.data` sampling profiles.
//!
//! Given a profile captured by `perf record` and paths to `nm` and
//! `objdump`, this crate walks the sample stream once, attributes every
//! sample to the memory map that held its pc at the time it was taken,
//! and joins the aggregated counts with symbol tables and disassembly to
//! produce a per-function, per-instruction event-count [`Report`].
//!
//! # Example
//!
//! ```no_run
//! use linux_perf_import::{ImportOptions, PerfImporter};
//!
//! # fn main() -> Result<(), linux_perf_import::Error> {
//! let importer = PerfImporter::new(ImportOptions {
//!     binary_cache_root: "/mirrors/target-device".to_string(),
//!     ..ImportOptions::default()
//! });
//! let report = importer.import_file("perf.data")?;
//! for (function, profile) in &report.functions {
//!     println!("{function}: {:?}", profile.counters);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Maps holding at most 1% of every event, and symbols holding at most
//! 0.5%, are filtered out of the report; the top-level counters always
//! reflect every attributed sample. `nm` and `objdump` failures degrade
//! the affected map or symbol instead of failing the import.

mod aggregate;
mod attrs;
mod cursor;
mod disasm;
mod elf;
mod emit;
mod error;
mod features;
mod header;
mod importer;
mod maps;
mod record;
mod report;
mod section;
mod symbols;
mod tool;

pub use attrs::{EventDescriptor, EventTable, PerfEventAttr};
pub use error::{Error, ReadError};
pub use importer::{import_perf_file, ImportOptions, PerfImporter};
pub use maps::Map;
pub use record::SampleFormat;
pub use report::{FunctionReport, Report, ReportLine};
pub use symbols::Symbol;
pub use tool::{LineStream, ShellLauncher, ToolLauncher};
