use std::fs::File;
use std::path::Path;

use linear_map::LinearMap;
use log::debug;
use memmap2::Mmap;

use crate::aggregate::Aggregator;
use crate::attrs::EventTable;
use crate::cursor::ByteCursor;
use crate::elf::is_shared_object;
use crate::emit::Emitter;
use crate::error::{Error, ReadError};
use crate::features::HEADER_EVENT_DESC;
use crate::header::FileHeader;
use crate::maps::{Map, MapRegistry};
use crate::record::{
    MmapEvent, RecordHeader, Sample, PERF_RECORD_MMAP, PERF_RECORD_MMAP2, PERF_RECORD_SAMPLE,
    PROT_EXEC,
};
use crate::report::Report;
use crate::section::FileSection;
use crate::tool::{ShellLauncher, ToolLauncher};

/// How a profile is imported: the symbol and disassembly tools to run and
/// the root their paths are resolved under.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// The `nm` command, run once with `-D` and once without per map.
    pub nm: String,
    /// The `objdump` command, run once per reported symbol.
    pub objdump: String,
    /// Prefixed verbatim to every filename recorded in the profile, so a
    /// profile captured on a target device can be resolved against a
    /// local mirror of its filesystem.
    pub binary_cache_root: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            nm: "nm".to_string(),
            objdump: "objdump".to_string(),
            binary_cache_root: String::new(),
        }
    }
}

/// Imports `perf.data` profiles into [`Report`] trees.
///
/// The importer assumes every event descriptor in a file shares one
/// sample layout, which holds for everything `perf record` produces;
/// mixed-layout files are rejected up front. One import call runs on one
/// thread and spawns at most one `nm`/`objdump` child at a time.
///
/// # Example
///
/// ```no_run
/// use linux_perf_import::{ImportOptions, PerfImporter};
///
/// # fn main() -> Result<(), linux_perf_import::Error> {
/// let importer = PerfImporter::new(ImportOptions::default());
/// let report = importer.import_file("perf.data")?;
/// for (event, count) in &report.counters {
///     println!("{event}: {count}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct PerfImporter {
    options: ImportOptions,
    launcher: Box<dyn ToolLauncher>,
}

impl PerfImporter {
    pub fn new(options: ImportOptions) -> Self {
        Self::with_launcher(options, Box::new(ShellLauncher))
    }

    /// Use a custom tool launcher instead of spawning `nm`/`objdump`
    /// under a shell. Tests use this to supply canned tool output.
    pub fn with_launcher(options: ImportOptions, launcher: Box<dyn ToolLauncher>) -> Self {
        Self { options, launcher }
    }

    /// Import the profile at `path`. The file is mapped read-only for the
    /// duration of the call.
    pub fn import_file(&self, path: impl AsRef<Path>) -> Result<Report, Error> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and dropped before the file.
        let mmap = unsafe { Mmap::map(&file)? };
        self.import_bytes(&mmap)
    }

    /// Import a `perf.data` image already in memory.
    pub fn import_bytes(&self, file_data: &[u8]) -> Result<Report, Error> {
        let header = FileHeader::parse(file_data)?;

        let feature_sections = read_feature_section_table(file_data, &header)?;
        let events = if let Some(section) = feature_sections.get(&HEADER_EVENT_DESC) {
            EventTable::parse_event_desc(slice_section(file_data, section)?)?
        } else {
            EventTable::parse_attr_table(file_data, &header)?
        };
        debug!("{} event descriptor(s)", events.len());

        let mut registry = MapRegistry::default();
        let mut aggregator = Aggregator::default();
        self.read_data_stream(file_data, &header, &events, &mut registry, &mut aggregator)?;

        let emitter = Emitter::new(&aggregator, &registry, &self.options, &*self.launcher);
        Ok(emitter.emit())
    }

    /// Walk the data section one record at a time, recording maps and
    /// crediting samples. Record kinds other than MMAP, MMAP2 and SAMPLE
    /// are skipped by size.
    fn read_data_stream(
        &self,
        file_data: &[u8],
        header: &FileHeader,
        events: &EventTable,
        registry: &mut MapRegistry,
        aggregator: &mut Aggregator,
    ) -> Result<(), Error> {
        let FileSection { offset, size } = header.data_section;
        let data = &file_data[offset as usize..(offset + size) as usize];

        let mut position = 0usize;
        while position < data.len() {
            let mut cursor = ByteCursor::new(&data[position..]);
            let record = RecordHeader::parse(&mut cursor)?;
            let record_size = record.size as usize;
            if record_size < RecordHeader::STRUCT_SIZE {
                return Err(Error::InvalidRecordSize);
            }
            if position + record_size > data.len() {
                return Err(Error::RecordPastEndOfData(record.size as u64));
            }
            let body = &data[position + RecordHeader::STRUCT_SIZE..position + record_size];

            match record.type_ {
                PERF_RECORD_MMAP => self.record_map(MmapEvent::parse(body, false)?, registry),
                PERF_RECORD_MMAP2 => {
                    let event = MmapEvent::parse(body, true)?;
                    if event.prot.is_some_and(|prot| prot & PROT_EXEC == 0) {
                        debug!("skipping non-executable mapping of {}", event.filename);
                    } else {
                        self.record_map(event, registry);
                    }
                }
                PERF_RECORD_SAMPLE => {
                    let layout = events.sample_layout().ok_or(Error::NoEventDescriptors)?;
                    let sample = Sample::parse(body, layout)?;
                    self.credit_sample(&sample, events, registry, aggregator);
                }
                other => debug!("skipping record of type {other}"),
            }
            position += record_size;
        }
        Ok(())
    }

    fn record_map(&self, event: MmapEvent, registry: &mut MapRegistry) {
        // EXEC ELF objects aren't relocated; DYN ones are, so their pcs
        // must be rebased by the map base less the file offset.
        let local_path = format!("{}{}", self.options.binary_cache_root, event.filename);
        let adjust = if is_shared_object(&local_path) {
            event.start - event.pgoff
        } else {
            0
        };
        let map = Map {
            start: event.start,
            end: event.start + event.len,
            adjust,
            filename: event.filename,
        };
        registry.record(map, event.time);
    }

    fn credit_sample(
        &self,
        sample: &Sample,
        events: &EventTable,
        registry: &MapRegistry,
        aggregator: &mut Aggregator,
    ) {
        let Some(map_id) = registry.resolve(sample.time, sample.ip) else {
            debug!("no map for pc {:#x} at time {}", sample.ip, sample.time);
            return;
        };
        let Some(descriptor) = events.resolve(sample.id) else {
            debug_assert!(false, "sample id {} has no event descriptor", sample.id);
            return;
        };
        aggregator.credit(map_id, sample.ip, &descriptor.name, sample.period);
    }
}

/// Read the table of feature sections stored just after the data section,
/// one `FileSection` per set feature bit, from low bit to high.
fn read_feature_section_table(
    file_data: &[u8],
    header: &FileHeader,
) -> Result<LinearMap<u32, FileSection>, Error> {
    let mut sections = LinearMap::new();
    if header.features.is_empty() {
        return Ok(sections);
    }
    let offset = header
        .feature_section_table_offset()
        .ok_or(ReadError::FileSection)? as usize;
    let table = file_data.get(offset..).ok_or(ReadError::FileSection)?;
    let mut cursor = ByteCursor::new(table);
    for feature in header.features.iter() {
        sections.insert(feature, FileSection::parse(&mut cursor)?);
    }
    Ok(sections)
}

fn slice_section<'a>(file_data: &'a [u8], section: &FileSection) -> Result<&'a [u8], Error> {
    let end = section.end().ok_or_else(|| Error::SectionOutOfBounds {
        offset: section.offset,
        size: section.size,
    })?;
    file_data
        .get(section.offset as usize..end as usize)
        .ok_or(Error::SectionOutOfBounds {
            offset: section.offset,
            size: section.size,
        })
}

/// Import the profile at `path` with stock `nm`/`objdump` and no binary
/// cache root.
pub fn import_perf_file(path: impl AsRef<Path>) -> Result<Report, Error> {
    PerfImporter::new(ImportOptions::default()).import_file(path)
}
