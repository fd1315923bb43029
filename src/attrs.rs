use std::collections::HashMap;
use std::sync::Arc;

use crate::cursor::ByteCursor;
use crate::error::{Error, ReadError};
use crate::header::FileHeader;
use crate::record::SampleFormat;
use crate::section::FileSection;

pub const PERF_TYPE_HARDWARE: u32 = 0;
pub const PERF_TYPE_SOFTWARE: u32 = 1;

/// Event names for `PERF_TYPE_HARDWARE`, indexed by `config`.
static HW_EVENT_NAMES: [&str; 10] = [
    "cycles",
    "instructions",
    "cache-references",
    "cache-misses",
    "branch-instructions",
    "branch-misses",
    "bus-cycles",
    "stalled-cycles-frontend",
    "stalled-cycles-backend",
    "ref-cpu-cycles",
];

/// Event names for `PERF_TYPE_SOFTWARE`, indexed by `config`.
static SW_EVENT_NAMES: [&str; 9] = [
    "cpu-clock",
    "task-clock",
    "page-faults",
    "context-switches",
    "cpu-migrations",
    "minor-faults",
    "major-faults",
    "alignment-faults",
    "emulation-faults",
];

/// `perf_event_attr`
///
/// Only the leading fields matter here; files written by newer perf
/// versions append more, and files written by very old versions may stop
/// after `branch_sample_type`. Absent trailing fields read as zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerfEventAttr {
    pub type_: u32,
    /// Self-declared size of this attr. In the attribute table, the id-list
    /// locator sits at this offset within the entry.
    pub size: u32,
    pub config: u64,
    pub sample_period: u64,
    pub sample_type: u64,
    pub read_format: u64,
    pub flags: u64,
    pub wakeup_events: u32,
    pub bp_type: u32,
    pub bp_addr: u64,
    pub bp_len: u64,
    pub branch_sample_type: u64,
}

impl PerfEventAttr {
    /// Everything through `sample_type` must be present.
    pub const MIN_SIZE: usize = 4 + 4 + 8 + 8 + 8;

    pub fn parse(data: &[u8]) -> Result<Self, ReadError> {
        let mut cursor = ByteCursor::new(data);
        let type_ = cursor.take_u32(ReadError::PerfEventAttr)?;
        let size = cursor.take_u32(ReadError::PerfEventAttr)?;
        let config = cursor.take_u64(ReadError::PerfEventAttr)?;
        let sample_period = cursor.take_u64(ReadError::PerfEventAttr)?;
        let sample_type = cursor.take_u64(ReadError::PerfEventAttr)?;
        let opt_u64 = |cursor: &mut ByteCursor<'_>| -> u64 {
            cursor.take_u64(ReadError::PerfEventAttr).unwrap_or(0)
        };
        let read_format = opt_u64(&mut cursor);
        let flags = opt_u64(&mut cursor);
        let wakeup_events = cursor.take_u32(ReadError::PerfEventAttr).unwrap_or(0);
        let bp_type = cursor.take_u32(ReadError::PerfEventAttr).unwrap_or(0);
        let bp_addr = opt_u64(&mut cursor);
        let bp_len = opt_u64(&mut cursor);
        let branch_sample_type = opt_u64(&mut cursor);
        Ok(Self {
            type_,
            size,
            config,
            sample_period,
            sample_type,
            read_format,
            flags,
            wakeup_events,
            bp_type,
            bp_addr,
            bp_len,
            branch_sample_type,
        })
    }

    /// The canonical perf name for this event, derived from `(type, config)`.
    pub fn event_name(&self) -> &'static str {
        let table: &[&'static str] = match self.type_ {
            PERF_TYPE_HARDWARE => &HW_EVENT_NAMES,
            PERF_TYPE_SOFTWARE => &SW_EVENT_NAMES,
            _ => return "unknown",
        };
        table
            .get(usize::try_from(self.config).unwrap_or(usize::MAX))
            .copied()
            .unwrap_or("unknown")
    }
}

/// A single event description: the name samples are aggregated under and
/// the layout mask used to decode SAMPLE records.
#[derive(Debug, Clone)]
pub struct EventDescriptor {
    pub name: Arc<str>,
    pub sample_type: SampleFormat,
}

/// Event-id dictionaries built from the file's attribute metadata.
///
/// All descriptors are required to share one sample layout; a file whose
/// descriptors disagree is rejected up front rather than misparsed.
#[derive(Debug, Default)]
pub struct EventTable {
    descriptors: Vec<EventDescriptor>,
    by_id: HashMap<u64, usize>,
    /// Exactly one descriptor with no explicit ids: every sample id,
    /// whatever its value, resolves to that descriptor.
    fallback: bool,
}

impl EventTable {
    /// Parse the `HEADER_EVENT_DESC` feature section.
    ///
    /// ```c
    /// struct {
    ///   uint32_t nr; /* number of events */
    ///   uint32_t attr_size; /* size of each perf_event_attr */
    ///   struct {
    ///     struct perf_event_attr attr;  /* size of attr_size */
    ///     uint32_t nr_ids;
    ///     struct perf_header_string event_string;
    ///     uint64_t ids[nr_ids];
    ///   } events[nr]; /* Variable length records */
    /// };
    /// ```
    pub fn parse_event_desc(section_data: &[u8]) -> Result<Self, Error> {
        let mut cursor = ByteCursor::new(section_data);
        let nr = cursor.take_u32(ReadError::EventDesc)?;
        let attr_size = cursor.take_u32(ReadError::EventDesc)? as usize;
        if attr_size < PerfEventAttr::MIN_SIZE {
            return Err(ReadError::PerfEventAttr.into());
        }

        let mut descriptors = Vec::with_capacity(nr as usize);
        let mut id_lists = Vec::with_capacity(nr as usize);
        for _ in 0..nr {
            let attr = PerfEventAttr::parse(cursor.take_bytes(attr_size, ReadError::EventDesc)?)?;
            let nr_ids = cursor.take_u32(ReadError::EventDesc)?;
            let str_len = cursor.take_u32(ReadError::EventDesc)? as usize;
            let name_bytes = cursor.take_bytes(str_len, ReadError::EventDesc)?;
            let mut ids = Vec::with_capacity(nr_ids as usize);
            for _ in 0..nr_ids {
                ids.push(cursor.take_u64(ReadError::EventIds)?);
            }
            descriptors.push(EventDescriptor {
                name: trimmed_name(name_bytes),
                sample_type: SampleFormat::from_bits_retain(attr.sample_type),
            });
            id_lists.push(ids);
        }
        Self::finish(descriptors, id_lists)
    }

    /// Parse the attribute table when no event-desc section exists. Each
    /// entry is a `perf_event_attr` followed by a `FileSection` locating
    /// its id list; names fall back to the fixed `(type, config)` tables.
    pub fn parse_attr_table(file_data: &[u8], header: &FileHeader) -> Result<Self, Error> {
        let FileSection { offset, size } = header.attr_section;
        if header.attr_size == 0 {
            return Self::finish(Vec::new(), Vec::new());
        }
        let nr = size / header.attr_size;

        let mut descriptors = Vec::with_capacity(nr as usize);
        let mut id_lists = Vec::with_capacity(nr as usize);
        for index in 0..nr {
            let entry_offset = (offset + index * header.attr_size) as usize;
            let entry = file_data
                .get(entry_offset..)
                .ok_or(ReadError::PerfEventAttr)?;
            let attr = PerfEventAttr::parse(entry)?;

            // The id-list locator sits at the attr's self-declared size.
            let mut locator_cursor = ByteCursor::new(
                entry.get(attr.size as usize..).ok_or(ReadError::EventIds)?,
            );
            let ids_section = FileSection::parse(&mut locator_cursor)?;
            let ids = read_id_list(file_data, &ids_section)?;

            descriptors.push(EventDescriptor {
                name: Arc::from(attr.event_name()),
                sample_type: SampleFormat::from_bits_retain(attr.sample_type),
            });
            id_lists.push(ids);
        }
        Self::finish(descriptors, id_lists)
    }

    fn finish(descriptors: Vec<EventDescriptor>, id_lists: Vec<Vec<u64>>) -> Result<Self, Error> {
        if let Some(first) = descriptors.first() {
            for descriptor in &descriptors[1..] {
                if descriptor.sample_type != first.sample_type {
                    return Err(Error::MixedSampleLayouts(
                        first.sample_type.bits(),
                        descriptor.sample_type.bits(),
                    ));
                }
            }
        }

        let fallback = descriptors.len() == 1 && id_lists[0].is_empty();
        let mut by_id = HashMap::new();
        for (index, ids) in id_lists.iter().enumerate() {
            for &id in ids {
                by_id.insert(id, index);
            }
        }
        Ok(Self {
            descriptors,
            by_id,
            fallback,
        })
    }

    /// Look up the descriptor a sample id belongs to. With the fallback
    /// rule active any id resolves, matching perf's behavior for files
    /// recorded with a single counter.
    pub fn resolve(&self, id: u64) -> Option<&EventDescriptor> {
        if self.fallback {
            return self.descriptors.first();
        }
        self.by_id.get(&id).map(|&index| &self.descriptors[index])
    }

    /// The sample layout shared by every descriptor in the file.
    pub fn sample_layout(&self) -> Option<SampleFormat> {
        self.descriptors.first().map(|d| d.sample_type)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

fn read_id_list(file_data: &[u8], section: &FileSection) -> Result<Vec<u64>, Error> {
    let offset = section.offset as usize;
    let size = section.size as usize;
    let data = file_data
        .get(offset..offset + size)
        .ok_or(ReadError::EventIds)?;
    let mut cursor = ByteCursor::new(data);
    let mut ids = Vec::with_capacity(size / 8);
    for _ in 0..size / 8 {
        ids.push(cursor.take_u64(ReadError::EventIds)?);
    }
    Ok(ids)
}

/// Event-desc name strings are stored padded; the name ends at the first
/// NUL, like every other string in the file.
fn trimmed_name(bytes: &[u8]) -> Arc<str> {
    let len = memchr::memchr(0, bytes).unwrap_or(bytes.len());
    Arc::from(String::from_utf8_lossy(&bytes[..len]).as_ref())
}
