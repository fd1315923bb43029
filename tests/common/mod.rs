//! Shared helpers: a synthetic perf.data builder and canned tool output.

#![allow(dead_code)]

use std::io;

use linux_perf_import::{LineStream, ToolLauncher};

pub const SAMPLE_IP: u64 = 1 << 0;
pub const SAMPLE_TID: u64 = 1 << 1;
pub const SAMPLE_TIME: u64 = 1 << 2;
pub const SAMPLE_ADDR: u64 = 1 << 3;
pub const SAMPLE_ID: u64 = 1 << 6;
pub const SAMPLE_CPU: u64 = 1 << 7;
pub const SAMPLE_PERIOD: u64 = 1 << 8;
pub const SAMPLE_STREAM_ID: u64 = 1 << 9;
pub const SAMPLE_IDENTIFIER: u64 = 1 << 16;

pub const PERF_TYPE_HARDWARE: u32 = 0;
pub const PERF_TYPE_SOFTWARE: u32 = 1;

pub const PROT_EXEC: u32 = 4;
pub const PROT_READ: u32 = 1;

const HEADER_SIZE: usize = 104;
const ATTR_BLOB_SIZE: usize = 32;
const ATTR_ENTRY_SIZE: usize = ATTR_BLOB_SIZE + 16;
const EVENT_DESC_FEATURE: u32 = 12;

#[derive(Clone)]
pub struct EventSpec {
    pub name: &'static str,
    pub type_: u32,
    pub config: u64,
    pub sample_type: u64,
    pub ids: Vec<u64>,
}

#[derive(Clone, Copy, Default)]
pub struct SampleSpec {
    pub ip: u64,
    pub period: u64,
    pub time: u64,
    pub id: u64,
}

/// Assembles a version-2 perf.data image in memory. Events either go
/// through the attribute table (names derived from `(type, config)`) or,
/// with `with_event_desc`, through a `HEADER_EVENT_DESC` feature section
/// carrying explicit names.
pub struct ProfileBuilder {
    events: Vec<EventSpec>,
    use_event_desc: bool,
    records: Vec<Vec<u8>>,
}

impl ProfileBuilder {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            use_event_desc: false,
            records: Vec::new(),
        }
    }

    pub fn with_event_desc(mut self) -> Self {
        self.use_event_desc = true;
        self
    }

    pub fn event(mut self, spec: EventSpec) -> Self {
        self.events.push(spec);
        self
    }

    /// A hardware `cycles` descriptor with the given layout and ids.
    pub fn cycles_event(self, sample_type: u64, ids: Vec<u64>) -> Self {
        self.event(EventSpec {
            name: "cycles",
            type_: PERF_TYPE_HARDWARE,
            config: 0,
            sample_type,
            ids,
        })
    }

    pub fn mmap(mut self, start: u64, len: u64, pgoff: u64, filename: &str, time: u64) -> Self {
        let body = mmap_body(start, len, pgoff, None, filename, time);
        self.push_record(1, body);
        self
    }

    pub fn mmap2(
        mut self,
        start: u64,
        len: u64,
        pgoff: u64,
        prot: u32,
        filename: &str,
        time: u64,
    ) -> Self {
        let body = mmap_body(start, len, pgoff, Some(prot), filename, time);
        self.push_record(10, body);
        self
    }

    /// A SAMPLE record serialized against the first event's layout.
    pub fn sample(mut self, spec: SampleSpec) -> Self {
        let layout = self.events.first().expect("add an event first").sample_type;
        let mut body = Vec::new();
        if layout & SAMPLE_IDENTIFIER != 0 {
            body.extend_from_slice(&spec.id.to_le_bytes());
        }
        if layout & SAMPLE_IP != 0 {
            body.extend_from_slice(&spec.ip.to_le_bytes());
        }
        if layout & SAMPLE_TID != 0 {
            body.extend_from_slice(&[0; 8]);
        }
        if layout & SAMPLE_TIME != 0 {
            body.extend_from_slice(&spec.time.to_le_bytes());
        }
        if layout & SAMPLE_ADDR != 0 {
            body.extend_from_slice(&[0; 8]);
        }
        if layout & SAMPLE_ID != 0 {
            body.extend_from_slice(&spec.id.to_le_bytes());
        }
        if layout & SAMPLE_STREAM_ID != 0 {
            body.extend_from_slice(&[0; 8]);
        }
        if layout & SAMPLE_CPU != 0 {
            body.extend_from_slice(&[0; 8]);
        }
        if layout & SAMPLE_PERIOD != 0 {
            body.extend_from_slice(&spec.period.to_le_bytes());
        }
        self.push_record(9, body);
        self
    }

    /// A record of an arbitrary type, for exercising the skip path.
    pub fn raw_record(mut self, type_: u32, body: Vec<u8>) -> Self {
        self.push_record(type_, body);
        self
    }

    fn push_record(&mut self, type_: u32, body: Vec<u8>) {
        let size = 8 + body.len();
        let mut record = Vec::with_capacity(size);
        record.extend_from_slice(&type_.to_le_bytes());
        record.extend_from_slice(&0u16.to_le_bytes()); // misc
        record.extend_from_slice(&(size as u16).to_le_bytes());
        record.extend_from_slice(&body);
        self.records.push(record);
    }

    pub fn build(self) -> Vec<u8> {
        let mut file = vec![0u8; HEADER_SIZE];

        // Attribute table plus id lists (unused when the event-desc
        // section is in play; perf itself always writes the table).
        let (attrs_offset, attrs_size) = if self.use_event_desc {
            (0u64, 0u64)
        } else {
            let attrs_offset = file.len();
            let id_base = attrs_offset + ATTR_ENTRY_SIZE * self.events.len();
            let mut id_area = Vec::new();
            for event in &self.events {
                let ids_offset = id_base + id_area.len();
                file.extend_from_slice(&attr_blob(event));
                file.extend_from_slice(&(ids_offset as u64).to_le_bytes());
                file.extend_from_slice(&((event.ids.len() * 8) as u64).to_le_bytes());
                for id in &event.ids {
                    id_area.extend_from_slice(&id.to_le_bytes());
                }
            }
            file.extend_from_slice(&id_area);
            (
                attrs_offset as u64,
                (ATTR_ENTRY_SIZE * self.events.len()) as u64,
            )
        };

        let data_offset = file.len();
        for record in &self.records {
            file.extend_from_slice(record);
        }
        let data_size = file.len() - data_offset;

        let mut flags = [0u64; 4];
        if self.use_event_desc {
            flags[0] |= 1 << EVENT_DESC_FEATURE;
            // One feature-section entry, patched once the blob lands.
            let table_offset = file.len();
            file.extend_from_slice(&[0; 16]);
            let desc_offset = file.len();
            let blob = event_desc_blob(&self.events);
            file.extend_from_slice(&blob);
            file[table_offset..table_offset + 8]
                .copy_from_slice(&(desc_offset as u64).to_le_bytes());
            file[table_offset + 8..table_offset + 16]
                .copy_from_slice(&(blob.len() as u64).to_le_bytes());
        }

        // Patch the header.
        file[0..8].copy_from_slice(b"PERFILE2");
        file[8..16].copy_from_slice(&(HEADER_SIZE as u64).to_le_bytes());
        file[16..24].copy_from_slice(&(ATTR_ENTRY_SIZE as u64).to_le_bytes());
        file[24..32].copy_from_slice(&attrs_offset.to_le_bytes());
        file[32..40].copy_from_slice(&attrs_size.to_le_bytes());
        file[40..48].copy_from_slice(&(data_offset as u64).to_le_bytes());
        file[48..56].copy_from_slice(&(data_size as u64).to_le_bytes());
        // event_types section stays zero.
        for (index, chunk) in flags.iter().enumerate() {
            let at = 72 + index * 8;
            file[at..at + 8].copy_from_slice(&chunk.to_le_bytes());
        }
        file
    }
}

fn attr_blob(event: &EventSpec) -> [u8; ATTR_BLOB_SIZE] {
    let mut blob = [0u8; ATTR_BLOB_SIZE];
    blob[0..4].copy_from_slice(&event.type_.to_le_bytes());
    blob[4..8].copy_from_slice(&(ATTR_BLOB_SIZE as u32).to_le_bytes());
    blob[8..16].copy_from_slice(&event.config.to_le_bytes());
    // sample_period stays zero.
    blob[24..32].copy_from_slice(&event.sample_type.to_le_bytes());
    blob
}

fn event_desc_blob(events: &[EventSpec]) -> Vec<u8> {
    let mut blob = Vec::new();
    blob.extend_from_slice(&(events.len() as u32).to_le_bytes());
    blob.extend_from_slice(&(ATTR_BLOB_SIZE as u32).to_le_bytes());
    for event in events {
        blob.extend_from_slice(&attr_blob(event));
        blob.extend_from_slice(&(event.ids.len() as u32).to_le_bytes());
        let mut name = event.name.as_bytes().to_vec();
        name.push(0);
        while name.len() % 8 != 0 {
            name.push(0);
        }
        blob.extend_from_slice(&(name.len() as u32).to_le_bytes());
        blob.extend_from_slice(&name);
        for id in &event.ids {
            blob.extend_from_slice(&id.to_le_bytes());
        }
    }
    blob
}

fn mmap_body(
    start: u64,
    len: u64,
    pgoff: u64,
    prot: Option<u32>,
    filename: &str,
    time: u64,
) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&1000u32.to_le_bytes()); // pid
    body.extend_from_slice(&1000u32.to_le_bytes()); // tid
    body.extend_from_slice(&start.to_le_bytes());
    body.extend_from_slice(&len.to_le_bytes());
    body.extend_from_slice(&pgoff.to_le_bytes());
    if let Some(prot) = prot {
        body.extend_from_slice(&[0; 8]); // maj, min
        body.extend_from_slice(&[0; 16]); // ino, ino_generation
        body.extend_from_slice(&prot.to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes()); // flags
    }
    let mut name = filename.as_bytes().to_vec();
    name.push(0);
    while name.len() % 8 != 0 {
        name.push(0);
    }
    body.extend_from_slice(&name);
    // Trailing perf_sample_id; only its time matters.
    body.extend_from_slice(&1000u32.to_le_bytes());
    body.extend_from_slice(&1000u32.to_le_bytes());
    body.extend_from_slice(&time.to_le_bytes());
    body.extend_from_slice(&0u64.to_le_bytes());
    body
}

struct CannedStream(Vec<String>);

impl LineStream for CannedStream {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        if self.0.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.0.remove(0)))
        }
    }
}

/// Replays canned `nm` and `objdump` output. Disassembly lines are
/// filtered to the `--start-address`/`--stop-address` range in the
/// command, the way the real tool restricts its output.
pub struct ToolFixture {
    pub nm_lines: Vec<String>,
    pub objdump_lines: Vec<String>,
}

impl ToolFixture {
    pub fn new(nm_lines: &[&str], objdump_lines: &[&str]) -> Self {
        Self {
            nm_lines: nm_lines.iter().map(|s| s.to_string()).collect(),
            objdump_lines: objdump_lines.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ToolLauncher for ToolFixture {
    fn launch(&self, command: &str) -> io::Result<Box<dyn LineStream>> {
        if command.contains("--start-address") {
            let start = hex_flag(command, "--start-address=").unwrap_or(0);
            let stop = hex_flag(command, "--stop-address=").unwrap_or(u64::MAX);
            let lines = self
                .objdump_lines
                .iter()
                .filter(|line| match line_address(line) {
                    Some(address) => address >= start && address < stop,
                    None => true,
                })
                .cloned()
                .collect();
            Ok(Box::new(CannedStream(lines)))
        } else {
            Ok(Box::new(CannedStream(self.nm_lines.clone())))
        }
    }
}

fn hex_flag(command: &str, flag: &str) -> Option<u64> {
    let rest = &command[command.find(flag)? + flag.len()..];
    let value = rest.split_whitespace().next()?;
    u64::from_str_radix(value.trim_start_matches("0x"), 16).ok()
}

fn line_address(line: &str) -> Option<u64> {
    let (address_part, _) = line.split_once(':')?;
    u64::from_str_radix(address_part.trim(), 16).ok()
}
