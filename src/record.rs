use bitflags::bitflags;

use crate::cursor::ByteCursor;
use crate::error::{Error, ReadError};

pub const PERF_RECORD_MMAP: u32 = 1;
pub const PERF_RECORD_SAMPLE: u32 = 9;
pub const PERF_RECORD_MMAP2: u32 = 10;

pub const PROT_EXEC: u32 = 4;

bitflags! {
    /// `sample_type` bits: which optional fields are serialized in each
    /// SAMPLE record, in the fixed order `parse` reads them below.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SampleFormat: u64 {
        const IP = 1 << 0;
        const TID = 1 << 1;
        const TIME = 1 << 2;
        const ADDR = 1 << 3;
        const ID = 1 << 6;
        const CPU = 1 << 7;
        const PERIOD = 1 << 8;
        const STREAM_ID = 1 << 9;
        const IDENTIFIER = 1 << 16;
    }
}

/// `perf_event_header`: every record in the data section starts with one.
#[derive(Debug, Clone, Copy)]
pub struct RecordHeader {
    pub type_: u32,
    #[allow(dead_code)]
    pub misc: u16,
    pub size: u16,
}

impl RecordHeader {
    pub const STRUCT_SIZE: usize = 4 + 2 + 2;

    pub fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self, ReadError> {
        let type_ = cursor.take_u32(ReadError::RecordHeader)?;
        let misc = cursor.take_u16(ReadError::RecordHeader)?;
        let size = cursor.take_u16(ReadError::RecordHeader)?;
        Ok(Self { type_, misc, size })
    }
}

/// `perf_sample_id`: trailer appended to non-SAMPLE records when
/// `sample_id_all` is in effect. Only `time` is consumed, to key the map
/// registry.
#[derive(Debug, Clone, Copy)]
pub struct SampleId {
    #[allow(dead_code)]
    pub pid: u32,
    #[allow(dead_code)]
    pub tid: u32,
    pub time: u64,
    #[allow(dead_code)]
    pub id: u64,
}

impl SampleId {
    pub const STRUCT_SIZE: usize = 4 + 4 + 8 + 8;

    /// Read the trailer from the last 24 bytes of a record body.
    pub fn parse_trailing(body: &[u8]) -> Result<Self, ReadError> {
        let offset = body
            .len()
            .checked_sub(Self::STRUCT_SIZE)
            .ok_or(ReadError::SampleId)?;
        let mut cursor = ByteCursor::new(&body[offset..]);
        let pid = cursor.take_u32(ReadError::SampleId)?;
        let tid = cursor.take_u32(ReadError::SampleId)?;
        let time = cursor.take_u64(ReadError::SampleId)?;
        let id = cursor.take_u64(ReadError::SampleId)?;
        Ok(Self { pid, tid, time, id })
    }
}

/// A decoded MMAP or MMAP2 record body: a process mapped an object file
/// into `[start, start + len)`.
#[derive(Debug, Clone)]
pub struct MmapEvent {
    #[allow(dead_code)]
    pub pid: u32,
    #[allow(dead_code)]
    pub tid: u32,
    pub start: u64,
    pub len: u64,
    pub pgoff: u64,
    /// Page protection; only present in MMAP2 records.
    pub prot: Option<u32>,
    pub filename: String,
    /// Timestamp from the trailing `SampleId`.
    pub time: u64,
}

impl MmapEvent {
    pub fn parse(body: &[u8], is_mmap2: bool) -> Result<Self, ReadError> {
        let mut cursor = ByteCursor::new(body);
        let pid = cursor.take_u32(ReadError::MmapEvent)?;
        let tid = cursor.take_u32(ReadError::MmapEvent)?;
        let start = cursor.take_u64(ReadError::MmapEvent)?;
        let len = cursor.take_u64(ReadError::MmapEvent)?;
        let pgoff = cursor.take_u64(ReadError::MmapEvent)?;
        let prot = if is_mmap2 {
            cursor.skip(4 + 4, ReadError::MmapEvent)?; // maj, min
            cursor.skip(8 + 8, ReadError::MmapEvent)?; // ino, ino_generation
            let prot = cursor.take_u32(ReadError::MmapEvent)?;
            cursor.take_u32(ReadError::MmapEvent)?; // flags
            Some(prot)
        } else {
            None
        };

        // Everything between the fixed fields and the trailer is the
        // NUL-padded filename.
        let filename_len = cursor
            .remaining()
            .checked_sub(SampleId::STRUCT_SIZE)
            .ok_or(ReadError::MmapEvent)?;
        let filename_bytes = cursor.take_bytes(filename_len, ReadError::MmapEvent)?;
        let nul = memchr::memchr(0, filename_bytes).unwrap_or(filename_bytes.len());
        let filename = String::from_utf8_lossy(&filename_bytes[..nul]).into_owned();

        let trailer = SampleId::parse_trailing(body)?;
        Ok(Self {
            pid,
            tid,
            start,
            len,
            pgoff,
            prot,
            filename,
            time: trailer.time,
        })
    }
}

/// A decoded SAMPLE record. Only `id`, `ip`, `time` and `period` feed the
/// aggregation; the rest is carried for completeness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sample {
    pub id: u64,
    pub ip: u64,
    pub pid: u32,
    pub tid: u32,
    pub time: u64,
    pub period: u64,
}

impl Sample {
    /// Parse the variable-layout sample body. Fields appear in a fixed
    /// canonical order, each present only if its bit is set in `layout`.
    /// `IP` and `PERIOD` are required; when both `IDENTIFIER` and `ID`
    /// are present the `ID` value wins.
    pub fn parse(body: &[u8], layout: SampleFormat) -> Result<Self, Error> {
        if !layout.contains(SampleFormat::IP) {
            return Err(Error::SampleLayoutMissing("IP"));
        }
        if !layout.contains(SampleFormat::PERIOD) {
            return Err(Error::SampleLayoutMissing("PERIOD"));
        }

        let mut cursor = ByteCursor::new(body);
        let mut sample = Sample::default();
        if layout.contains(SampleFormat::IDENTIFIER) {
            sample.id = cursor.take_u64(ReadError::Sample)?;
        }
        sample.ip = cursor.take_u64(ReadError::Sample)?;
        if layout.contains(SampleFormat::TID) {
            sample.pid = cursor.take_u32(ReadError::Sample)?;
            sample.tid = cursor.take_u32(ReadError::Sample)?;
        }
        if layout.contains(SampleFormat::TIME) {
            sample.time = cursor.take_u64(ReadError::Sample)?;
        }
        if layout.contains(SampleFormat::ADDR) {
            cursor.take_u64(ReadError::Sample)?;
        }
        if layout.contains(SampleFormat::ID) {
            sample.id = cursor.take_u64(ReadError::Sample)?;
        }
        if layout.contains(SampleFormat::STREAM_ID) {
            cursor.take_u64(ReadError::Sample)?;
        }
        if layout.contains(SampleFormat::CPU) {
            cursor.take_u64(ReadError::Sample)?;
        }
        sample.period = cursor.take_u64(ReadError::Sample)?;
        Ok(sample)
    }
}
