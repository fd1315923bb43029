use std::io;

/// The error type used in this crate.
///
/// Only structural corruption of the input file surfaces as an error.
/// Unknown record kinds, samples that cannot be attributed to a map, and
/// unusable `nm`/`objdump` output are skipped or degrade the report
/// instead of failing the import.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The mapped region was not big enough to decode the named structure.
    #[error("Read error: {0}")]
    Read(#[from] ReadError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Did not recognize magic value {0:?}")]
    UnrecognizedMagicValue([u8; 8]),

    #[error("Section at offset {offset:#x} with size {size:#x} lies outside the file")]
    SectionOutOfBounds { offset: u64, size: u64 },

    #[error("The specified size in a record header was smaller than the header itself")]
    InvalidRecordSize,

    #[error("A record of {0:#x} bytes would extend past the end of the data section")]
    RecordPastEndOfData(u64),

    #[error("Encountered a SAMPLE record but the file declares no event descriptors")]
    NoEventDescriptors,

    #[error("The sample layout is missing the required {0} field")]
    SampleLayoutMissing(&'static str),

    #[error("Event descriptors disagree on the sample layout ({0:#x} vs {1:#x})")]
    MixedSampleLayouts(u64, u64),
}

/// This error indicates that the data region was not large enough to
/// decode the respective item.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    #[error("Could not read FileHeader")]
    FileHeader,

    #[error("Could not read FileSection")]
    FileSection,

    #[error("Could not read PerfEventAttr")]
    PerfEventAttr,

    #[error("Could not read event description entry")]
    EventDesc,

    #[error("Could not read event id list")]
    EventIds,

    #[error("Could not read RecordHeader")]
    RecordHeader,

    #[error("Could not read Sample")]
    Sample,

    #[error("Could not read MmapEvent")]
    MmapEvent,

    #[error("Could not read trailing SampleId")]
    SampleId,
}
