use crate::cursor::ByteCursor;
use crate::error::{Error, ReadError};
use crate::features::FeatureSet;
use crate::section::FileSection;

const MAGIC_SIZE: usize = 8;

/// `perf_header`
///
/// The magic number identifies the perf file and the version. Current perf
/// versions use PERFILE2. The header carries pointers to the attribute
/// table, the record data stream, and the legacy event_types section, plus
/// the feature flag bits describing the sections stored after the data.
#[derive(Debug, Clone, Copy)]
pub struct FileHeader {
    /// size of the header
    #[allow(dead_code)]
    pub header_size: u64,
    /// size of an attribute entry in the attribute table
    pub attr_size: u64,
    pub attr_section: FileSection,
    pub data_section: FileSection,
    pub event_types_section: FileSection,
    /// Feature flags
    pub features: FeatureSet,
}

impl FileHeader {
    pub fn parse(file_data: &[u8]) -> Result<Self, Error> {
        let mut cursor = ByteCursor::new(file_data);
        let magic: [u8; MAGIC_SIZE] = cursor
            .take_bytes(MAGIC_SIZE, ReadError::FileHeader)?
            .try_into()
            .unwrap();
        if &magic != b"PERFILE2" {
            return Err(Error::UnrecognizedMagicValue(magic));
        }

        let header_size = cursor.take_u64(ReadError::FileHeader)?;
        let attr_size = cursor.take_u64(ReadError::FileHeader)?;
        let attr_section = FileSection::parse(&mut cursor)?;
        let data_section = FileSection::parse(&mut cursor)?;
        let event_types_section = FileSection::parse(&mut cursor)?;
        let features = FeatureSet([
            cursor.take_u64(ReadError::FileHeader)?,
            cursor.take_u64(ReadError::FileHeader)?,
            cursor.take_u64(ReadError::FileHeader)?,
            cursor.take_u64(ReadError::FileHeader)?,
        ]);

        let header = Self {
            header_size,
            attr_size,
            attr_section,
            data_section,
            event_types_section,
            features,
        };
        header.check_section(file_data.len() as u64, &header.attr_section)?;
        header.check_section(file_data.len() as u64, &header.data_section)?;
        Ok(header)
    }

    fn check_section(&self, file_len: u64, section: &FileSection) -> Result<(), Error> {
        match section.end() {
            Some(end) if end <= file_len => Ok(()),
            _ => Err(Error::SectionOutOfBounds {
                offset: section.offset,
                size: section.size,
            }),
        }
    }

    /// The byte region holding one `FileSection` per set feature bit,
    /// stored just after the data section.
    pub fn feature_section_table_offset(&self) -> Option<u64> {
        self.data_section.end()
    }
}
