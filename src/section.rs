use crate::cursor::ByteCursor;
use crate::error::ReadError;

/// `perf_file_section`
///
/// A FileSection contains a pointer to another region of the perf file.
/// The header carries three of these (attributes, data, event types), and
/// the feature area after the data section is a table of them.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSection {
    /// offset from start of file
    pub offset: u64,
    /// size of the section
    pub size: u64,
}

impl FileSection {
    pub fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self, ReadError> {
        let offset = cursor.take_u64(ReadError::FileSection)?;
        let size = cursor.take_u64(ReadError::FileSection)?;
        Ok(Self { offset, size })
    }

    /// The byte range this section covers, or `None` if it overflows u64.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }
}
