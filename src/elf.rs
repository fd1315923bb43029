use std::fs::File;
use std::io::Read;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ET_DYN: u16 = 3;

/// Returns true if the ELF file at `path` is a shared object (ET_DYN).
///
/// ET_DYN objects are loaded at an arbitrary base, so sample pcs must be
/// rebased before symbol lookup; ET_EXEC objects are not relocated.
/// Missing or unreadable files return false, which leaves the map's
/// adjustment at zero. This keeps profiles usable when a binary named in
/// the recording is absent from the local filesystem.
pub fn is_shared_object(path: &str) -> bool {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(_) => return false,
    };
    // e_ident plus e_type.
    let mut header = [0u8; 18];
    if file.read_exact(&mut header).is_err() {
        return false;
    }
    if header[..4] != ELF_MAGIC {
        return false;
    }
    u16::from_le_bytes([header[16], header[17]]) == ET_DYN
}
