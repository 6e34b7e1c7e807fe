//! Structural sanity check for a downloaded binary
//!
//! This is not an integrity check: it only rejects truncated downloads and files
//! that are clearly not a native library for the expected platform.

use crate::config::BinaryFormat;
use crate::error::InstallError;
use std::io::Read;
use std::path::Path;

const MACHO_MAGICS: [[u8; 4]; 5] = [
    [0xfe, 0xed, 0xfa, 0xce],
    [0xce, 0xfa, 0xed, 0xfe],
    [0xfe, 0xed, 0xfa, 0xcf],
    [0xcf, 0xfa, 0xed, 0xfe],
    [0xca, 0xfe, 0xba, 0xbe],
];

/// Whether `header` starts with the magic bytes of `format`
pub fn has_magic(header: &[u8], format: BinaryFormat) -> bool {
    match format {
        BinaryFormat::Pe => header.starts_with(b"MZ"),
        BinaryFormat::Elf => header.starts_with(b"\x7fELF"),
        BinaryFormat::MachO => MACHO_MAGICS.iter().any(|m| header.starts_with(m)),
    }
}

/// Reject files smaller than `min_size` or without the expected magic bytes
pub fn check_binary(
    path: &Path,
    min_size: u64,
    format: BinaryFormat,
) -> Result<(), InstallError> {
    let invalid = |reason: String| InstallError::Validation { reason };

    let mut file =
        std::fs::File::open(path).map_err(|e| invalid(format!("cannot open: {}", e)))?;
    let size = file
        .metadata()
        .map_err(|e| invalid(format!("cannot stat: {}", e)))?
        .len();
    if size < min_size {
        return Err(invalid(format!(
            "{} bytes is below the {} byte minimum",
            size, min_size
        )));
    }

    let mut header = [0u8; 4];
    let read = file
        .read(&mut header)
        .map_err(|e| invalid(format!("cannot read header: {}", e)))?;
    if !has_magic(&header[..read], format) {
        return Err(invalid(format!(
            "missing {:?} header (starts with {:02x?})",
            format,
            &header[..read]
        )));
    }
    Ok(())
}
