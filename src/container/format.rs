use std::fmt;

use crate::error::{StorageError, StorageResult};

/// On-disk layout of a container, chosen by file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    /// Single random-access HDF5 file (`.h5ad`).
    H5ad,
    /// Hierarchical chunked store (`.zarr`, `.zrad`).
    Zarr,
}

impl ContainerFormat {
    /// Dispatch on `suffix` (including the leading dot). `reference` is only
    /// used for the error message.
    pub fn from_suffix(reference: &str, suffix: &str) -> StorageResult<Self> {
        match suffix.to_ascii_lowercase().as_str() {
            ".h5ad" => Ok(ContainerFormat::H5ad),
            ".zarr" | ".zrad" => Ok(ContainerFormat::Zarr),
            _ => Err(StorageError::UnsupportedFormat {
                reference: reference.to_string(),
                suffix: suffix.to_string(),
            }),
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerFormat::H5ad => f.write_str("h5ad"),
            ContainerFormat::Zarr => f.write_str("zarr"),
        }
    }
}

/// HDF5 superblock signature. It may sit at offset 0 or at any power of two
/// from 512 onwards when the file carries a user block.
const HDF5_SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1a, b'\n'];
const HDF5_SIGNATURE_OFFSETS: [u64; 6] = [0, 512, 1024, 2048, 4096, 8192];

/// Check `stream` for an HDF5 superblock signature.
pub(crate) fn has_hdf5_signature<R: std::io::Read + std::io::Seek + ?Sized>(
    stream: &mut R,
) -> std::io::Result<bool> {
    use std::io::SeekFrom;

    let mut buf = [0u8; 8];
    for offset in HDF5_SIGNATURE_OFFSETS {
        stream.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            let n = stream.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled < buf.len() {
            return Ok(false);
        }
        if buf == HDF5_SIGNATURE {
            return Ok(true);
        }
    }
    Ok(false)
}
