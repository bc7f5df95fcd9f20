//! Binary containers: bincode payloads, optionally inside a zstd frame.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::CleanError;

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];
const ZSTD_LEVEL: i32 = 3;

fn write_to<W: Write, T: Serialize>(
    writer: W,
    value: &T,
    compress: bool,
    path: &Path,
) -> Result<W, CleanError> {
    if compress {
        let mut zw = zstd::Encoder::new(writer, ZSTD_LEVEL).map_err(|e| CleanError::io(path, e))?;
        bincode::serialize_into(&mut zw, value).map_err(|e| CleanError::codec(path, e))?;
        zw.finish().map_err(|e| CleanError::io(path, e))
    } else {
        let mut w = writer;
        bincode::serialize_into(&mut w, value).map_err(|e| CleanError::codec(path, e))?;
        Ok(w)
    }
}

/// Write `value` to `path`, replacing whatever is there.
pub fn save_bincode<T: Serialize>(path: &Path, value: &T, compress: bool) -> Result<(), CleanError> {
    let f = File::create(path).map_err(|e| CleanError::io(path, e))?;
    let mut bw = write_to(BufWriter::new(f), value, compress, path)?;
    bw.flush().map_err(|e| CleanError::io(path, e))
}

/// Write `value` so that `path` either holds the complete container or does not change.
///
/// The payload goes to a temporary file in the same directory, is synced, and is
/// then persisted over `path`. The temporary file is removed on any failure.
pub fn save_atomic<T: Serialize>(path: &Path, value: &T, compress: bool) -> Result<(), CleanError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let tmp = NamedTempFile::new_in(parent).map_err(|e| CleanError::io(parent, e))?;
    let tmp = write_to(BufWriter::new(tmp), value, compress, path)?
        .into_inner()
        .map_err(|e| CleanError::io(path, e.into_error()))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| CleanError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| CleanError::io(path, e.error))?;
    Ok(())
}

/// Read a container written by [`save_bincode`] or [`save_atomic`], compressed or not.
pub fn load_bincode<T: DeserializeOwned>(path: &Path) -> Result<T, CleanError> {
    let mut f = File::open(path).map_err(|e| CleanError::io(path, e))?;

    let mut magic = [0u8; 4];
    let compressed = match f.read_exact(&mut magic) {
        Ok(()) => magic == ZSTD_MAGIC,
        Err(_) => false,
    };

    let f = File::open(path).map_err(|e| CleanError::io(path, e))?;
    if compressed {
        let zr = zstd::Decoder::new(f).map_err(|e| CleanError::io(path, e))?;
        bincode::deserialize_from(zr).map_err(|e| CleanError::codec(path, e))
    } else {
        bincode::deserialize_from(BufReader::new(f)).map_err(|e| CleanError::codec(path, e))
    }
}
