//! Gzip decompression for layer blobs

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::{PullError, Result};
use crate::progress::ProgressSink;

const COPY_BUFFER_SIZE: usize = 131072;

/// Decompress `src` into `dst`, feeding every buffer to all `observers`.
/// Returns the total number of decompressed bytes.
pub fn decompress(src: &Path, dst: &Path, observers: &[&dyn ProgressSink]) -> Result<u64> {
    let file = File::open(src).map_err(|e| PullError::io(src, e))?;
    let mut decoder = GzDecoder::new(file);
    let mut out = File::create(dst).map_err(|e| PullError::io(dst, e))?;

    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut written = 0u64;
    loop {
        let n = decoder.read(&mut buf).map_err(|e| PullError::io(src, e))?;
        if n == 0 {
            break;
        }

        out.write_all(&buf[..n]).map_err(|e| PullError::io(dst, e))?;
        for observer in observers {
            observer.record(&buf[..n]);
        }
        written += n as u64;
    }

    Ok(written)
}

/// Decompressed size from the gzip ISIZE trailer (last 4 bytes,
/// little-endian). Only the size modulo 2^32, so this seeds progress totals
/// and nothing else.
pub fn decompressed_size(src: &Path) -> Result<u32> {
    let mut file = File::open(src).map_err(|e| PullError::io(src, e))?;
    file.seek(SeekFrom::End(-4))
        .map_err(|e| PullError::io(src, e))?;

    let mut trailer = [0u8; 4];
    file.read_exact(&mut trailer)
        .map_err(|e| PullError::io(src, e))?;

    Ok(u32::from_le_bytes(trailer))
}
