//! Deterministic tar packaging of the pull workspace
//!
//! `docker load` accepts plain ustar input, but reproducibility is on us:
//! entries are walked depth-first in lexicographic order, owners are
//! cleared, mtimes truncated to whole seconds, and the mode field carries
//! the POSIX file-type bits alongside the permission bits.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

use tar::{Archive, Builder, EntryType, Header};

use crate::error::{PullError, Result};

// POSIX mode_t file-type field values
const MODE_DIR: u32 = 0o040000;
const MODE_FIFO: u32 = 0o010000;
const MODE_REG: u32 = 0o100000;
const MODE_LNK: u32 = 0o120000;
const MODE_BLK: u32 = 0o060000;
const MODE_CHR: u32 = 0o020000;
const MODE_SOCK: u32 = 0o140000;

/// Archive `src_dir`'s contents into the file at `dst`.
pub fn create_file(src_dir: &Path, dst: &Path) -> Result<()> {
    let file = File::create(dst).map_err(|e| PullError::io(dst, e))?;
    create(src_dir, file)
}

/// Archive `src_dir`'s contents (the directory itself is not an entry) into
/// `dst`, deterministically.
pub fn create<W: Write>(src_dir: &Path, dst: W) -> Result<()> {
    let mut builder = Builder::new(dst);
    append_dir(&mut builder, src_dir, src_dir)?;
    builder
        .into_inner()
        .map_err(|e| PullError::io(src_dir, e))?;

    Ok(())
}

fn append_dir<W: Write>(builder: &mut Builder<W>, root: &Path, dir: &Path) -> Result<()> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .map_err(|e| PullError::io(dir, e))?
        .collect::<io::Result<_>>()
        .map_err(|e| PullError::io(dir, e))?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let metadata = fs::symlink_metadata(&path).map_err(|e| PullError::io(&path, e))?;

        let relative = path
            .strip_prefix(root)
            .map_err(|_| PullError::Parse(format!("{} is outside {}", path.display(), root.display())))?;
        let mut name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if metadata.is_dir() {
            name.push('/');
        }

        let mut header = Header::new_ustar();
        header
            .set_path(&name)
            .map_err(|e| PullError::io(&path, e))?;
        header.set_uid(0);
        header.set_gid(0);
        header.set_mtime(mtime_secs(&metadata));
        header.set_mode(entry_mode(&metadata));
        header.set_entry_type(entry_type(&metadata.file_type()));

        if metadata.is_dir() {
            header.set_size(0);
            header.set_cksum();
            builder
                .append(&header, io::empty())
                .map_err(|e| PullError::io(&path, e))?;
            append_dir(builder, root, &path)?;
        } else if metadata.file_type().is_symlink() {
            let target = fs::read_link(&path).map_err(|e| PullError::io(&path, e))?;
            header.set_size(0);
            header
                .set_link_name(&target)
                .map_err(|e| PullError::io(&path, e))?;
            header.set_cksum();
            builder
                .append(&header, io::empty())
                .map_err(|e| PullError::io(&path, e))?;
        } else {
            header.set_size(metadata.len());
            header.set_cksum();
            let file = File::open(&path).map_err(|e| PullError::io(&path, e))?;
            builder
                .append(&header, file)
                .map_err(|e| PullError::io(&path, e))?;
        }
    }

    Ok(())
}

fn mtime_secs(metadata: &fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(unix)]
fn entry_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    (metadata.permissions().mode() & 0o7777) | file_type_bits(&metadata.file_type())
}

#[cfg(not(unix))]
fn entry_mode(metadata: &fs::Metadata) -> u32 {
    let perm = if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    };
    perm | file_type_bits(&metadata.file_type())
}

fn file_type_bits(file_type: &fs::FileType) -> u32 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        if file_type.is_fifo() {
            return MODE_FIFO;
        }
        if file_type.is_block_device() {
            return MODE_BLK;
        }
        if file_type.is_char_device() {
            return MODE_CHR;
        }
        if file_type.is_socket() {
            return MODE_SOCK;
        }
    }

    if file_type.is_dir() {
        MODE_DIR
    } else if file_type.is_symlink() {
        MODE_LNK
    } else {
        MODE_REG
    }
}

fn entry_type(file_type: &fs::FileType) -> EntryType {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        if file_type.is_fifo() {
            return EntryType::Fifo;
        }
        if file_type.is_block_device() {
            return EntryType::Block;
        }
        if file_type.is_char_device() {
            return EntryType::Char;
        }
    }

    if file_type.is_dir() {
        EntryType::Directory
    } else if file_type.is_symlink() {
        EntryType::Symlink
    } else {
        EntryType::Regular
    }
}

/// Unpack `src` into `dst`. Only directories and regular files are
/// supported; anything else aborts the extraction.
pub fn extract<R: Read>(dst: &Path, src: R) -> Result<()> {
    let mut archive = Archive::new(src);

    for entry in archive.entries().map_err(|e| PullError::io(dst, e))? {
        let mut entry = entry.map_err(|e| PullError::io(dst, e))?;
        let name = entry
            .path()
            .map_err(|e| PullError::io(dst, e))?
            .into_owned();
        let out_path = dst.join(&name);

        match entry.header().entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&out_path).map_err(|e| PullError::io(&out_path, e))?;
            }
            EntryType::Regular => {
                let mut file = File::create(&out_path).map_err(|e| PullError::io(&out_path, e))?;
                io::copy(&mut entry, &mut file).map_err(|e| PullError::io(&out_path, e))?;
            }
            other => {
                return Err(PullError::UnknownTarEntry {
                    typeflag: other.as_byte(),
                    name: name.to_string_lossy().into_owned(),
                });
            }
        }
    }

    Ok(())
}
