//! Safe copy and the cross-volume move primitive.
//! - Copies stream to a unique temp file in the destination directory
//!   (`create_new`, fsynced), then rename into place.
//! - Cross-volume moves verify the destination byte size before the source
//!   is deleted; on mismatch the source is left untouched.

use anyhow::{bail, Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use crate::errors::VERIFY_MISMATCH;

use super::atomic::rename_durable;
use super::unique_temp_path;

const BUF_SIZE: usize = 1024 * 1024;

/// Copy `src` into place at `dest` via a temp sibling. Returns bytes copied.
pub fn copy_to_temp_then_rename(src: &Path, dest: &Path) -> Result<u64> {
    let dest_dir = dest
        .parent()
        .with_context(|| format!("destination has no parent: {}", dest.display()))?;
    fs::create_dir_all(dest_dir)
        .with_context(|| format!("create destination directory {}", dest_dir.display()))?;

    let tmp = unique_temp_path(dest_dir);
    let bytes = match copy_streaming(src, &tmp) {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            return Err(e).with_context(|| {
                format!("copy '{}' -> '{}'", src.display(), tmp.display())
            });
        }
    };

    if let Err(e) = rename_durable(&tmp, dest) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(bytes)
}

/// Compare source and destination byte sizes.
pub fn verify_size(src: &Path, dest: &Path) -> Result<bool> {
    let s = fs::metadata(src).with_context(|| format!("stat {}", src.display()))?;
    let d = fs::metadata(dest).with_context(|| format!("stat {}", dest.display()))?;
    Ok(s.len() == d.len())
}

/// Move across volumes: copy, verify byte size, then delete the source.
/// On a verification mismatch the bad destination copy is removed, the
/// source is never deleted, and the mismatch surfaces as an error.
pub fn move_cross_volume(src: &Path, dest: &Path) -> Result<u64> {
    move_verified(src, dest, verify_size)
}

fn move_verified(
    src: &Path,
    dest: &Path,
    verify: impl Fn(&Path, &Path) -> Result<bool>,
) -> Result<u64> {
    let bytes = copy_to_temp_then_rename(src, dest)?;

    if !verify(src, dest)? {
        let _ = fs::remove_file(dest);
        bail!("{}", VERIFY_MISMATCH);
    }

    fs::remove_file(src).with_context(|| format!("remove source file {}", src.display()))?;
    Ok(bytes)
}

fn copy_streaming(src: &Path, dst: &Path) -> io::Result<u64> {
    let src_f = File::open(src)?;
    let dst_f = OpenOptions::new().write(true).create_new(true).open(dst)?;

    let mut reader = BufReader::with_capacity(BUF_SIZE, src_f);
    let mut writer = BufWriter::with_capacity(BUF_SIZE, dst_f);
    let bytes = io::copy(&mut reader, &mut writer)?;
    writer.into_inner()?.sync_all()?;
    Ok(bytes)
}
