//! Crash-safe file materialization.
//!
//! The payload lands in a temporary file inside the destination's own
//! directory (guaranteeing the same filesystem for the rename), then is
//! renamed onto the destination. An observer of the destination path only
//! ever sees the prior file or the complete new file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{DistributorError, Result};

/// Atomically (as atomic as rename allows) write a payload to disk.
pub fn atomic_write_file(destination: &Path, data: &[u8], mode: u32) -> Result<()> {
    let file_name = destination
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| DistributorError::validation("destination has no file name"))?;
    let directory = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let temp_path = directory.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));
    let result = write_then_rename(&temp_path, destination, data, mode);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn write_then_rename(temp_path: &Path, destination: &Path, data: &[u8], mode: u32) -> Result<()> {
    fs::write(temp_path, data)?;
    set_mode(temp_path, mode)?;
    rename_with_fallback(temp_path, destination)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Rename a file or directory, falling back to copy-then-delete when the
/// rename fails because source and destination sit on different devices.
/// Any other rename failure is surfaced unmodified.
pub fn rename_with_fallback(source: &Path, destination: &Path) -> Result<()> {
    fs::metadata(source)?;
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(err) if is_cross_device(&err) => rename_by_copy(source, destination),
        Err(err) => Err(err.into()),
    }
}

#[cfg(unix)]
fn is_cross_device(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EXDEV)
}

#[cfg(not(unix))]
fn is_cross_device(_err: &io::Error) -> bool {
    false
}

/// Emulate a rename by recursively copying to the destination and then
/// removing the source, preserving modes.
fn rename_by_copy(source: &Path, destination: &Path) -> Result<()> {
    let metadata = fs::metadata(source)?;
    if metadata.is_dir() {
        copy_dir(source, destination)?;
        fs::remove_dir_all(source)?;
    } else {
        fs::copy(source, destination)?;
        fs::remove_file(source)?;
    }
    Ok(())
}

/// Recursively copy a directory tree. The destination must not exist.
fn copy_dir(source: &Path, destination: &Path) -> Result<()> {
    if destination.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("destination already exists: {}", destination.display()),
        )
        .into());
    }
    fs::create_dir_all(destination)?;
    #[cfg(unix)]
    set_mode(destination, {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(source)?.permissions().mode()
    })?;

    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let target = destination.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
