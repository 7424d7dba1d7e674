use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::core::error::MoveError;

/// Buffer size for the cross-device copy fallback (128KB)
const BUFFER_SIZE: usize = 128 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct MoveOptions {
    /// Copy then remove when a rename would cross filesystems.
    pub cross_device_copy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMethod {
    Renamed,
    Copied,
}

/// Relocates one file into the destination.
#[async_trait]
pub trait Mover: Send + Sync {
    async fn relocate(
        &self,
        source: &Path,
        dest: &Path,
        options: MoveOptions,
    ) -> Result<MoveMethod, MoveError>;
}

/// Moves files on the local filesystem.
pub struct FsMover;

#[async_trait]
impl Mover for FsMover {
    async fn relocate(
        &self,
        source: &Path,
        dest: &Path,
        options: MoveOptions,
    ) -> Result<MoveMethod, MoveError> {
        move_file(source, dest, options).await
    }
}

/// Relocate a single file. Never replaces an existing `dest`.
pub async fn move_file(
    source: &Path,
    dest: &Path,
    options: MoveOptions,
) -> Result<MoveMethod, MoveError> {
    match rename_no_replace(source, dest).await {
        Ok(()) => Ok(MoveMethod::Renamed),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(MoveError::DestinationExists),
        Err(e) if is_cross_device_error(&e) => {
            // The kernel reports EXDEV before it looks at `dest`.
            if tokio::fs::symlink_metadata(dest).await.is_ok() {
                return Err(MoveError::DestinationExists);
            }
            if !options.cross_device_copy {
                return Err(MoveError::CrossesDevices);
            }

            debug!(
                source = %source.display(),
                dest = %dest.display(),
                "Rename crosses filesystems, copying instead"
            );

            let source = source.to_path_buf();
            let dest = dest.to_path_buf();
            tokio::task::spawn_blocking(move || copy_then_remove(&source, &dest))
                .await
                .map_err(|e| MoveError::Io {
                    context: "copy task failed",
                    source: io::Error::other(e),
                })??;

            Ok(MoveMethod::Copied)
        }
        Err(e) => Err(MoveError::Io {
            context: "rename failed",
            source: e,
        }),
    }
}

/// `rename` that fails with `AlreadyExists` instead of replacing `dest`.
///
/// Filesystems without `RENAME_NOREPLACE` fall back to check-then-rename, which
/// is not atomic.
async fn rename_no_replace(source: &Path, dest: &Path) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        let (from, to) = (source.to_path_buf(), dest.to_path_buf());
        let result = tokio::task::spawn_blocking(move || renameat2_no_replace(&from, &to))
            .await
            .map_err(io::Error::other)?;

        match result {
            Err(e) if matches!(e.raw_os_error(), Some(libc::EINVAL) | Some(libc::ENOSYS)) => {
                debug!(dest = %dest.display(), "RENAME_NOREPLACE unsupported, using plain rename");
            }
            other => return other,
        }
    }

    if tokio::fs::symlink_metadata(dest).await.is_ok() {
        return Err(io::ErrorKind::AlreadyExists.into());
    }
    tokio::fs::rename(source, dest).await
}

#[cfg(target_os = "linux")]
fn renameat2_no_replace(source: &Path, dest: &Path) -> io::Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let from = CString::new(source.as_os_str().as_bytes())?;
    let to = CString::new(dest.as_os_str().as_bytes())?;

    // SAFETY: both pointers come from live CStrings and AT_FDCWD resolves them like rename(2).
    let rc = unsafe {
        libc::renameat2(
            libc::AT_FDCWD,
            from.as_ptr(),
            libc::AT_FDCWD,
            to.as_ptr(),
            libc::RENAME_NOREPLACE,
        )
    };

    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

fn copy_then_remove(source: &Path, dest: &Path) -> Result<(), MoveError> {
    copy_single_file(source, dest)?;
    fs::remove_file(source).map_err(MoveError::io("failed to remove source after copy"))
}

/// Copy a single file with metadata preservation
fn copy_single_file(source: &Path, dest: &Path) -> Result<u64, MoveError> {
    let source_metadata =
        fs::metadata(source).map_err(MoveError::io("failed to read source metadata"))?;

    let source_file = File::open(source).map_err(MoveError::io("failed to open source file"))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, source_file);

    let dest_file = File::options()
        .write(true)
        .create_new(true)
        .open(dest)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => MoveError::DestinationExists,
            _ => MoveError::io("failed to create destination file")(e),
        })?;

    match write_contents(&mut reader, dest_file) {
        Ok(bytes_written) => {
            preserve_metadata(&source_metadata, dest);
            Ok(bytes_written)
        }
        Err(e) => {
            // Only the file created above is removed, never a pre-existing one.
            let _ = fs::remove_file(dest);
            Err(e)
        }
    }
}

fn write_contents(reader: &mut impl Read, dest_file: File) -> Result<u64, MoveError> {
    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, dest_file);

    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut bytes_written: u64 = 0;

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(MoveError::io("failed to read from source"))?;

        if bytes_read == 0 {
            break;
        }

        writer
            .write_all(&buffer[..bytes_read])
            .map_err(MoveError::io("failed to write to destination"))?;

        bytes_written += bytes_read as u64;
    }

    let inner = writer.into_inner().map_err(|e| MoveError::Io {
        context: "failed to flush destination file",
        source: e.into_error(),
    })?;
    inner
        .sync_all()
        .map_err(MoveError::io("failed to sync destination file"))?;

    Ok(bytes_written)
}

fn preserve_metadata(source_metadata: &fs::Metadata, dest: &Path) {
    if let Err(e) = fs::set_permissions(dest, source_metadata.permissions()) {
        debug!(dest = %dest.display(), error = %e, "Failed to set file permissions");
    }

    // Age filtering depends on mtime, so it must survive the copy.
    let atime = filetime::FileTime::from_last_access_time(source_metadata);
    let mtime = filetime::FileTime::from_last_modification_time(source_metadata);
    if let Err(e) = filetime::set_file_times(dest, atime, mtime) {
        debug!(dest = %dest.display(), error = %e, "Failed to preserve file timestamps");
    }
}

fn is_cross_device_error(error: &io::Error) -> bool {
    error.raw_os_error() == Some(libc::EXDEV)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    const OPTIONS: MoveOptions = MoveOptions {
        cross_device_copy: true,
    };

    #[test]
    fn cross_device_detection_uses_exdev() {
        assert!(is_cross_device_error(&io::Error::from_raw_os_error(
            libc::EXDEV
        )));
        assert!(!is_cross_device_error(&io::Error::from_raw_os_error(
            libc::EACCES
        )));
    }

    #[tokio::test]
    async fn rename_moves_file_within_filesystem() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("a.bin");
        let dest = temp.path().join("b.bin");
        fs::write(&source, b"payload").unwrap();

        let method = move_file(&source, &dest, OPTIONS).await.unwrap();

        assert_eq!(method, MoveMethod::Renamed);
        assert!(!source.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn rename_never_replaces_existing_destination() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("late.bin");
        let dest = temp.path().join("taken.bin");
        fs::write(&source, b"incoming").unwrap();
        fs::write(&dest, b"already here").unwrap();

        let result = move_file(&source, &dest, OPTIONS).await;

        assert!(matches!(result, Err(MoveError::DestinationExists)));
        assert_eq!(fs::read(&source).unwrap(), b"incoming");
        assert_eq!(fs::read(&dest).unwrap(), b"already here");
    }

    #[tokio::test]
    async fn missing_source_is_an_io_error() {
        let temp = tempdir().unwrap();

        let result = move_file(
            &temp.path().join("gone.txt"),
            &temp.path().join("dest.txt"),
            OPTIONS,
        )
        .await;

        assert!(matches!(result, Err(MoveError::Io { .. })));
    }

    #[test]
    fn copy_then_remove_preserves_content_and_mtime() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("old.log");
        let dest = temp.path().join("moved.log");
        fs::write(&source, b"twenty hours old").unwrap();

        let mtime = SystemTime::now() - Duration::from_secs(20 * 3600);
        filetime::set_file_mtime(&source, filetime::FileTime::from_system_time(mtime)).unwrap();

        copy_then_remove(&source, &dest).unwrap();

        assert!(!source.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"twenty hours old");
        let copied = filetime::FileTime::from_last_modification_time(&fs::metadata(&dest).unwrap());
        assert_eq!(copied.unix_seconds(), filetime::FileTime::from_system_time(mtime).unix_seconds());
    }

    #[test]
    fn copy_refuses_to_overwrite_and_keeps_existing_file() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("report.txt");
        let dest = temp.path().join("existing.txt");
        fs::write(&source, b"new").unwrap();
        fs::write(&dest, b"old").unwrap();

        let result = copy_then_remove(&source, &dest);

        assert!(matches!(result, Err(MoveError::DestinationExists)));
        assert_eq!(fs::read(&source).unwrap(), b"new");
        assert_eq!(fs::read(&dest).unwrap(), b"old");
    }
}
