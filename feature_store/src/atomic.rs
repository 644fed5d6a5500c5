//! Write-then-rename file replacement
//!
//! Every file the stores persist goes through [`write_atomic`]: the content is
//! written to a sibling `.tmp` file, flushed to disk and renamed over the
//! target. A reader sees either the previous file or the complete new one.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Replace `path` with whatever `write` produces, creating parent directories.
///
/// If `write` fails the temporary file is removed and the original is untouched.
pub fn write_atomic<P, E, F>(path: P, write: F) -> Result<(), E>
where
    P: AsRef<Path>,
    E: From<io::Error>,
    F: FnOnce(&mut File) -> Result<(), E>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = tmp_path(path);
    if let Err(err) = write_and_sync(&tmp, write) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Replace `path` with `bytes`
pub fn write_bytes_atomic<P: AsRef<Path>>(path: P, bytes: &[u8]) -> io::Result<()> {
    write_atomic(path, |file: &mut File| file.write_all(bytes))
}

/// Sibling path used while a replacement is being written
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("unnamed"));
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_and_sync<E, F>(tmp: &Path, write: F) -> Result<(), E>
where
    E: From<io::Error>,
    F: FnOnce(&mut File) -> Result<(), E>,
{
    let mut file = File::create(tmp)?;
    write(&mut file)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_replaces_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("log.csv");

        write_bytes_atomic(&path, b"first").unwrap();
        write_bytes_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn test_failed_write_keeps_original() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.csv");
        write_bytes_atomic(&path, b"original").unwrap();

        let result: io::Result<()> = write_atomic(&path, |file: &mut File| {
            file.write_all(b"partial")?;
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        });

        assert!(result.is_err());
        assert_eq!(fs::read(&path).unwrap(), b"original");
        assert!(!tmp_path(&path).exists());
    }
}
