//! # Rollover Archiving
//!
//! Compresses a rotated log file into a single-member zip next to it, checks
//! the archive by reading it back, and only then removes the original.
//!
//! A rotated `app_2025-01-06.log` becomes `app_2025-01-06.log.zip` holding one
//! member named `app_2025-01-06.log`.

use super::errors::LogError;
use super::sink::RolloverHook;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Rollover hook that deflates rotated files at maximum compression
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipCompressor;

impl ZipCompressor {
    pub fn new() -> Self {
        Self
    }

    /// `<path>.zip`
    pub fn archive_path(path: &Path) -> PathBuf {
        let mut name = OsString::from(path.as_os_str());
        name.push(".zip");
        PathBuf::from(name)
    }
}

impl RolloverHook for ZipCompressor {
    fn on_rollover_complete(&self, rotated: &Path) -> Result<PathBuf, LogError> {
        compress_file(rotated)
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                       Public Functions                            ****//
///////////////////////////////////////////////////////////////////////////////

/// Zip `source` into `<source>.zip`, verify it, then delete `source`.
///
/// On any failure `source` stays where it is.
pub fn compress_file(source: &Path) -> Result<PathBuf, LogError> {
    let archive = ZipCompressor::archive_path(source);
    let member = member_name(source)?;

    if let Err(e) = write_archive(source, &archive, &member) {
        discard_partial(&archive);
        return Err(e);
    }

    verify_archive(&archive, source)?;

    remove_rotated(source, &archive)?;
    debug!(archive = %archive.display(), "Compressed rotated log file");
    Ok(archive)
}

/// Read `archive` back in full and compare it with `source`.
///
/// The archive must hold exactly one member, named after `source`, with the
/// same length, and its CRC must check out.
pub fn verify_archive(archive: &Path, source: &Path) -> Result<(), LogError> {
    let corrupt = |reason: String| LogError::CorruptArchive {
        archive: archive.to_path_buf(),
        reason,
    };

    let expected_name = member_name(source)?;
    let expected_len = fs::metadata(source)
        .map_err(|e| LogError::io(source, e))?
        .len();

    let file = File::open(archive).map_err(|e| LogError::io(archive, e))?;
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(|e| corrupt(e.to_string()))?;

    if zip.len() != 1 {
        return Err(corrupt(format!("expected 1 member, found {}", zip.len())));
    }

    let mut entry = zip.by_index(0).map_err(|e| corrupt(e.to_string()))?;
    if entry.name() != expected_name {
        return Err(corrupt(format!(
            "member is named '{}', expected '{}'",
            entry.name(),
            expected_name
        )));
    }
    if entry.size() != expected_len {
        return Err(corrupt(format!(
            "member holds {} bytes, source has {}",
            entry.size(),
            expected_len
        )));
    }

    // Reading to the end checks the CRC
    io::copy(&mut entry, &mut io::sink()).map_err(|e| corrupt(e.to_string()))?;
    Ok(())
}

///////////////////////////////////////////////////////////////////////////////
//****                       Private Functions                           ****//
///////////////////////////////////////////////////////////////////////////////

fn member_name(source: &Path) -> Result<String, LogError> {
    source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            LogError::Configuration(format!("'{}' has no file name", source.display()))
        })
}

fn write_archive(source: &Path, archive: &Path, member: &str) -> Result<(), LogError> {
    let zip_error = |e: zip::result::ZipError| LogError::io(archive, io::Error::other(e));

    let mut input = File::open(source).map_err(|e| LogError::io(source, e))?;
    let source_len = input
        .metadata()
        .map_err(|e| LogError::io(source, e))?
        .len();

    let output = File::create(archive).map_err(|e| LogError::io(archive, e))?;
    let mut writer = ZipWriter::new(output);

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(flate2::Compression::best().level() as i64))
        .large_file(source_len >= u32::MAX as u64);

    writer.start_file(member, options).map_err(zip_error)?;
    io::copy(&mut input, &mut writer).map_err(|e| LogError::io(archive, e))?;
    let output = writer.finish().map_err(zip_error)?;
    output.sync_all().map_err(|e| LogError::io(archive, e))?;
    Ok(())
}

/// Delete the rotated file once its archive has been verified
fn remove_rotated(rotated: &Path, archive: &Path) -> Result<(), LogError> {
    fs::remove_file(rotated).map_err(|source| LogError::ArchiveCleanup {
        archive: archive.to_path_buf(),
        rotated: rotated.to_path_buf(),
        source,
    })
}

fn discard_partial(archive: &Path) {
    if archive.exists() {
        if let Err(e) = fs::remove_file(archive) {
            warn!(archive = %archive.display(), "Could not remove partial archive: {}", e);
        }
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn rotated_file(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("app_2025-01-06.log");
        fs::write(&path, content).unwrap();
        path
    }

    /// Flip one bit of the first central directory entry's CRC
    fn corrupt_central_crc(archive: &Path) {
        let mut bytes = fs::read(archive).unwrap();
        let eocd = bytes.len() - 22;
        assert_eq!(&bytes[eocd..eocd + 4], &[0x50, 0x4b, 0x05, 0x06]);
        let cd_offset = u32::from_le_bytes([
            bytes[eocd + 16],
            bytes[eocd + 17],
            bytes[eocd + 18],
            bytes[eocd + 19],
        ]) as usize;
        bytes[cd_offset + 16] ^= 0x01;
        fs::write(archive, bytes).unwrap();
    }

    #[test]
    fn test_compress_replaces_source_with_archive() {
        let dir = TempDir::new().unwrap();
        let content = "line one\nline two\n".repeat(200);
        let source = rotated_file(&dir, &content);

        let archive = compress_file(&source).unwrap();

        assert_eq!(archive, dir.path().join("app_2025-01-06.log.zip"));
        assert!(!source.exists());

        let mut zip = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let mut entry = zip.by_index(0).unwrap();
        assert_eq!(entry.name(), "app_2025-01-06.log");
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
        let mut restored = String::new();
        entry.read_to_string(&mut restored).unwrap();
        assert_eq!(restored, content);
    }

    #[test]
    fn test_hook_returns_archive_path() {
        let dir = TempDir::new().unwrap();
        let source = rotated_file(&dir, "payload\n");

        let archived = ZipCompressor::new().on_rollover_complete(&source).unwrap();

        assert_eq!(archived, ZipCompressor::archive_path(&source));
        assert!(archived.exists());
    }

    #[test]
    fn test_verify_accepts_fresh_archive() {
        let dir = TempDir::new().unwrap();
        let source = rotated_file(&dir, "abc\n");
        let archive = ZipCompressor::archive_path(&source);
        write_archive(&source, &archive, "app_2025-01-06.log").unwrap();

        assert!(verify_archive(&archive, &source).is_ok());
    }

    #[test]
    fn test_verify_detects_bad_checksum() {
        let dir = TempDir::new().unwrap();
        let source = rotated_file(&dir, "checksum me\n");
        let archive = ZipCompressor::archive_path(&source);
        write_archive(&source, &archive, "app_2025-01-06.log").unwrap();

        corrupt_central_crc(&archive);

        let result = verify_archive(&archive, &source);
        assert!(matches!(result, Err(LogError::CorruptArchive { .. })));
        assert!(source.exists());
    }

    #[test]
    fn test_verify_detects_length_mismatch() {
        let dir = TempDir::new().unwrap();
        let source = rotated_file(&dir, "short\n");
        let archive = ZipCompressor::archive_path(&source);
        write_archive(&source, &archive, "app_2025-01-06.log").unwrap();

        fs::write(&source, "grew after archiving\n").unwrap();

        let result = verify_archive(&archive, &source);
        assert!(matches!(result, Err(LogError::CorruptArchive { .. })));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let source = rotated_file(&dir, "x\n");
        let archive = ZipCompressor::archive_path(&source);
        fs::write(&archive, b"not a zip at all").unwrap();

        let result = verify_archive(&archive, &source);
        assert!(matches!(result, Err(LogError::CorruptArchive { .. })));
    }

    #[test]
    fn test_failed_cleanup_after_verification_counts_as_rollover_failure() {
        let dir = TempDir::new().unwrap();
        let source = rotated_file(&dir, "payload\n");
        let archive = compress_file(&source).unwrap();

        // The rotated file is already gone, so removing it again fails
        let err = remove_rotated(&source, &archive).unwrap_err();

        assert!(matches!(err, LogError::ArchiveCleanup { .. }));
        assert!(err.is_rollover_failure());
        assert!(archive.exists());
    }

    #[test]
    fn test_missing_source_is_io_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone.log");

        let result = compress_file(&missing);

        assert!(matches!(result, Err(LogError::Io { .. })));
        assert!(!ZipCompressor::archive_path(&missing).exists());
    }
}
