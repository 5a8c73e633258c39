//! Unpacking tar and zip archives.

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::error::SyError;
use crate::Result;

/// Format of an archive, recognised from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// Uncompressed tar.
    Tar,
    /// Gzip compressed tar.
    TarGz,
    /// Bzip2 compressed tar.
    TarBz2,
    /// Zip file.
    Zip,
}

impl ArchiveKind {
    /// Sniff the format of the file at `path`.
    pub fn detect(path: &Path) -> Result<Self> {
        let mut head = Vec::with_capacity(512);
        File::open(path)?.take(512).read_to_end(&mut head)?;

        if head.starts_with(&[0x1f, 0x8b]) {
            Ok(Self::TarGz)
        } else if head.starts_with(b"BZh") {
            Ok(Self::TarBz2)
        } else if head.starts_with(b"PK\x03\x04") || head.starts_with(b"PK\x05\x06") {
            Ok(Self::Zip)
        } else if head.get(257..262) == Some(&b"ustar"[..]) {
            Ok(Self::Tar)
        } else if head.starts_with(&[0x1f, 0x9d]) {
            Err(archive_error(path, "compress(1) archives are not supported"))
        } else {
            Err(archive_error(path, "not a tar or zip archive"))
        }
    }
}

/// Unpack a tar (plain, gzip or bzip2) or zip archive into `dir`.
///
/// `dir` is created if missing. Entries that would land outside `dir` are
/// skipped.
///
/// ```no_run
/// sy::path::extract("/tmp/release.tar.gz", "/opt/app")?;
/// # Ok::<(), sy::SyError>(())
/// ```
pub fn extract(archive: impl AsRef<Path>, dir: impl AsRef<Path>) -> Result<()> {
    let archive = archive.as_ref();
    let dir = dir.as_ref();
    let kind = ArchiveKind::detect(archive)?;
    fs::create_dir_all(dir)?;
    debug!(archive = %archive.display(), dir = %dir.display(), ?kind, "extracting");

    let file = File::open(archive)?;
    match kind {
        ArchiveKind::Tar => unpack_tar(file, dir),
        ArchiveKind::TarGz => unpack_tar(flate2::read::GzDecoder::new(file), dir),
        ArchiveKind::TarBz2 => unpack_tar(bzip2::read::BzDecoder::new(file), dir),
        ArchiveKind::Zip => {
            let mut zip =
                zip::ZipArchive::new(file).map_err(|e| archive_error(archive, e.to_string()))?;
            zip.extract(dir)
                .map_err(|e| archive_error(archive, e.to_string()))
        }
    }
}

fn unpack_tar<R: Read>(reader: R, dir: &Path) -> Result<()> {
    tar::Archive::new(reader).unpack(dir)?;
    Ok(())
}

fn archive_error(path: &Path, reason: impl Into<String>) -> SyError {
    SyError::Archive {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use tempfile::TempDir;

    const CONTENT: &[u8] = b"hello archive\n";

    fn write_tar<W: Write>(writer: W) -> W {
        let mut builder = tar::Builder::new(writer);
        let mut header = tar::Header::new_gnu();
        header.set_size(CONTENT.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "pkg/hello.txt", CONTENT)
            .unwrap();
        builder.into_inner().unwrap()
    }

    fn assert_extracted(dir: &Path) {
        assert_eq!(fs::read(dir.join("pkg/hello.txt")).unwrap(), CONTENT);
    }

    #[test]
    fn test_extract_plain_tar() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("a.tar");
        write_tar(File::create(&archive).unwrap());

        assert_eq!(ArchiveKind::detect(&archive).unwrap(), ArchiveKind::Tar);
        let out = tmp.path().join("out");
        extract(&archive, &out).unwrap();
        assert_extracted(&out);
    }

    #[test]
    fn test_extract_tar_gz() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("a.tgz");
        let gz = flate2::write::GzEncoder::new(
            File::create(&archive).unwrap(),
            flate2::Compression::default(),
        );
        write_tar(gz).finish().unwrap();

        assert_eq!(ArchiveKind::detect(&archive).unwrap(), ArchiveKind::TarGz);
        extract(&archive, tmp.path()).unwrap();
        assert_extracted(tmp.path());
    }

    #[test]
    fn test_extract_tar_bz2() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("a.tar.bz2");
        let bz = bzip2::write::BzEncoder::new(
            File::create(&archive).unwrap(),
            bzip2::Compression::default(),
        );
        write_tar(bz).finish().unwrap();

        extract(&archive, tmp.path()).unwrap();
        assert_extracted(tmp.path());
    }

    #[test]
    fn test_extract_zip() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("a.zip");
        let mut zip = zip::ZipWriter::new(File::create(&archive).unwrap());
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        zip.start_file("pkg/hello.txt", options).unwrap();
        zip.write_all(CONTENT).unwrap();
        zip.finish().unwrap();

        assert_eq!(ArchiveKind::detect(&archive).unwrap(), ArchiveKind::Zip);
        extract(&archive, tmp.path()).unwrap();
        assert_extracted(tmp.path());
    }

    #[test]
    fn test_extract_rejects_other_files() {
        let tmp = TempDir::new().unwrap();
        let text = tmp.path().join("notes.txt");
        fs::write(&text, "just text").unwrap();
        assert!(matches!(
            extract(&text, tmp.path()),
            Err(SyError::Archive { .. })
        ));

        let compressed = tmp.path().join("a.tar.Z");
        fs::write(&compressed, [0x1f, 0x9d, 0x90]).unwrap();
        let err = extract(&compressed, tmp.path()).unwrap_err();
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn test_extract_missing_archive() {
        let tmp = TempDir::new().unwrap();
        let err = extract(tmp.path().join("missing.tar"), tmp.path()).unwrap_err();
        assert!(matches!(err, SyError::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
    }
}
