//! Container type sniffing from leading bytes.
//!
//! Extension checks alone are not trusted: the container type is classified
//! from magic bytes before any structural parser touches the input.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// ZIP local file header signature (`PK\x03\x04`).
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Empty ZIP end-of-central-directory signature (`PK\x05\x06`).
const ZIP_EMPTY_MAGIC: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];

/// Gzip stream signature.
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Bzip2 stream signature (`BZh`).
const BZIP2_MAGIC: [u8; 3] = [0x42, 0x5A, 0x68];

/// Offset of the `ustar` magic inside a tar header block.
const TAR_MAGIC_OFFSET: usize = 257;

/// The `ustar` magic itself.
const TAR_MAGIC: [u8; 5] = *b"ustar";

/// Extensions treated as archives when found nested inside a container.
const ARCHIVE_EXTENSIONS: &[&str] = &[
    "zip", "jar", "war", "tar", "gz", "tgz", "bz2", "tbz2", "xz", "7z", "rar",
];

/// Recognized container families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// ZIP or JAR container.
    Zip,
    /// Gzip-compressed tar stream.
    TarGz,
    /// Bzip2-compressed tar stream.
    TarBz2,
    /// Uncompressed tar stream.
    Tar,
    /// Not a recognized container.
    Unknown,
}

impl std::fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
            Self::TarBz2 => "tar.bz2",
            Self::Tar => "tar",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Classifies a file's container type from its leading bytes.
///
/// # Errors
///
/// Returns an error only when the file cannot be opened or read; an
/// unrecognized byte pattern is [`ContainerKind::Unknown`], not an error.
pub fn sniff_container(path: &Path) -> std::io::Result<ContainerKind> {
    let file = File::open(path)?;
    let mut header = Vec::with_capacity(512);
    file.take(512).read_to_end(&mut header)?;
    Ok(classify_header(&header))
}

/// Classifies already-read leading bytes.
#[must_use]
pub fn classify_header(header: &[u8]) -> ContainerKind {
    if header.starts_with(&ZIP_MAGIC) || header.starts_with(&ZIP_EMPTY_MAGIC) {
        return ContainerKind::Zip;
    }
    if header.starts_with(&GZIP_MAGIC) {
        return ContainerKind::TarGz;
    }
    if header.starts_with(&BZIP2_MAGIC) {
        return ContainerKind::TarBz2;
    }
    if header.len() > TAR_MAGIC_OFFSET + TAR_MAGIC.len()
        && header[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + TAR_MAGIC.len()] == TAR_MAGIC
    {
        return ContainerKind::Tar;
    }
    ContainerKind::Unknown
}

/// Whether a member name carries a recognized archive extension.
///
/// Used for nested-archive flagging only; nested archives are never opened.
#[must_use]
pub fn is_archive_extension(member_name: &str) -> bool {
    member_name
        .rsplit('.')
        .next()
        .is_some_and(|ext| ext != member_name && ARCHIVE_EXTENSIONS.iter().any(|a| ext.eq_ignore_ascii_case(a)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_zip() {
        assert_eq!(classify_header(b"PK\x03\x04rest"), ContainerKind::Zip);
        assert_eq!(classify_header(b"PK\x05\x06"), ContainerKind::Zip);
    }

    #[test]
    fn test_classify_gzip() {
        assert_eq!(classify_header(&[0x1F, 0x8B, 0x08]), ContainerKind::TarGz);
    }

    #[test]
    fn test_classify_bzip2() {
        assert_eq!(classify_header(b"BZh91AY"), ContainerKind::TarBz2);
    }

    #[test]
    fn test_classify_tar() {
        let mut header = vec![0u8; 512];
        header[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 5].copy_from_slice(b"ustar");
        assert_eq!(classify_header(&header), ContainerKind::Tar);
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(classify_header(b"MZ\x90\x00"), ContainerKind::Unknown);
        assert_eq!(classify_header(b""), ContainerKind::Unknown);
        // Too short for the tar magic check
        assert_eq!(classify_header(&[0u8; 100]), ContainerKind::Unknown);
    }

    #[test]
    fn test_archive_extension() {
        assert!(is_archive_extension("payload.zip"));
        assert!(is_archive_extension("inner.TAR"));
        assert!(is_archive_extension("deep/nested.tar.gz"));
        assert!(!is_archive_extension("readme.txt"));
        assert!(!is_archive_extension("noextension"));
        assert!(!is_archive_extension("zip"));
    }
}
