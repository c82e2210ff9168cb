//! Test utilities for building in-memory archives.
//!
//! Reusable helpers for constructing the containers the scanner inspects,
//! including deliberately hostile ones (traversal names, high-ratio
//! members).
//!
//! # Panics
//!
//! All functions in this module may panic on I/O errors since they are
//! designed for test use only where panics are acceptable.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::io::Cursor;
use std::io::Write;

/// Creates an in-memory ZIP archive from (path, content) pairs, stored
/// uncompressed with mode 0o644.
///
/// # Examples
///
/// ```
/// use archvet_core::test_utils::create_test_zip;
///
/// let zip_data = create_test_zip(vec![("file.txt", b"hello"), ("dir/nested.txt", b"world")]);
/// ```
#[must_use]
pub fn create_test_zip(entries: Vec<(&str, &[u8])>) -> Vec<u8> {
    use zip::write::SimpleFileOptions;
    use zip::write::ZipWriter;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);

    for (path, data) in entries {
        zip.start_file(path, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Creates an in-memory ZIP archive with deflate compression, for tests
/// that need realistic compressed/uncompressed size pairs.
#[must_use]
pub fn create_deflated_zip(entries: Vec<(&str, &[u8])>) -> Vec<u8> {
    use zip::write::SimpleFileOptions;
    use zip::write::ZipWriter;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for (path, data) in entries {
        zip.start_file(path, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Creates a ZIP archive holding one member of `logical_size` repeated
/// bytes, producing a deflate stream with an extreme compression ratio.
#[must_use]
pub fn create_zip_bomb(member_name: &str, logical_size: usize) -> Vec<u8> {
    let blob = vec![0u8; logical_size];
    create_deflated_zip(vec![(member_name, blob.as_slice())])
}

/// Creates an in-memory TAR archive from (path, content) pairs with mode
/// 0o644.
///
/// # Examples
///
/// ```
/// use archvet_core::test_utils::create_test_tar;
///
/// let tar_data = create_test_tar(vec![("file.txt", b"hello")]);
/// ```
#[must_use]
pub fn create_test_tar(entries: Vec<(&str, &[u8])>) -> Vec<u8> {
    let mut ar = tar::Builder::new(Vec::new());
    for (path, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        if header.set_path(path).is_err() {
            // `set_path` refuses `..` and absolute names. Hostile archives
            // carry them anyway, so write the raw bytes into the name field.
            let name = &mut header.as_old_mut().name;
            name[..path.len()].copy_from_slice(path.as_bytes());
        }
        header.set_cksum();
        ar.append(&header, data).unwrap();
    }
    ar.into_inner().unwrap()
}

/// Creates an in-memory gzip-compressed TAR archive.
#[must_use]
pub fn create_test_tar_gz(entries: Vec<(&str, &[u8])>) -> Vec<u8> {
    let tar_data = create_test_tar(entries);
    let mut encoder =
        flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&tar_data).unwrap();
    encoder.finish().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_zip_roundtrip() {
        let data = create_test_zip(vec![("a.txt", b"alpha")]);
        let mut archive = zip::ZipArchive::new(Cursor::new(data)).unwrap();
        assert_eq!(archive.len(), 1);
        let mut member = archive.by_index(0).unwrap();
        assert_eq!(member.name(), "a.txt");
        let mut content = String::new();
        member.read_to_string(&mut content).unwrap();
        assert_eq!(content, "alpha");
    }

    #[test]
    fn test_zip_bomb_has_extreme_ratio() {
        let data = create_zip_bomb("blob.bin", 1024 * 1024);
        let mut archive = zip::ZipArchive::new(Cursor::new(data)).unwrap();
        let member = archive.by_index(0).unwrap();
        let ratio = member.size() as f64 / member.compressed_size() as f64;
        assert!(ratio > 100.0, "expected bomb ratio, got {ratio:.1}");
    }

    #[test]
    fn test_tar_gz_roundtrip() {
        let data = create_test_tar_gz(vec![("dir/b.txt", b"beta")]);
        let decoder = flate2::read::GzDecoder::new(Cursor::new(data));
        let mut archive = tar::Archive::new(decoder);
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["dir/b.txt".to_string()]);
    }
}
