//! Security configuration for archive scanning.

/// Immutable snapshot of scan thresholds and allow-lists.
///
/// # Performance Note
///
/// This struct contains heap-allocated collections (`Vec<String>`). Pass by
/// reference rather than cloning; wrap in `Arc<SecurityConfig>` for shared
/// ownership across threads.
///
/// # Examples
///
/// ```
/// use archvet_core::SecurityConfig;
///
/// // Secure defaults
/// let config = SecurityConfig::default();
///
/// // Customize for specific needs
/// let custom = SecurityConfig {
///     max_file_size: 100 * 1024 * 1024,   // 100 MiB
///     max_total_size: 1024 * 1024 * 1024, // 1 GiB
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Maximum compression ratio allowed (uncompressed / compressed), both
    /// per member and in aggregate.
    pub max_compression_ratio: f64,

    /// Maximum declared size for a single member in bytes.
    pub max_file_size: u64,

    /// Maximum total declared uncompressed size in bytes.
    pub max_total_size: u64,

    /// Maximum number of members before enumeration is abandoned.
    pub max_file_count: usize,

    /// Maximum archive nesting depth before a nested archive member is
    /// flagged. The default of 1 flags any archive found inside the scanned
    /// container; nested archives are never opened.
    pub max_nesting_depth: usize,

    /// Archive extensions accepted for upload (empty = allow all).
    pub allowed_extensions: Vec<String>,

    /// Case-insensitive substrings that mark a member path as hostile.
    pub blocked_path_substrings: Vec<String>,

    /// Case-insensitive substrings that mark text content as suspicious.
    pub suspicious_content_patterns: Vec<String>,

    /// Allow absolute member paths inside archives.
    pub allow_absolute_paths: bool,
}

impl Default for SecurityConfig {
    /// Creates a `SecurityConfig` with secure default settings.
    ///
    /// Default values:
    /// - `max_compression_ratio`: 100.0
    /// - `max_file_size`: 50 MiB
    /// - `max_total_size`: 500 MiB
    /// - `max_file_count`: 10,000
    /// - `max_nesting_depth`: 1 (any nested archive is flagged)
    /// - `allowed_extensions`: common archive extensions
    /// - `allow_absolute_paths`: false (deny)
    fn default() -> Self {
        Self {
            max_compression_ratio: 100.0,
            max_file_size: 50 * 1024 * 1024,   // 50 MiB
            max_total_size: 500 * 1024 * 1024, // 500 MiB
            max_file_count: 10_000,
            max_nesting_depth: 1,
            allowed_extensions: vec![
                "zip".to_string(),
                "jar".to_string(),
                "tar".to_string(),
                "gz".to_string(),
                "tgz".to_string(),
                "bz2".to_string(),
                "tbz2".to_string(),
            ],
            blocked_path_substrings: vec![
                "/etc/".to_string(),
                "/proc/".to_string(),
                "/sys/".to_string(),
                "/dev/".to_string(),
                "c:\\".to_string(),
                "\\windows\\".to_string(),
                ".ssh/".to_string(),
                ".aws/".to_string(),
            ],
            suspicious_content_patterns: vec![
                "<script".to_string(),
                "javascript:".to_string(),
                "vbscript:".to_string(),
                "<?php".to_string(),
                "<%".to_string(),
                "#!/bin/".to_string(),
                "#!/usr/bin/".to_string(),
            ],
            allow_absolute_paths: false,
        }
    }
}

impl SecurityConfig {
    /// Creates a permissive configuration for trusted sources.
    ///
    /// Raises the ratio ceiling, allows absolute paths, and clears the
    /// path blocklist. Use only for archives from trusted origins.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            max_compression_ratio: 1000.0,
            max_nesting_depth: 8,
            allowed_extensions: Vec::new(),
            blocked_path_substrings: Vec::new(),
            allow_absolute_paths: true,
            ..Default::default()
        }
    }

    /// Validates whether a file extension is on the upload allow-list.
    ///
    /// Comparison is case-insensitive. An empty allow-list accepts all.
    #[must_use]
    pub fn is_extension_allowed(&self, extension: &str) -> bool {
        if self.allowed_extensions.is_empty() {
            return true;
        }
        self.allowed_extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }

    /// Returns the first blocked substring matching the member path, if any.
    ///
    /// Matching is case-insensitive to prevent bypass on case-insensitive
    /// filesystems.
    #[must_use]
    pub fn blocked_substring_in(&self, member_path: &str) -> Option<&str> {
        let lowered = member_path.to_lowercase();
        self.blocked_path_substrings
            .iter()
            .find(|sub| lowered.contains(&sub.to_lowercase()))
            .map(String::as_str)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::field_reassign_with_default)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SecurityConfig::default();
        assert!(!config.allow_absolute_paths);
        assert_eq!(config.max_file_size, 50 * 1024 * 1024);
        assert_eq!(config.max_nesting_depth, 1);
        assert!((config.max_compression_ratio - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_permissive_config() {
        let config = SecurityConfig::permissive();
        assert!(config.allow_absolute_paths);
        assert!(config.blocked_path_substrings.is_empty());
        assert!(config.is_extension_allowed("rar"));
    }

    #[test]
    fn test_extension_allowed() {
        let config = SecurityConfig::default();
        assert!(config.is_extension_allowed("zip"));
        assert!(config.is_extension_allowed("ZIP"));
        assert!(config.is_extension_allowed("tgz"));
        assert!(!config.is_extension_allowed("exe"));
    }

    #[test]
    fn test_extension_allowed_empty_list() {
        let mut config = SecurityConfig::default();
        config.allowed_extensions = Vec::new();
        assert!(config.is_extension_allowed("exe"));
    }

    #[test]
    fn test_blocked_substring_case_insensitive() {
        let config = SecurityConfig::default();
        assert_eq!(config.blocked_substring_in("foo/etc/passwd"), Some("/etc/"));
        assert_eq!(config.blocked_substring_in("backup/.SSH/id_rsa"), Some(".ssh/"));
        assert_eq!(config.blocked_substring_in("C:\\boot.ini"), Some("c:\\"));
        assert!(config.blocked_substring_in("src/main.rs").is_none());
    }
}
