use std::path::Path;

use chrono::{DateTime, Utc};

use crate::config::FileType;
use crate::error::StoreError;

/// Compact ISO-8601 basic format, safe inside object keys.
pub const KEY_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

pub fn report_object_name(
    file_path: &Path,
    file_type: FileType,
    timestamp: Option<DateTime<Utc>>,
) -> Result<String, StoreError> {
    let stem = file_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.trim().is_empty())
        .ok_or_else(|| StoreError::UnnamedFile(file_path.to_path_buf()))?;

    Ok(match timestamp {
        Some(at) => format!(
            "{stem}-{}.{}",
            at.format(KEY_TIMESTAMP_FORMAT),
            file_type.extension()
        ),
        None => format!("{stem}.{}", file_type.extension()),
    })
}

pub fn report_object_key(
    base_prefix: &str,
    file_path: &Path,
    file_type: FileType,
    timestamp: Option<DateTime<Utc>>,
) -> Result<String, StoreError> {
    let name = report_object_name(file_path, file_type, timestamp)?;
    let trimmed = base_prefix.trim_matches('/');
    if trimmed.is_empty() {
        Ok(name)
    } else {
        Ok(format!("{trimmed}/{name}"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 14, 8, 30, 5)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn builds_plain_key_from_file_name() {
        let key = report_object_key("", Path::new("/tmp/report.csv"), FileType::Csv, None)
            .expect("key should derive");
        assert_eq!(key, "report.csv");
    }

    #[test]
    fn file_type_decides_the_extension() {
        let key = report_object_key("", Path::new("/tmp/github_admin_report"), FileType::Json, None)
            .expect("key should derive");
        assert_eq!(key, "github_admin_report.json");
    }

    #[test]
    fn builds_timestamped_key_under_prefix() {
        let key = report_object_key(
            "/reports/github/",
            Path::new("/tmp/report.csv"),
            FileType::Csv,
            Some(sample_time()),
        )
        .expect("key should derive");
        assert_eq!(key, "reports/github/report-20260214T083005Z.csv");
    }

    #[test]
    fn rejects_paths_without_a_file_name() {
        let error = report_object_key("", Path::new("/"), FileType::Csv, None)
            .expect_err("root has no file name");
        assert!(matches!(error, StoreError::UnnamedFile(_)));
    }
}
