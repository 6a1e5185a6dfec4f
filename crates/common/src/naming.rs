// Snapshot file names and commit messages derived from capture timestamps.
//
// File names sort lexically in capture order: `committed_file_2024-05-01T09-30-00.txt`.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Timelike, Utc};

pub const SNAPSHOT_PREFIX: &str = "committed_file_";
pub const SNAPSHOT_EXTENSION: &str = ".txt";

const STAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const FILE_STAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Drop sub-second precision.
pub fn truncate_to_seconds(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp.with_nanosecond(0).unwrap_or(timestamp)
}

/// Deterministic snapshot file name for a capture timestamp.
pub fn snapshot_file_name(timestamp: DateTime<Utc>) -> String {
    let stamp = truncate_to_seconds(timestamp).format(STAMP_FORMAT).to_string();
    format!("{SNAPSHOT_PREFIX}{}{SNAPSHOT_EXTENSION}", sanitize_file_component(&stamp))
}

/// Recover the capture timestamp from a snapshot file name.
pub fn parse_snapshot_file_name(name: &str) -> Option<DateTime<Utc>> {
    let stamp = name.strip_prefix(SNAPSHOT_PREFIX)?.strip_suffix(SNAPSHOT_EXTENSION)?;
    NaiveDateTime::parse_from_str(stamp, FILE_STAMP_FORMAT).ok().map(|naive| naive.and_utc())
}

/// Commit message embedding the capture timestamp in ISO-8601 form.
pub fn commit_message(timestamp: DateTime<Utc>) -> String {
    format!(
        "Auto-commit at {}",
        truncate_to_seconds(timestamp).to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

/// Replace characters that are not portable in file names.
fn sanitize_file_component(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            ':' | '/' | '\\' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, s).unwrap()
    }

    #[test]
    fn file_name_replaces_colons() {
        assert_eq!(snapshot_file_name(at(9, 30, 5)), "committed_file_2024-05-01T09-30-05.txt");
    }

    #[test]
    fn file_name_ignores_sub_second_precision() {
        let precise = at(9, 30, 5) + chrono::Duration::milliseconds(750);
        assert_eq!(snapshot_file_name(precise), snapshot_file_name(at(9, 30, 5)));
    }

    #[test]
    fn file_names_sort_in_capture_order() {
        let mut names = vec![
            snapshot_file_name(at(23, 0, 0)),
            snapshot_file_name(at(9, 0, 0)),
            snapshot_file_name(at(9, 0, 1)),
        ];
        names.sort();
        assert_eq!(
            names,
            vec![
                "committed_file_2024-05-01T09-00-00.txt",
                "committed_file_2024-05-01T09-00-01.txt",
                "committed_file_2024-05-01T23-00-00.txt",
            ]
        );
    }

    #[test]
    fn parses_back_to_timestamp() {
        let name = snapshot_file_name(at(12, 1, 2));
        assert_eq!(parse_snapshot_file_name(&name), Some(at(12, 1, 2)));
    }

    #[test]
    fn parse_rejects_foreign_files() {
        assert_eq!(parse_snapshot_file_name("README.md"), None);
        assert_eq!(parse_snapshot_file_name("committed_file_garbage.txt"), None);
        assert_eq!(parse_snapshot_file_name("committed_file_2024-05-01T09-30-05.md"), None);
    }

    #[test]
    fn commit_message_uses_iso_8601() {
        assert_eq!(commit_message(at(9, 30, 5)), "Auto-commit at 2024-05-01T09:30:05Z");
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_file_component("a:b/c\\d*e?f\"g<h>i|j\n"), "a-b-c-d-e-f-g-h-i-j-");
    }
}
