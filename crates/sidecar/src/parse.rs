use crate::error::{ErrorKind, Result};
use crate::model::Tag;
use exn::{OptionExt, ResultExt};
use regex::Regex;
use std::sync::LazyLock;
use time::PrimitiveDateTime;
use time::macros::format_description;

/// Timestamps are written by the download client as `2024-03-01 17:20:05`.
const TIME_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// A gallery folder is named either `<gid>` or `<labels...>[<gid>]`,
/// e.g. `[group][artist] Some Title [123456]`.
static GID_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(\d+)\]\s*$").expect("gid suffix pattern is valid")
});

/// Fields carried by the sidecar text itself (as opposed to the ones
/// derived from the folder: name, gid, member files, modified time).
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct SidecarFields {
    pub title: String,
    pub upload_account: String,
    pub upload_time: PrimitiveDateTime,
    pub download_time: PrimitiveDateTime,
    pub comment: String,
    pub tags: Vec<Tag>,
}

/// Extract the external gallery id from a folder name.
pub(crate) fn parse_gid(name: &str) -> Result<u64> {
    let digits = match GID_SUFFIX.captures(name) {
        Some(captures) => captures.get(1).expect("pattern has one group").as_str(),
        None => name.trim(),
    };
    digits.parse::<u64>().or_raise(|| ErrorKind::Malformed { field: "gid", value: name.to_string() })
}

fn parse_time(field: &'static str, value: &str) -> Result<PrimitiveDateTime> {
    PrimitiveDateTime::parse(value, TIME_FORMAT)
        .or_raise(|| ErrorKind::Malformed { field, value: value.to_string() })
}

/// Split a `Tags` line value into ordered, deduplicated pairs.
///
/// Each comma-separated item is `category:value`; an item without a colon
/// (or with an empty category) goes into the untagged bucket.
fn parse_tags(value: &str) -> Vec<Tag> {
    let mut tags = Vec::new();
    for item in value.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let tag = match item.split_once(':') {
            Some((category, value)) => Tag::new(category.trim(), value.trim()),
            None => Tag::new("", item),
        };
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Parse the line-oriented `Key: Value` sidecar grammar.
///
/// Everything after a line containing `Uploader's Comments` is the
/// free-text comment block; key lines before it are matched by name and
/// unknown keys are ignored (the download client has grown fields before).
pub(crate) fn parse_text(text: &str) -> Result<SidecarFields> {
    let mut title = None;
    let mut upload_account = None;
    let mut upload_time = None;
    let mut download_time = None;
    let mut tags = Vec::new();
    let mut comment_lines: Option<Vec<&str>> = None;

    for line in text.lines() {
        if let Some(lines) = comment_lines.as_mut() {
            lines.push(line.trim());
            continue;
        }
        if line.contains("Uploader's Comments") {
            comment_lines = Some(Vec::new());
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Title" => title = Some(value.to_string()),
            "Uploaded By" => upload_account = Some(value.to_string()),
            "Upload Time" => upload_time = Some(parse_time("upload_time", value)?),
            "Downloaded" => download_time = Some(parse_time("download_time", value)?),
            "Tags" => tags = parse_tags(value),
            _ => {},
        }
    }

    Ok(SidecarFields {
        title: title.ok_or_raise(|| ErrorKind::MissingField("title"))?,
        upload_account: upload_account.ok_or_raise(|| ErrorKind::MissingField("upload_account"))?,
        upload_time: upload_time.ok_or_raise(|| ErrorKind::MissingField("upload_time"))?,
        download_time: download_time.ok_or_raise(|| ErrorKind::MissingField("download_time"))?,
        comment: comment_lines.map(|lines| lines.join("\n").trim().to_string()).unwrap_or_default(),
        tags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("[group][artist] Title [123456]", 123456)]
    #[case("[G][Title][100]", 100)]
    #[case("987", 987)]
    #[case("[55]", 55)]
    fn test_parse_gid(#[case] name: &str, #[case] expected: u64) {
        assert_eq!(parse_gid(name).unwrap(), expected);
    }

    #[rstest]
    #[case("no digits here")]
    #[case("[notanumber]")]
    #[case("")]
    fn test_parse_gid_malformed(#[case] name: &str) {
        assert!(parse_gid(name).is_err());
    }

    #[rstest]
    #[case("artist:alice, group", vec![Tag::new("artist", "alice"), Tag::new("", "group")])]
    #[case("a:b, a:b, a:c", vec![Tag::new("a", "b"), Tag::new("a", "c")])]
    #[case("", vec![])]
    #[case(" lonely ", vec![Tag::new("", "lonely")])]
    fn test_parse_tags(#[case] value: &str, #[case] expected: Vec<Tag>) {
        assert_eq!(parse_tags(value), expected);
    }

    #[test]
    fn test_parse_text_full() {
        let text = "Title: Teatime Cookbook\n\
                    Upload Time: 2024-03-01 17:20:05\n\
                    Uploaded By: pooh\n\
                    Downloaded: 2024-03-02 09:00:00\n\
                    Tags: artist:alice, group\n\
                    Uploader's Comments:\n\
                    first line\n\
                    second line\n";
        let fields = parse_text(text).unwrap();
        assert_eq!(fields.title, "Teatime Cookbook");
        assert_eq!(fields.upload_account, "pooh");
        assert_eq!(fields.upload_time, time::macros::datetime!(2024-03-01 17:20:05));
        assert_eq!(fields.download_time, time::macros::datetime!(2024-03-02 09:00:00));
        assert_eq!(fields.comment, "first line\nsecond line");
        assert_eq!(fields.tags, vec![Tag::new("artist", "alice"), Tag::new("", "group")]);
    }

    #[test]
    fn test_parse_text_malformed_time_names_field() {
        let text = "Title: x\n\
                    Upload Time: last tuesday\n\
                    Uploaded By: y\n\
                    Downloaded: 2024-03-02 09:00:00\n";
        let error = parse_text(text).unwrap_err();
        assert!(error.to_string().contains("upload_time"), "got: {error}");
    }

    #[test]
    fn test_parse_text_missing_title() {
        let text = "Upload Time: 2024-03-01 17:20:05\n\
                    Uploaded By: y\n\
                    Downloaded: 2024-03-02 09:00:00\n";
        assert!(parse_text(text).is_err());
    }
}
