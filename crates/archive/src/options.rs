//! Output grouping and gallery ordering configuration.

use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use koma_sidecar::GalleryInfo;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::path::PathBuf;
use std::str::FromStr;
use time::Date;

/// Directory bucketing scheme for published archives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum Grouping {
    /// Everything directly under the archive root.
    #[default]
    #[serde(rename = "flat")]
    Flat,
    /// One directory per upload year (`2024/`).
    #[serde(rename = "date-yyyy")]
    ByYear,
    /// Year and month (`2024/03/`).
    #[serde(rename = "date-yyyy-mm")]
    ByYearMonth,
    /// Year, month, and day (`2024/03/01/`).
    #[serde(rename = "date-yyyy-mm-dd")]
    ByYearMonthDay,
}

impl Grouping {
    /// Relative directory an archive lands in, derived from the gallery's
    /// upload date. Components are zero-padded so they sort lexically.
    pub fn bucket(&self, upload_date: Date) -> PathBuf {
        let year = format!("{:04}", upload_date.year());
        let month = format!("{:02}", u8::from(upload_date.month()));
        let day = format!("{:02}", upload_date.day());
        match self {
            Grouping::Flat => PathBuf::new(),
            Grouping::ByYear => PathBuf::from(year),
            Grouping::ByYearMonth => [year, month].iter().collect(),
            Grouping::ByYearMonthDay => [year, month, day].iter().collect(),
        }
    }
}

/// Default page-count pivot when `pages` is given without an offset.
const DEFAULT_PAGES_OFFSET: u32 = 20;

/// Order in which galleries are processed (and therefore archived) within
/// a pass.
///
/// `Pages { offset }` orders by distance from a pivot page count, so
/// "ordinary-sized" galleries are handled first; the pivot comes from the
/// `pages+N` config form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum SortKey {
    #[default]
    None,
    UploadTime,
    DownloadTime,
    Gid,
    Title,
    Pages {
        offset: u32,
    },
}

impl SortKey {
    /// Sort galleries in place according to this key. Time, id, and title
    /// keys order newest/highest first.
    pub fn order(&self, galleries: &mut [GalleryInfo]) {
        match self {
            SortKey::None => {},
            SortKey::UploadTime => galleries.sort_by_key(|info| Reverse(info.upload_time)),
            SortKey::DownloadTime => galleries.sort_by_key(|info| Reverse(info.download_time)),
            SortKey::Gid => galleries.sort_by_key(|info| Reverse(info.gid)),
            SortKey::Title => galleries.sort_by(|a, b| b.title.cmp(&a.title)),
            SortKey::Pages { offset } => {
                let offset = i64::from(*offset);
                galleries.sort_by_key(|info| (info.pages() as i64 - offset).abs());
            },
        }
    }
}

impl FromStr for SortKey {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "none" | "no" => Ok(SortKey::None),
            "upload_time" => Ok(SortKey::UploadTime),
            "download_time" => Ok(SortKey::DownloadTime),
            "gid" => Ok(SortKey::Gid),
            "title" => Ok(SortKey::Title),
            "pages" => Ok(SortKey::Pages { offset: DEFAULT_PAGES_OFFSET }),
            other => match other.strip_prefix("pages+") {
                Some(offset) => {
                    let offset =
                        offset.parse::<u32>().or_raise(|| ErrorKind::UnknownOption(s.to_string()))?;
                    Ok(SortKey::Pages { offset: offset.max(1) })
                },
                None => exn::bail!(ErrorKind::UnknownOption(s.to_string())),
            },
        }
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortKey::None => f.write_str("none"),
            SortKey::UploadTime => f.write_str("upload_time"),
            SortKey::DownloadTime => f.write_str("download_time"),
            SortKey::Gid => f.write_str("gid"),
            SortKey::Title => f.write_str("title"),
            SortKey::Pages { offset } => write!(f, "pages+{offset}"),
        }
    }
}

impl TryFrom<String> for SortKey {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse::<SortKey>().map_err(|error| error.to_string())
    }
}

impl From<SortKey> for String {
    fn from(value: SortKey) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::macros::date;

    #[rstest]
    #[case(Grouping::Flat, "")]
    #[case(Grouping::ByYear, "2024")]
    #[case(Grouping::ByYearMonth, "2024/03")]
    #[case(Grouping::ByYearMonthDay, "2024/03/01")]
    fn test_bucket(#[case] grouping: Grouping, #[case] expected: &str) {
        assert_eq!(grouping.bucket(date!(2024 - 03 - 01)), PathBuf::from(expected));
    }

    #[rstest]
    #[case("none", SortKey::None)]
    #[case("upload_time", SortKey::UploadTime)]
    #[case("pages", SortKey::Pages { offset: 20 })]
    #[case("pages+35", SortKey::Pages { offset: 35 })]
    #[case("pages+0", SortKey::Pages { offset: 1 })]
    fn test_sort_key_from_str(#[case] input: &str, #[case] expected: SortKey) {
        assert_eq!(input.parse::<SortKey>().unwrap(), expected);
    }

    #[rstest]
    #[case("alphabetical")]
    #[case("pages+many")]
    fn test_sort_key_from_str_invalid(#[case] input: &str) {
        assert!(input.parse::<SortKey>().is_err());
    }
}
