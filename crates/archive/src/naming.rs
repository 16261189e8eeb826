use std::path::Path;

const ARCHIVE_SUFFIX: &str = ".cbz";
/// Common filesystem limit for a single path component, in bytes.
const FILE_NAME_BYTE_LIMIT: usize = 255;

/// Deterministic archive file name for a gallery folder name.
///
/// Long folder names are trimmed from the *front* until the name plus the
/// `.cbz` suffix fits in one path component; the tail of the folder name
/// carries the `[gid]` marker, so it must survive the trim.
pub fn archive_file_name(gallery_name: &str) -> String {
    let mut name = gallery_name;
    while name.len() + ARCHIVE_SUFFIX.len() > FILE_NAME_BYTE_LIMIT {
        let mut chars = name.chars();
        chars.next();
        name = chars.as_str();
    }
    format!("{name}{ARCHIVE_SUFFIX}")
}

/// Whether a published file belongs to one of the given gallery names.
pub fn is_live_archive(path: &Path, live_names: &std::collections::HashSet<String>) -> bool {
    path.file_name().and_then(|name| name.to_str()).is_some_and(|name| live_names.contains(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("[G][Title][100]", "[G][Title][100].cbz")]
    #[case("", ".cbz")]
    fn test_archive_file_name(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(archive_file_name(input), expected);
    }

    #[test]
    fn test_archive_file_name_trims_from_front() {
        let long = format!("{}[4242]", "x".repeat(300));
        let name = archive_file_name(&long);
        assert!(name.len() <= 255);
        assert!(name.ends_with("[4242].cbz"));
    }

    #[test]
    fn test_archive_file_name_trims_multibyte_on_char_boundary() {
        let long = "日".repeat(120);
        let name = archive_file_name(&long);
        assert!(name.len() <= 255);
        assert!(name.ends_with(".cbz"));
    }
}
