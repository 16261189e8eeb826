//! Junk-signature learning from archive build history.
//!
//! A page image is classified as junk (ad/spam filler) purely from rebuild
//! behavior: when a digest that shipped in an earlier archive build of the
//! same gallery lineage is missing from a later build, the operator dropped
//! it on purpose and the digest becomes a junk signature. A digest that has
//! been present in every build so far is never junk; silence is not a
//! signal. Signatures are keyed by content digest alone, so the same filler
//! image recurring in a different gallery is excluded there too.
//!
//! Learning is monotonic: nothing here (or anywhere else) unlearns a
//! signature. A false positive has to be repaired by hand in the catalog.

use std::collections::HashSet;

/// Derive junk signatures from the member-set history of one gallery
/// lineage, ordered oldest build first.
///
/// Returns every digest that was present in some build and absent from a
/// later one, in first-learned order.
pub fn learn_junk(history: &[Vec<String>]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut junk: Vec<String> = Vec::new();
    for build in history {
        let current: HashSet<&str> = build.iter().map(String::as_str).collect();
        for digest in &seen {
            if !current.contains(digest.as_str()) && !junk.iter().any(|known| known == digest) {
                junk.push(digest.clone());
            }
        }
        seen.extend(build.iter().cloned());
    }
    junk
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(digests: &[&str]) -> Vec<String> {
        digests.iter().map(|digest| digest.to_string()).collect()
    }

    #[test]
    fn test_dropped_digest_becomes_junk() {
        let history = [build(&["a", "b", "c"]), build(&["a", "b"])];
        assert_eq!(learn_junk(&history), vec!["c".to_string()]);
    }

    #[test]
    fn test_present_everywhere_is_never_junk() {
        let history = [build(&["a", "b"]), build(&["a", "b"]), build(&["a", "b"])];
        assert!(learn_junk(&history).is_empty());
    }

    #[test]
    fn test_single_build_learns_nothing() {
        assert!(learn_junk(&[build(&["a", "b"])]).is_empty());
    }

    #[test]
    fn test_reappearing_digest_stays_junk() {
        // Dropped in build 2, back in build 3: the explicit exclusion wins.
        let history = [build(&["a", "junk"]), build(&["a"]), build(&["a", "junk"])];
        assert_eq!(learn_junk(&history), vec!["junk".to_string()]);
    }

    #[test]
    fn test_later_addition_then_drop() {
        let history = [build(&["a"]), build(&["a", "b"]), build(&["a"])];
        assert_eq!(learn_junk(&history), vec!["b".to_string()]);
    }
}
