//! Tag-to-version resolution against semantic-version constraints.

use semver::{Version, VersionReq};

use crate::error::{DistributorError, Result};
use crate::reference::decode_tag;

/// Resolve a version request against an ordered list of tags.
///
/// An empty request matches any released version. A byte-exact tag match
/// wins before constraint parsing, so a tag that is not valid semver can
/// still be requested literally. Otherwise the request is parsed as a
/// constraint and the first tag (in the given order) whose parsed version
/// satisfies it is returned; tags that are not strict semver are skipped.
pub fn resolve_tag(tags: &[String], version: &str) -> Result<String> {
    let constraint = if version.is_empty() {
        VersionReq::STAR
    } else {
        if let Some(exact) = tags.iter().find(|tag| tag.as_str() == version) {
            return Ok(exact.clone());
        }
        VersionReq::parse(version).map_err(|err| DistributorError::InvalidVersionConstraint {
            constraint: version.to_string(),
            reason: err.to_string(),
        })?
    };

    for tag in tags {
        if let Ok(parsed) = Version::parse(tag) {
            if constraint.matches(&parsed) {
                return Ok(tag.clone());
            }
        }
    }

    Err(DistributorError::NoMatchingVersion(version.to_string()))
}

/// All semver-compliant tags sorted by descending version precedence.
///
/// Tags are read back from the registry encoding (`_` restored to `+`)
/// before parsing; anything that still fails a strict semver parse is
/// excluded from the sorted view.
pub fn sorted_tags(tags: &[String]) -> Vec<String> {
    let mut versions: Vec<Version> = tags
        .iter()
        .filter_map(|tag| Version::parse(&decode_tag(tag)).ok())
        .collect();
    versions.sort();
    versions.reverse();
    versions.into_iter().map(|v| v.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_caret_constraint_matches_in_order() {
        let available = tags(&["1.0.0", "1.2.0", "2.0.0"]);
        assert_eq!(resolve_tag(&available, "^1.0.0").unwrap(), "1.2.0");
    }

    #[test]
    fn test_empty_request_empty_tags() {
        let err = resolve_tag(&[], "").unwrap_err();
        assert!(matches!(err, DistributorError::NoMatchingVersion(_)));
    }

    #[test]
    fn test_empty_request_takes_first_released() {
        let available = tags(&["0.9.0", "1.0.0"]);
        assert_eq!(resolve_tag(&available, "").unwrap(), "0.9.0");
    }

    #[test]
    fn test_exact_match_wins_over_constraint_parsing() {
        // Not valid semver, but present byte-for-byte in the tag list.
        let available = tags(&["latest", "1.0.0"]);
        assert_eq!(resolve_tag(&available, "latest").unwrap(), "latest");
    }

    #[test]
    fn test_exact_match_checked_before_semver_iteration() {
        let available = tags(&["2.0.0", "1.0.0"]);
        assert_eq!(resolve_tag(&available, "1.0.0").unwrap(), "1.0.0");
    }

    #[test]
    fn test_unparsable_constraint() {
        let available = tags(&["1.0.0"]);
        let err = resolve_tag(&available, "not-a-version").unwrap_err();
        assert!(matches!(err, DistributorError::InvalidVersionConstraint { .. }));
    }

    #[test]
    fn test_unparsable_tags_skipped() {
        let available = tags(&["latest", "1.5.0"]);
        assert_eq!(resolve_tag(&available, ">=1.0.0").unwrap(), "1.5.0");
    }

    #[test]
    fn test_no_matching_version() {
        let available = tags(&["1.0.0", "1.2.0"]);
        let err = resolve_tag(&available, ">=3.0.0").unwrap_err();
        assert!(matches!(err, DistributorError::NoMatchingVersion(_)));
    }

    #[test]
    fn test_release_constraint_skips_prereleases() {
        let available = tags(&["1.0.0-alpha.1", "1.0.0"]);
        assert_eq!(resolve_tag(&available, ">0.0.0-0").unwrap(), "1.0.0");
    }

    #[test]
    fn test_determinism() {
        let available = tags(&["1.0.0", "1.2.0", "1.4.0"]);
        let first = resolve_tag(&available, "^1.0.0").unwrap();
        for _ in 0..10 {
            assert_eq!(resolve_tag(&available, "^1.0.0").unwrap(), first);
        }
    }

    #[test]
    fn test_sorted_tags_descending() {
        let available = tags(&["1.0.0", "2.1.0", "0.4.2", "not-semver"]);
        assert_eq!(sorted_tags(&available), vec!["2.1.0", "1.0.0", "0.4.2"]);
    }

    #[test]
    fn test_sorted_tags_restore_build_metadata() {
        let available = tags(&["1.0.0_build5", "0.9.0"]);
        assert_eq!(sorted_tags(&available), vec!["1.0.0+build5", "0.9.0"]);
    }
}
