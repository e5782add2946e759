//! Version resolution for the framework component
//!
//! Turns a sparse user query ("", a major number, an exact tag, anything
//! else) into exactly one release tag drawn from the remote tag list.
//! Resolution is a pure function of the candidate set and the query.

use std::cmp::Ordering;
use std::sync::OnceLock;

use regex::Regex;
use semver::Version;
use serde::Serialize;
use thiserror::Error;

use crate::config::defaults::PRERELEASE_MARKERS;

/// Errors related to version resolution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// Query matches several tags and none exactly
    #[error("'{query}' is ambiguous; it matches {}. Use an exact tag or a major version number.", matches.join(", "))]
    AmbiguousQuery { query: String, matches: Vec<String> },

    /// Nothing satisfies the query
    #[error("No release matches '{query}'{}", format_matches(matches))]
    NotFound { query: String, matches: Vec<String> },
}

impl VersionError {
    /// Tags partially matching the query, for display
    pub fn matches(&self) -> &[String] {
        match self {
            Self::AmbiguousQuery { matches, .. } | Self::NotFound { matches, .. } => matches,
        }
    }
}

fn format_matches(matches: &[String]) -> String {
    if matches.is_empty() {
        String::new()
    } else {
        format!(" (similar tags: {})", matches.join(", "))
    }
}

/// Stability classification of a release tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stability {
    /// Eligible for automatic selection
    Stable,
    /// Development, release candidate, alpha or beta
    Prerelease,
}

/// One release tag and its classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionCandidate {
    identifier: String,
    stability: Stability,
    #[serde(skip)]
    version: Option<Version>,
}

impl VersionCandidate {
    /// Classify a raw tag
    pub fn from_tag(tag: &str) -> Self {
        let version = parse_tag_version(tag);
        let stability = if version.is_some() && !has_prerelease_marker(tag) {
            Stability::Stable
        } else {
            Stability::Prerelease
        };
        Self {
            identifier: tag.to_string(),
            stability,
            version,
        }
    }

    /// The tag itself
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Stability classification
    pub fn stability(&self) -> Stability {
        self.stability
    }

    /// Whether the candidate is eligible for automatic selection
    pub fn is_stable(&self) -> bool {
        self.stability == Stability::Stable
    }

    /// Numeric version, if the tag carries one
    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// Major version component
    pub fn major(&self) -> Option<u64> {
        self.version.as_ref().map(|v| v.major)
    }
}

/// Build candidates from raw tags
pub fn candidates_from_tags<I, S>(tags: I) -> Vec<VersionCandidate>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| VersionCandidate::from_tag(t.as_ref()))
        .collect()
}

fn tag_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[^0-9]*?(\d+)(?:\.(\d+))?(?:\.(\d+))?").ok())
        .as_ref()
}

/// Extract `major.minor.patch` from a tag such as `n6.1.2`, `v1.0` or `nasm-2.16.03`
///
/// Missing components count as zero.
pub fn parse_tag_version(tag: &str) -> Option<Version> {
    let caps = tag_pattern()?.captures(tag)?;
    let part = |i: usize| -> Option<u64> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    Some(Version::new(part(1)?, part(2)?, part(3)?))
}

fn has_prerelease_marker(tag: &str) -> bool {
    let lower = tag.to_lowercase();
    PRERELEASE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Version-ordering comparator
///
/// Numeric major/minor/patch first; candidates without a version sort lowest;
/// ties fall back to the identifier so the order is total.
pub fn compare_candidates(a: &VersionCandidate, b: &VersionCandidate) -> Ordering {
    a.version
        .cmp(&b.version)
        .then_with(|| a.identifier.cmp(&b.identifier))
}

/// Sort candidates in ascending version order
pub fn sort_candidates(candidates: &mut [VersionCandidate]) {
    candidates.sort_by(compare_candidates);
}

/// Stable candidates, ascending
pub fn stable_candidates(candidates: &[VersionCandidate]) -> Vec<VersionCandidate> {
    let mut stable: Vec<VersionCandidate> =
        candidates.iter().filter(|c| c.is_stable()).cloned().collect();
    sort_candidates(&mut stable);
    stable
}

/// Resolve `query` to exactly one candidate
///
/// - empty: newest stable release
/// - bare integer: newest stable release with that major version
/// - exact tag (stable or not): that tag
/// - anything else fails; substring matches are reported, never selected
pub fn resolve_version(
    candidates: &[VersionCandidate],
    query: &str,
) -> Result<VersionCandidate, VersionError> {
    let query = query.trim();
    let stable = stable_candidates(candidates);

    if query.is_empty() {
        return stable.last().cloned().ok_or_else(|| VersionError::NotFound {
            query: "latest stable".to_string(),
            matches: Vec::new(),
        });
    }

    if query.bytes().all(|b| b.is_ascii_digit()) {
        let major: Option<u64> = query.parse().ok();
        return stable
            .iter()
            .rev()
            .find(|c| major.is_some() && c.major() == major)
            .cloned()
            .ok_or_else(|| VersionError::NotFound {
                query: query.to_string(),
                matches: substring_matches(candidates, query),
            });
    }

    if let Some(exact) = candidates.iter().find(|c| c.identifier == query) {
        return Ok(exact.clone());
    }

    let matches = substring_matches(candidates, query);
    if matches.len() > 1 {
        Err(VersionError::AmbiguousQuery {
            query: query.to_string(),
            matches,
        })
    } else {
        Err(VersionError::NotFound {
            query: query.to_string(),
            matches,
        })
    }
}

/// Identifiers containing `query` (case-insensitive), newest first
pub fn substring_matches(candidates: &[VersionCandidate], query: &str) -> Vec<String> {
    let needle = query.to_lowercase();
    let mut matching: Vec<VersionCandidate> = candidates
        .iter()
        .filter(|c| c.identifier.to_lowercase().contains(&needle))
        .cloned()
        .collect();
    sort_candidates(&mut matching);
    let mut identifiers: Vec<String> = matching.into_iter().rev().map(|c| c.identifier).collect();
    identifiers.dedup();
    identifiers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::generators::{prerelease_tag, release_tag};
    use proptest::prelude::*;

    fn set(tags: &[&str]) -> Vec<VersionCandidate> {
        candidates_from_tags(tags.iter().copied())
    }

    #[test]
    fn test_parse_tag_version_prefixes() {
        assert_eq!(parse_tag_version("n6.1.2"), Some(Version::new(6, 1, 2)));
        assert_eq!(parse_tag_version("v1.15.0"), Some(Version::new(1, 15, 0)));
        assert_eq!(parse_tag_version("nasm-2.16.03"), Some(Version::new(2, 16, 3)));
        assert_eq!(parse_tag_version("n7.1"), Some(Version::new(7, 1, 0)));
        assert_eq!(parse_tag_version("4"), Some(Version::new(4, 0, 0)));
        assert_eq!(parse_tag_version("release"), None);
    }

    #[test]
    fn test_classification() {
        assert!(VersionCandidate::from_tag("n6.1.1").is_stable());
        assert!(!VersionCandidate::from_tag("n7.1-dev").is_stable());
        assert!(!VersionCandidate::from_tag("n4.0-rc1").is_stable());
        assert!(!VersionCandidate::from_tag("v2.0-alpha").is_stable());
        assert!(!VersionCandidate::from_tag("v2.0-BETA3").is_stable());
        assert!(!VersionCandidate::from_tag("snapshot").is_stable());
    }

    #[test]
    fn test_numeric_not_lexical_ordering() {
        let mut candidates = set(&["n6.1.9", "n6.1.10", "n6.1.2"]);
        sort_candidates(&mut candidates);
        let order: Vec<&str> = candidates.iter().map(VersionCandidate::identifier).collect();
        assert_eq!(order, vec!["n6.1.2", "n6.1.9", "n6.1.10"]);
    }

    #[test]
    fn test_empty_query_returns_newest_stable() {
        let candidates = set(&["n6.1.1", "n7.0.2", "n6.9.0"]);
        let resolved = resolve_version(&candidates, "").unwrap();
        assert_eq!(resolved.identifier(), "n7.0.2");
    }

    #[test]
    fn test_empty_query_ignores_prereleases() {
        let candidates = set(&["n6.1.1", "n8.0-dev", "n7.1-rc1"]);
        let resolved = resolve_version(&candidates, "  ").unwrap();
        assert_eq!(resolved.identifier(), "n6.1.1");
    }

    #[test]
    fn test_empty_query_without_stable_fails() {
        let candidates = set(&["n8.0-dev"]);
        assert!(matches!(
            resolve_version(&candidates, ""),
            Err(VersionError::NotFound { .. })
        ));
        assert!(matches!(
            resolve_version(&[], ""),
            Err(VersionError::NotFound { .. })
        ));
    }

    #[test]
    fn test_major_query_picks_newest_in_major() {
        let candidates = set(&["n6.1.1", "n6.9.0", "n7.0.2"]);
        let resolved = resolve_version(&candidates, "6").unwrap();
        assert_eq!(resolved.identifier(), "n6.9.0");
    }

    #[test]
    fn test_major_query_without_match_fails() {
        let candidates = set(&["n6.1.1", "n7.0.2"]);
        assert!(matches!(
            resolve_version(&candidates, "5"),
            Err(VersionError::NotFound { .. })
        ));
    }

    #[test]
    fn test_major_query_skips_prereleases() {
        let candidates = set(&["n7.0.2", "n7.1-dev"]);
        let resolved = resolve_version(&candidates, "7").unwrap();
        assert_eq!(resolved.identifier(), "n7.0.2");
    }

    #[test]
    fn test_exact_match_bypasses_stability_filter() {
        let candidates = set(&["n6.1.1", "n7.1-dev"]);
        let resolved = resolve_version(&candidates, "n7.1-dev").unwrap();
        assert_eq!(resolved.identifier(), "n7.1-dev");
        assert_eq!(resolved.stability(), Stability::Prerelease);
    }

    #[test]
    fn test_exact_match_of_stable_tag() {
        let candidates = set(&["n6.1.1", "n6.9.0", "n7.0.2"]);
        let resolved = resolve_version(&candidates, "n7.0.2").unwrap();
        assert_eq!(resolved.identifier(), "n7.0.2");
    }

    #[test]
    fn test_unknown_query_not_found() {
        let candidates = set(&["n6.1.1", "n6.9.0", "n7.0.2"]);
        let err = resolve_version(&candidates, "zzz").unwrap_err();
        assert_eq!(
            err,
            VersionError::NotFound {
                query: "zzz".to_string(),
                matches: vec![],
            }
        );
    }

    #[test]
    fn test_substring_is_reported_not_selected() {
        let candidates = set(&["n6.1.1", "n6.1.2", "n7.0.2"]);
        let err = resolve_version(&candidates, "6.1").unwrap_err();
        assert_eq!(
            err,
            VersionError::AmbiguousQuery {
                query: "6.1".to_string(),
                matches: vec!["n6.1.2".to_string(), "n6.1.1".to_string()],
            }
        );

        let err = resolve_version(&candidates, "7.0").unwrap_err();
        assert_eq!(
            err,
            VersionError::NotFound {
                query: "7.0".to_string(),
                matches: vec!["n7.0.2".to_string()],
            }
        );
        assert_eq!(err.matches(), ["n7.0.2".to_string()]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_empty_query_returns_maximum(tags in prop::collection::vec(release_tag(), 1..30)) {
            let candidates = candidates_from_tags(&tags);
            let resolved = resolve_version(&candidates, "").unwrap();
            let max = candidates
                .iter()
                .max_by(|a, b| compare_candidates(a, b))
                .unwrap();
            prop_assert_eq!(resolved.identifier(), max.identifier());
        }

        #[test]
        fn prop_automatic_selection_never_picks_prerelease(
            stable in prop::collection::vec(release_tag(), 0..10),
            unstable in prop::collection::vec(prerelease_tag(), 1..10),
        ) {
            let candidates = candidates_from_tags(stable.iter().chain(unstable.iter()));
            match resolve_version(&candidates, "") {
                Ok(resolved) => prop_assert!(resolved.is_stable()),
                Err(_) => prop_assert!(stable.is_empty()),
            }
        }

        #[test]
        fn prop_resolution_is_order_independent(
            tags in prop::collection::vec(release_tag(), 1..30),
            query in prop_oneof![Just(String::new()), "[0-9]", "n[0-9]\\.[0-9]"],
        ) {
            let forward = candidates_from_tags(&tags);
            let mut reversed = forward.clone();
            reversed.reverse();
            prop_assert_eq!(
                resolve_version(&forward, &query),
                resolve_version(&reversed, &query)
            );
        }

        #[test]
        fn prop_exact_query_always_returns_itself(tags in prop::collection::vec(release_tag(), 1..30)) {
            let candidates = candidates_from_tags(&tags);
            for tag in &tags {
                let resolved = resolve_version(&candidates, tag).unwrap();
                if tag.bytes().all(|b| b.is_ascii_digit()) {
                    continue;
                }
                prop_assert_eq!(resolved.identifier(), tag.as_str());
            }
        }
    }
}
