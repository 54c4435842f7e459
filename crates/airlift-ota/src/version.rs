use std::cmp::Ordering;
use std::fmt;

/// Three-component update version with lenient parsing.
///
/// Control-plane version strings are not trusted to be well formed: a missing
/// or non-numeric component parses as `0` and parsing never fails, so version
/// comparison degrades gracefully instead of blocking an update on bad data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UpdateVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl UpdateVersion {
    #[must_use]
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version string, treating missing or malformed components as 0.
    ///
    /// Accepts an optional `v` prefix and surrounding whitespace. Components
    /// beyond the third are ignored.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);

        let mut parts = trimmed.split('.');
        let component = |part: Option<&str>| -> u32 {
            part.and_then(|value| value.trim().parse().ok()).unwrap_or(0)
        };

        Self {
            major: component(parts.next()),
            minor: component(parts.next()),
            patch: component(parts.next()),
        }
    }
}

impl Ord for UpdateVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
    }
}

impl PartialOrd for UpdateVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for UpdateVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Whether `candidate` is strictly newer than `current`.
#[must_use]
pub fn is_newer(candidate: &str, current: &str) -> bool {
    UpdateVersion::parse(candidate) > UpdateVersion::parse(current)
}

/// Whether `host_version` satisfies `min_version`.
#[must_use]
pub fn is_compatible(host_version: &str, min_version: &str) -> bool {
    UpdateVersion::parse(host_version) >= UpdateVersion::parse(min_version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_version() {
        let version = UpdateVersion::parse("2.11.3");
        assert_eq!(version, UpdateVersion::new(2, 11, 3));
    }

    #[test]
    fn parse_tolerates_prefix_and_whitespace() {
        assert_eq!(
            UpdateVersion::parse("  v1.4.0  "),
            UpdateVersion::new(1, 4, 0)
        );
    }

    #[test]
    fn missing_components_default_to_zero() {
        assert_eq!(UpdateVersion::parse("2"), UpdateVersion::new(2, 0, 0));
        assert_eq!(UpdateVersion::parse("2.1"), UpdateVersion::new(2, 1, 0));
        assert_eq!(UpdateVersion::parse(""), UpdateVersion::new(0, 0, 0));
    }

    #[test]
    fn malformed_components_default_to_zero() {
        assert_eq!(
            UpdateVersion::parse("2.x.9"),
            UpdateVersion::new(2, 0, 9)
        );
        assert_eq!(
            UpdateVersion::parse("beta.1.1"),
            UpdateVersion::new(0, 1, 1)
        );
    }

    #[test]
    fn extra_components_are_ignored() {
        assert_eq!(
            UpdateVersion::parse("1.2.3.4"),
            UpdateVersion::new(1, 2, 3)
        );
    }

    #[test]
    fn is_newer_compares_tuples_lexicographically() {
        assert!(is_newer("1.0.1", "1.0.0"));
        assert!(is_newer("1.1.0", "1.0.9"));
        assert!(is_newer("2.0.0", "1.9.9"));
        assert!(!is_newer("1.0.0", "1.0.0"));
        assert!(!is_newer("1.0.0", "1.0.1"));
    }

    #[test]
    fn is_newer_matches_normalized_comparison() {
        // Comparing raw strings must agree with comparing their normalized
        // forms, where normalization maps bad components to 0.
        let cases = [
            ("1.x.2", "1.0.2"),
            ("2", "2.0.0"),
            ("v3.1", "3.1.0"),
            ("", "0.0.0"),
        ];
        for (raw, normalized) in cases {
            assert!(
                !is_newer(raw, normalized) && !is_newer(normalized, raw),
                "{raw} should compare equal to {normalized}"
            );
        }
    }

    #[test]
    fn is_compatible_allows_equal_and_newer_hosts() {
        assert!(is_compatible("1.2.0", "1.2.0"));
        assert!(is_compatible("1.3.0", "1.2.9"));
        assert!(!is_compatible("1.1.9", "1.2.0"));
    }

    #[test]
    fn display_round_trips() {
        let version = UpdateVersion::new(10, 0, 7);
        assert_eq!(UpdateVersion::parse(&version.to_string()), version);
    }
}
