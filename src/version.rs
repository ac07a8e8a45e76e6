//! Release version tokens and their ordering
//!
//! Tokens look like `v1.2.0-rc1`: an optional leading `v`, dot-separated
//! numeric components and an optional pre-release suffix. A pre-release sorts
//! before its release counterpart.

use std::cmp::Ordering;

/// A parsed version token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    components: Vec<u64>,
    pre_release: Option<String>,
}

impl Version {
    /// Parse a token such as `v1.0`, `1.2.3` or `2.0.0-rc1`.
    ///
    /// Returns `None` when any numeric component is missing or non-numeric.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        let token = token.strip_prefix(['v', 'V']).unwrap_or(token);
        let (core, pre_release) = match token.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre.to_string())),
            Some(_) => return None,
            None => (token, None),
        };
        if core.is_empty() {
            return None;
        }
        let mut components = Vec::new();
        for part in core.split('.') {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            components.push(part.parse().ok()?);
        }
        Some(Version {
            components,
            pre_release,
        })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for i in 0..len {
            let a = self.components.get(i).copied().unwrap_or(0);
            let b = other.components.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                decided => return decided,
            }
        }
        match (&self.pre_release, &other.pre_release) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Total order over raw tokens.
///
/// Parseable pairs compare numerically; anything else falls back to a plain
/// string comparison so the order stays total.
pub fn compare(a: &str, b: &str) -> Ordering {
    match (Version::parse(a), Version::parse(b)) {
        (Some(left), Some(right)) => left.cmp(&right),
        _ => a.cmp(b),
    }
}

/// True iff both tokens parse and `candidate` is strictly newer than `current`.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    match (Version::parse(candidate), Version::parse(current)) {
        (Some(candidate), Some(current)) => candidate > current,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_v_and_zero_padding_are_ignored() {
        assert_eq!(compare("v1.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare("V2.1", "2.1.0.0"), Ordering::Equal);
    }

    #[test]
    fn components_compare_numerically() {
        assert_eq!(compare("1.10.0", "1.9.9"), Ordering::Greater);
        assert_eq!(compare("v2", "v1.9"), Ordering::Greater);
        assert_eq!(compare("0.1", "1.0"), Ordering::Less);
    }

    #[test]
    fn pre_release_sorts_before_release() {
        assert_eq!(compare("1.2.0-rc1", "1.2.0"), Ordering::Less);
        assert_eq!(compare("1.2.0-rc1", "1.2.0-rc2"), Ordering::Less);
        assert_eq!(compare("1.2.0-rc1", "1.1.9"), Ordering::Greater);
    }

    #[test]
    fn unparseable_tokens_fall_back_to_string_order() {
        assert_eq!(compare("abc", "abd"), Ordering::Less);
        assert_eq!(compare("nightly", "nightly"), Ordering::Equal);
    }

    #[test]
    fn is_newer_requires_both_sides_to_parse() {
        assert!(is_newer("v1.0.1", "v1.0"));
        assert!(!is_newer("v1.0", "v1.0"));
        assert!(!is_newer("v0.9", "v1.0"));
        assert!(!is_newer("nightly", "v1.0"));
        assert!(!is_newer("v2.0", "dev"));
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(Version::parse("").is_none());
        assert!(Version::parse("1..2").is_none());
        assert!(Version::parse("1.x").is_none());
        assert!(Version::parse("1.0-").is_none());
    }
}
