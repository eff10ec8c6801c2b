use crate::error::{InstallError, Result};
use std::fmt;
use std::str::FromStr;

/// Dotted numeric version, e.g. "1.21.6" or "2.10".
///
/// Comparison is component-by-component with missing trailing components
/// treated as zero, so "1.18" and "1.18.0" are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    components: Vec<u64>,
}

impl Version {
    pub fn new(components: Vec<u64>) -> Self {
        Self { components }
    }

    pub fn components(&self) -> &[u64] {
        &self.components
    }

    fn component(&self, index: usize) -> u64 {
        self.components.get(index).copied().unwrap_or(0)
    }

    /// Whether this version meets the given minimum (inclusive).
    pub fn satisfies(&self, minimum: &Version) -> bool {
        let width = self.components.len().max(minimum.components.len());
        for i in 0..width {
            match self.component(i).cmp(&minimum.component(i)) {
                std::cmp::Ordering::Greater => return true,
                std::cmp::Ordering::Less => return false,
                std::cmp::Ordering::Equal => continue,
            }
        }
        // Equal versions satisfy the minimum.
        true
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.components.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl FromStr for Version {
    type Err = InstallError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(InstallError::InvalidVersion(s.to_string()));
        }

        let components = trimmed
            .split('.')
            .map(|part| {
                part.trim()
                    .parse::<u64>()
                    .map_err(|_| InstallError::InvalidVersion(s.to_string()))
            })
            .collect::<Result<Vec<u64>>>()?;

        Ok(Version { components })
    }
}

/// Pull a version out of command output such as "go version go1.21.6 linux/amd64"
/// or "jq-1.7.1". Scans whitespace-separated tokens, strips any non-numeric
/// prefix (v, go, jq-), and returns the first token that parses.
pub fn extract_version(output: &str) -> Option<Version> {
    for token in output.split_whitespace() {
        let Some(start) = token.find(|c: char| c.is_ascii_digit()) else {
            continue;
        };
        let candidate = &token[start..];
        // Cut trailing junk after the numeric run, e.g. "1.7.1-dirty".
        let end = candidate
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(candidate.len());
        let candidate = candidate[..end].trim_end_matches('.');
        if let Ok(version) = candidate.parse::<Version>() {
            return Some(version);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        let v = "1.21.6".parse::<Version>().unwrap();
        assert_eq!(v.components(), &[1, 21, 6]);

        let v = "2.10".parse::<Version>().unwrap();
        assert_eq!(v.components(), &[2, 10]);

        assert!("1.x.3".parse::<Version>().is_err());
        assert!("".parse::<Version>().is_err());
        assert!("beta".parse::<Version>().is_err());
    }

    #[test]
    fn test_satisfies_is_reflexive() {
        for raw in ["1.18", "1.21.6", "0.0.1", "10"] {
            let v = raw.parse::<Version>().unwrap();
            assert!(v.satisfies(&v), "{raw} should satisfy itself");
        }
    }

    #[test]
    fn test_satisfies_componentwise() {
        let min = "1.18".parse::<Version>().unwrap();

        assert!("1.21.6".parse::<Version>().unwrap().satisfies(&min));
        assert!("1.18".parse::<Version>().unwrap().satisfies(&min));
        assert!("1.18.0".parse::<Version>().unwrap().satisfies(&min));
        assert!("2.0".parse::<Version>().unwrap().satisfies(&min));
        assert!(!"1.10.0".parse::<Version>().unwrap().satisfies(&min));
        assert!(!"0.99.99".parse::<Version>().unwrap().satisfies(&min));
    }

    #[test]
    fn test_missing_components_are_zero() {
        let a = "1.18".parse::<Version>().unwrap();
        let b = "1.18.0.0".parse::<Version>().unwrap();
        assert!(a.satisfies(&b));
        assert!(b.satisfies(&a));

        let min = "1.18.1".parse::<Version>().unwrap();
        assert!(!a.satisfies(&min));
    }

    #[test]
    fn test_component_magnitude_beats_string_order() {
        // "1.9" < "1.10" numerically even though "9" > "1" as text.
        let min = "1.9".parse::<Version>().unwrap();
        assert!("1.10".parse::<Version>().unwrap().satisfies(&min));
    }

    #[test]
    fn test_extract_version() {
        let v = extract_version("go version go1.21.6 linux/amd64").unwrap();
        assert_eq!(v.to_string(), "1.21.6");

        let v = extract_version("jq-1.7.1").unwrap();
        assert_eq!(v.to_string(), "1.7.1");

        let v = extract_version("git version 2.43.0").unwrap();
        assert_eq!(v.to_string(), "2.43.0");

        let v = extract_version("captaincore v1.2.3").unwrap();
        assert_eq!(v.to_string(), "1.2.3");

        assert!(extract_version("no digits here").is_none());
    }
}
