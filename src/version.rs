//! Release tag parsing and numeric version precedence
//!
//! Tags look like `v1.5.0`, `1.10` or `V2.0.0.1`. A leading `v`/`V` is stripped and the
//! remainder is compared component by component as integers, so `0.10.0` is newer
//! than `0.9.0`. Missing trailing components count as zero.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Sentinel reported when nothing is installed
pub const NONE_INSTALLED: &str = "0.0.0";

/// A dotted numeric version
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Version {
    components: Vec<u64>,
}

/// Why a tag could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version tag {tag:?}: {reason}")]
pub struct ParseVersionError {
    tag: String,
    reason: &'static str,
}

impl Version {
    /// Numeric components in order
    pub fn components(&self) -> &[u64] {
        &self.components
    }

    fn component(&self, index: usize) -> u64 {
        self.components.get(index).copied().unwrap_or(0)
    }
}

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let err = |reason| ParseVersionError {
            tag: tag.to_string(),
            reason,
        };

        let trimmed = tag.trim().trim_start_matches(['v', 'V']);
        if trimmed.is_empty() {
            return Err(err("empty"));
        }

        let components = trimmed
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(err("components must be unsigned integers"));
                }
                part.parse::<u64>().map_err(|_| err("component out of range"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { components })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.components.iter().map(u64::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// Whether `candidate` is strictly newer than `current`
///
/// Returns an error if either tag is not a dotted numeric version.
pub fn is_newer(candidate: &str, current: &str) -> Result<bool, ParseVersionError> {
    let candidate: Version = candidate.parse()?;
    let current: Version = current.parse()?;
    Ok(candidate > current)
}
