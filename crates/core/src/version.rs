//! Semantic-version-like product version.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_object::ValueObject;

/// `major.minor.patch` version of a catalog entry.
///
/// Ordering is numeric per component, so `1.10.0 > 1.9.3`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductVersion {
    major: u32,
    minor: u32,
    patch: u32,
}

impl ProductVersion {
    pub const INITIAL: ProductVersion = ProductVersion::new(1, 0, 0);
    pub const MAX: ProductVersion = ProductVersion::new(u32::MAX, u32::MAX, u32::MAX);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn patch(&self) -> u32 {
        self.patch
    }

    /// Next patch revision (`1.2.3 -> 1.2.4`).
    ///
    /// An exhausted patch carries into minor, and minor into major
    /// (`1.2.4294967295 -> 1.3.0`). Only `MAX` has no successor.
    pub fn bump_patch(self) -> Result<Self, DomainError> {
        if let Some(patch) = self.patch.checked_add(1) {
            return Ok(Self::new(self.major, self.minor, patch));
        }
        if let Some(minor) = self.minor.checked_add(1) {
            return Ok(Self::new(self.major, minor, 0));
        }
        self.major
            .checked_add(1)
            .map(|major| Self::new(major, 0, 0))
            .ok_or_else(|| DomainError::validation(format!("version {self} cannot be incremented")))
    }
}

impl Default for ProductVersion {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl ValueObject for ProductVersion {}

impl core::fmt::Display for ProductVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ProductVersion {
    type Err = DomainError;

    /// Accepts `MAJOR`, `MAJOR.MINOR` or `MAJOR.MINOR.PATCH`; missing parts are zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches(['v', 'V']);
        if trimmed.is_empty() {
            return Err(DomainError::validation("version cannot be empty"));
        }

        let mut parts = [0u32; 3];
        let mut count = 0;
        for raw in trimmed.split('.') {
            if count == 3 {
                return Err(DomainError::validation(format!(
                    "version '{s}' has more than three components"
                )));
            }
            parts[count] = raw.parse::<u32>().map_err(|_| {
                DomainError::validation(format!("version '{s}' has a non-numeric component"))
            })?;
            count += 1;
        }

        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl TryFrom<String> for ProductVersion {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProductVersion> for String {
    fn from(value: ProductVersion) -> Self {
        value.to_string()
    }
}
