use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Oldest host release the ledger runs on.
pub const MIN_SUPPORTED: HostVersion = HostVersion {
    major: 6,
    minor: 3,
    release: 5,
};

/// Newest host major version the ledger has been tested against.
pub const MAX_TESTED_MAJOR: u32 = 15;

/// A host application version such as `13.2v4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostVersion {
    pub major: u32,
    pub minor: u32,
    pub release: u32,
}

impl fmt::Display for HostVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}v{}", self.major, self.minor, self.release)
    }
}

impl FromStr for HostVersion {
    type Err = String;

    /// Accepts `MAJOR.MINORvRELEASE`, `MAJOR.MINOR` and `MAJOR`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid host version: {:?}", s);
        let s = s.trim();

        let (numbers, release) = match s.split_once('v') {
            Some((numbers, release)) => (numbers, release.parse().map_err(|_| invalid())?),
            None => (s, 0),
        };
        let (major, minor) = match numbers.split_once('.') {
            Some((major, minor)) => (major, minor.parse().map_err(|_| invalid())?),
            None => (numbers, 0),
        };
        let major = major.parse().map_err(|_| invalid())?;

        Ok(Self {
            major,
            minor,
            release,
        })
    }
}

/// How well the ledger supports a host version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compatibility {
    /// Older than [`MIN_SUPPORTED`]; the ledger refuses to start.
    Unsupported,
    Supported,
    /// Newer than anything tested. `show_dialog` asks for a visible warning
    /// instead of a log line.
    Untested { show_dialog: bool },
}

/// Classify `version`. Warnings for untested versions are raised as a dialog
/// once the major version reaches `dialog_min_version`.
pub fn check_compatibility(version: HostVersion, dialog_min_version: u32) -> Compatibility {
    if version < MIN_SUPPORTED {
        tracing::error!(
            "Host version {} is not supported, {} or newer is required",
            version,
            MIN_SUPPORTED
        );
        Compatibility::Unsupported
    } else if version.major > MAX_TESTED_MAJOR {
        let show_dialog = version.major >= dialog_min_version;
        tracing::warn!("Host version {} has not been tested with the ledger", version);
        Compatibility::Untested { show_dialog }
    } else {
        Compatibility::Supported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> HostVersion {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(v("13.2v4"), HostVersion { major: 13, minor: 2, release: 4 });
        assert_eq!(v("12.1"), HostVersion { major: 12, minor: 1, release: 0 });
        assert_eq!(v("11"), HostVersion { major: 11, minor: 0, release: 0 });
        assert!("x.2".parse::<HostVersion>().is_err());
        assert!("".parse::<HostVersion>().is_err());
    }

    #[test]
    fn test_old_releases_are_unsupported() {
        assert_eq!(check_compatibility(v("6.3v4"), 16), Compatibility::Unsupported);
        assert_eq!(check_compatibility(v("6.3v5"), 16), Compatibility::Supported);
    }

    #[test]
    fn test_untested_dialog_threshold() {
        assert_eq!(
            check_compatibility(v("16.0v1"), 17),
            Compatibility::Untested { show_dialog: false }
        );
        assert_eq!(
            check_compatibility(v("17.0v1"), 17),
            Compatibility::Untested { show_dialog: true }
        );
    }
}
