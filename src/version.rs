//! Robot software version model.
//!
//! The robot reports a version string such as `"3.1.0"`. Development
//! builds report an arbitrary tag (branch name, commit hash) that does
//! not parse as three dot-separated integers; those are modeled as
//! [`RobotVersion::Development`] and order AFTER every release, since a
//! dev build always carries at least everything the latest release has.
//!
//! All release-vs-development policy lives on this type. Callers gate
//! feature fallbacks on [`RobotVersion::cmp`] and on nothing else.

use core::cmp::Ordering;
use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RobotVersion {
    Release { major: u32, minor: u32, patch: u32 },
    /// Unparseable version tag; treated as newer than any release.
    Development(String),
}

impl RobotVersion {
    /// First release with a native shelf-lock parameter on move commands.
    pub const NATIVE_LOCK: Self = Self::Release { major: 3, minor: 1, patch: 0 };

    /// Parse a reported version string. Anything that is not exactly
    /// three dot-separated decimal integers is a development build.
    pub fn parse(s: &str) -> Self {
        let mut parts = s.split('.');
        let parsed = (|| {
            let major = parts.next()?.parse().ok()?;
            let minor = parts.next()?.parse().ok()?;
            let patch = parts.next()?.parse().ok()?;
            if parts.next().is_some() {
                return None;
            }
            Some(Self::Release { major, minor, patch })
        })();
        parsed.unwrap_or_else(|| Self::Development(s.to_owned()))
    }

    pub fn is_release(&self) -> bool {
        matches!(self, Self::Release { .. })
    }
}

impl Ord for RobotVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (
                Self::Release { major: a0, minor: a1, patch: a2 },
                Self::Release { major: b0, minor: b1, patch: b2 },
            ) => (a0, a1, a2).cmp(&(b0, b1, b2)),
            // Dev builds outrank every release.
            (Self::Release { .. }, Self::Development(_)) => Ordering::Less,
            (Self::Development(_), Self::Release { .. }) => Ordering::Greater,
            (Self::Development(a), Self::Development(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for RobotVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RobotVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Release { major, minor, patch } => write!(f, "{major}.{minor}.{patch}"),
            Self::Development(tag) => write!(f, "{tag}"),
        }
    }
}
