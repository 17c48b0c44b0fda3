// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tree addressing.
//!
//! Callers address nodes with slash-delimited paths such as
//! `input/thermal/clusters/fr/list`. Every segment is one of:
//!
//! - a literal child name,
//! - a comma-separated list of child names (`fr,de`),
//! - the wildcard `*` selecting every child.
//!
//! Reads also take a [`Depth`] that bounds how far folders are expanded
//! below the addressed node.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Parsed slash-delimited tree path.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct StudyPath(Vec<String>);

impl StudyPath {
    /// Construct path from segments.
    pub fn new(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Empty path addressing the root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Path segments.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Check if path addresses the root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a segment, returning new path.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut path = self.clone();
        path.0.push(segment.into());
        path
    }
}

impl Display for StudyPath {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.0.join("/"))
    }
}

impl FromStr for StudyPath {
    type Err = PathError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        if !trimmed.is_ascii() {
            return Err(PathError::NotAscii(raw.to_string()));
        }

        let segments = trimmed
            .split('/')
            .map(|segment| {
                if segment.is_empty() {
                    Err(PathError::EmptySegment(raw.to_string()))
                } else {
                    Ok(segment.to_string())
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self(segments))
    }
}

/// Children chosen by one path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Every child.
    All,

    /// Explicit child names, in caller order.
    Names(Vec<String>),
}

impl Selector {
    /// Interpret one path segment.
    pub fn parse(segment: &str) -> Self {
        if segment == "*" {
            return Self::All;
        }

        Self::Names(
            segment
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }
}

/// Expansion bound for reads.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    /// Expand everything.
    #[default]
    Unbounded,

    /// Expand at most this many folder levels.
    Limited(u32),
}

impl Depth {
    /// Interpret the integer form where `-1` means unbounded.
    ///
    /// # Errors
    ///
    /// - Return [`PathError::InvalidDepth`] for values below `-1`.
    pub fn from_sentinel(raw: i64) -> Result<Self, PathError> {
        match raw {
            -1 => Ok(Self::Unbounded),
            depth if depth >= 0 => Ok(Self::Limited(u32::try_from(depth).unwrap_or(u32::MAX))),
            depth => Err(PathError::InvalidDepth(depth)),
        }
    }

    /// Check if expansion stops here.
    pub fn is_exhausted(self) -> bool {
        self == Self::Limited(0)
    }

    /// Depth left for children.
    pub fn descend(self) -> Self {
        match self {
            Self::Unbounded => Self::Unbounded,
            Self::Limited(depth) => Self::Limited(depth.saturating_sub(1)),
        }
    }
}

/// Path parsing error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Path holds an empty segment, e.g., `a//b`.
    #[error("path {0:?} has an empty segment")]
    EmptySegment(String),

    /// Path is not plain ASCII.
    #[error("path {0:?} is not ASCII")]
    NotAscii(String),

    /// Depth below the unbounded sentinel.
    #[error("depth {0} is invalid, expected -1 or a non-negative integer")]
    InvalidDepth(i64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case("", &[]; "empty is root")]
    #[test_case("/", &[]; "slash is root")]
    #[test_case("input/areas/fr", &["input", "areas", "fr"]; "plain")]
    #[test_case("/input/areas/", &["input", "areas"]; "surrounding slashes")]
    #[test_case("input/areas/fr,de/*", &["input", "areas", "fr,de", "*"]; "selections")]
    #[test]
    fn parse_paths(raw: &str, expect: &[&str]) {
        let path: StudyPath = raw.parse().expect("valid path");
        pretty_assertions::assert_eq!(path.segments(), expect);
    }

    #[test]
    fn reject_malformed_paths() {
        assert_eq!(
            "input//areas".parse::<StudyPath>(),
            Err(PathError::EmptySegment("input//areas".into()))
        );
        assert!(matches!("inpüt".parse::<StudyPath>(), Err(PathError::NotAscii(_))));
    }

    #[test]
    fn selectors() {
        assert_eq!(Selector::parse("*"), Selector::All);
        assert_eq!(Selector::parse("fr"), Selector::Names(vec!["fr".into()]));
        assert_eq!(
            Selector::parse("fr, de"),
            Selector::Names(vec!["fr".into(), "de".into()])
        );
    }

    #[test]
    fn depth_sentinel() {
        assert_eq!(Depth::from_sentinel(-1), Ok(Depth::Unbounded));
        assert_eq!(Depth::from_sentinel(2), Ok(Depth::Limited(2)));
        assert_eq!(Depth::from_sentinel(-2), Err(PathError::InvalidDepth(-2)));
        assert!(Depth::Limited(1).descend().is_exhausted());
        assert!(!Depth::Unbounded.descend().is_exhausted());
    }
}
