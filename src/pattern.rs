//! Dot-segmented task-name patterns with single-segment wildcards.
//!
//! Task names in the build graph are dot-segmented (for example
//! `ext.css.buildHeader`). A dependency can name a task exactly, or use the
//! wildcard segment `*`, which matches exactly one name segment:
//!
//! - `ext.*.buildHeader` matches `ext.css.buildHeader` and
//!   `ext.js.buildHeader`
//! - it does **not** match `ext.css.extra.buildHeader` (segment counts must
//!   agree) or `buildHeader`
//!
//! A pattern is an ordered list of segment matchers rather than a string
//! matched ad hoc at call sites: parsing happens once, at declaration time,
//! and rejects empty patterns and empty segments. An exact name is simply a
//! pattern with no wildcard segments.
//!
//! Patterns are resolved against the registered task names **at call time**,
//! not at declaration time, so tasks registered after a dependency was
//! declared become eligible for later calls. That resolution lives in
//! [`TaskGraph`](crate::graph::TaskGraph); this module only answers "does this
//! name match".

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// One position in a dot-segmented pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Matches a segment with exactly this text.
    Literal(String),
    /// Matches any single segment.
    Any,
}

/// A parsed task-name pattern.
///
/// # Examples
///
/// ```
/// use tplbuild::pattern::TaskPattern;
///
/// let pattern: TaskPattern = "ext.*.buildHeader".parse().unwrap();
/// assert!(pattern.matches("ext.css.buildHeader"));
/// assert!(!pattern.matches("ext.css.build"));
/// assert!(!pattern.is_exact());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl TaskPattern {
    /// Parse a pattern from its textual form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] when the pattern is empty or
    /// contains an empty segment (leading, trailing, or doubled dots).
    pub fn parse(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(Error::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "pattern is empty".to_string(),
            });
        }

        let mut segments = Vec::new();
        for segment in pattern.split('.') {
            match segment {
                "" => {
                    return Err(Error::InvalidPattern {
                        pattern: pattern.to_string(),
                        reason: "pattern contains an empty segment".to_string(),
                    });
                }
                "*" => segments.push(Segment::Any),
                literal => segments.push(Segment::Literal(literal.to_string())),
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    /// Whether `name` matches this pattern.
    ///
    /// The segment counts must agree; a wildcard consumes exactly one
    /// segment.
    pub fn matches(&self, name: &str) -> bool {
        let mut parts = name.split('.');
        let mut matchers = self.segments.iter();

        loop {
            match (matchers.next(), parts.next()) {
                (None, None) => return true,
                (Some(matcher), Some(part)) => match matcher {
                    Segment::Any => {}
                    Segment::Literal(literal) => {
                        if literal != part {
                            return false;
                        }
                    }
                },
                _ => return false,
            }
        }
    }

    /// Whether this pattern contains no wildcard segments.
    pub fn is_exact(&self) -> bool {
        self.segments.iter().all(|segment| !matches!(segment, Segment::Any))
    }

    /// The exact task name this pattern denotes, if it has no wildcards.
    pub fn as_exact(&self) -> Option<&str> {
        self.is_exact().then_some(self.raw.as_str())
    }
}

impl FromStr for TaskPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TaskPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
