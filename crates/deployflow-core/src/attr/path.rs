//! Dotted attribute paths

use crate::error::{ModelError, Result};
use std::fmt;
use std::str::FromStr;

/// One step of an attribute path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Named attribute inside a block
    Key(String),
    /// Position inside a block list
    Index(usize),
    /// Length of a block list (`#`)
    Count,
}

/// Parsed attribute path such as `apm.0.topology.0.memory_per_node`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrPath {
    segments: Vec<Segment>,
}

impl AttrPath {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Split into the parent segments and the final one
    pub fn split_last(&self) -> Option<(&Segment, &[Segment])> {
        self.segments.split_last()
    }
}

impl FromStr for AttrPath {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(ModelError::invalid_path(s, "path is empty"));
        }

        let mut segments = Vec::new();
        let mut parts = s.split('.').peekable();
        while let Some(part) = parts.next() {
            let segment = match part {
                "" => return Err(ModelError::invalid_path(s, "empty path segment")),
                "#" if parts.peek().is_some() => {
                    return Err(ModelError::invalid_path(s, "'#' must be the last segment"));
                }
                "#" => Segment::Count,
                p if p.bytes().all(|b| b.is_ascii_digit()) => {
                    let index = p
                        .parse::<usize>()
                        .map_err(|e| ModelError::invalid_path(s, e.to_string()))?;
                    Segment::Index(index)
                }
                p => Segment::Key(p.to_string()),
            };
            segments.push(segment);
        }

        if !matches!(segments.first(), Some(Segment::Key(_))) {
            return Err(ModelError::invalid_path(s, "path must start with an attribute name"));
        }

        Ok(Self { segments })
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            match segment {
                Segment::Key(k) => write!(f, "{}", k)?,
                Segment::Index(n) => write!(f, "{}", n)?,
                Segment::Count => write!(f, "#")?,
            }
        }
        Ok(())
    }
}
