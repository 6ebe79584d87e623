//! Dotted field paths with bracketed arguments.
//!
//! `workitem[review, last].document[main].amount` splits into three
//! segments; dots inside brackets never split.

use crate::error::{AnalyticsError, Result};

/// One path segment, e.g. `document[main]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    pub args: Vec<String>,
}

impl Segment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: vec![],
        }
    }

    pub fn with_args(name: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().map(|a| a.into()).collect(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || AnalyticsError::InvalidSegment(raw.to_string());
        let raw_trimmed = raw.trim();

        let Some(open) = raw_trimmed.find('[') else {
            if raw_trimmed.is_empty() || raw_trimmed.contains(']') {
                return Err(invalid());
            }
            return Ok(Self::new(raw_trimmed));
        };

        let name = &raw_trimmed[..open];
        let rest = &raw_trimmed[open + 1..];
        let Some(inner) = rest.strip_suffix(']') else {
            return Err(invalid());
        };
        if name.is_empty() || inner.contains('[') || inner.contains(']') {
            return Err(invalid());
        }

        let args: Vec<String> = inner.split(',').map(|a| a.trim().to_string()).collect();
        if args.iter().any(|a| a.is_empty()) {
            return Err(invalid());
        }
        Ok(Self {
            name: name.to_string(),
            args,
        })
    }

    /// Canonical form: `name` or `name[a,b]`, no whitespace.
    pub fn identifier(&self) -> String {
        if self.args.is_empty() {
            self.name.clone()
        } else {
            format!("{}[{}]", self.name, self.args.join(","))
        }
    }
}

/// Split a dotted path into raw segments, respecting brackets.
pub fn split_path(path: &str) -> Result<Vec<String>> {
    let mut segments = vec![];
    let mut current = String::new();
    let mut depth = 0usize;

    for c in path.chars() {
        match c {
            '[' => {
                depth += 1;
                current.push(c);
            }
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| AnalyticsError::InvalidSegment(path.to_string()))?;
                current.push(c);
            }
            '.' if depth == 0 => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if depth != 0 {
        return Err(AnalyticsError::InvalidSegment(path.to_string()));
    }
    segments.push(current);

    if segments.iter().any(|s| s.trim().is_empty()) {
        return Err(AnalyticsError::InvalidSegment(path.to_string()));
    }
    Ok(segments)
}

/// Parse a whole path into segments.
pub fn parse_path(path: &str) -> Result<Vec<Segment>> {
    split_path(path)?.iter().map(|s| Segment::parse(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brackets_protect_dots() {
        let segments = split_path("document[a.b].amount").unwrap();
        assert_eq!(segments, vec!["document[a.b]", "amount"]);
    }

    #[test]
    fn test_args_are_trimmed() {
        let segment = Segment::parse("workitem[ review , last ]").unwrap();
        assert_eq!(segment.name, "workitem");
        assert_eq!(segment.args, vec!["review", "last"]);
        assert_eq!(segment.identifier(), "workitem[review,last]");
    }

    #[test]
    fn test_malformed_segments() {
        for raw in ["document[main", "document]", "[main]", "doc[a[b]]", "doc[]", "doc[a,]"] {
            assert!(
                matches!(Segment::parse(raw), Err(AnalyticsError::InvalidSegment(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_malformed_paths() {
        assert!(split_path("").is_err());
        assert!(split_path("a..b").is_err());
        assert!(split_path("a[b.c").is_err());
        assert!(split_path("a]b").is_err());
    }

    #[test]
    fn test_parse_path() {
        let path = parse_path("created_at.year").unwrap();
        assert_eq!(path, vec![Segment::new("created_at"), Segment::new("year")]);
    }
}
