//! Requirement-string parsing for `name[extra,...] <specifier> ; <marker>`.
//!
//! Only the package name, the extras and the marker text are extracted; the
//! version specifier is ignored because versions come from the lockfile.
//! Parsing never consults the lockfile.

use lockgraph_core::BASE_EXTRA;
use lockgraph_util::errors::{LockgraphError, LockgraphResult};

/// Characters that end a package name, besides whitespace.
const NAME_TERMINATORS: [char; 6] = ['[', '=', '>', '<', '!', '~'];

/// A node key without a version: the caller picks the version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequirementKey {
    pub name: String,
    pub extra: String,
}

/// The structured form of one requirement string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub extras: Vec<String>,
    pub marker: Option<String>,
}

impl Requirement {
    /// Parse a requirement string.
    ///
    /// Returns `Ok(None)` for strings with nothing before the marker (blank
    /// or marker-only input).
    pub fn parse(input: &str) -> LockgraphResult<Option<Self>> {
        let (req_part, marker) = split_marker(input);
        let req_part = req_part.trim();
        if req_part.is_empty() {
            return Ok(None);
        }

        let name_end = req_part
            .find(|c: char| NAME_TERMINATORS.contains(&c) || c.is_whitespace())
            .unwrap_or(req_part.len());
        let name = &req_part[..name_end];
        if name.is_empty() {
            return Err(malformed(input, "missing package name"));
        }

        let mut extras: Vec<String> = Vec::new();
        if let Some(rest) = req_part[name_end..].strip_prefix('[') {
            let close = rest
                .find(']')
                .ok_or_else(|| malformed(input, "unclosed extras bracket"))?;
            for token in rest[..close].split(',').map(str::trim) {
                if !token.is_empty() && !extras.iter().any(|e| e == token) {
                    extras.push(token.to_string());
                }
            }
        }

        Ok(Some(Self {
            name: name.to_string(),
            extras,
            marker,
        }))
    }

    /// The base key followed by one key per extra, each with the marker.
    pub fn pairs(&self) -> Vec<(RequirementKey, Option<String>)> {
        std::iter::once(BASE_EXTRA)
            .chain(self.extras.iter().map(String::as_str))
            .map(|extra| {
                (
                    RequirementKey {
                        name: self.name.clone(),
                        extra: extra.to_string(),
                    },
                    self.marker.clone(),
                )
            })
            .collect()
    }
}

/// Parse a requirement string straight into `(key, marker)` pairs.
pub fn parse_requirement_pairs(input: &str) -> LockgraphResult<Vec<(RequirementKey, Option<String>)>> {
    Ok(Requirement::parse(input)?
        .map(|req| req.pairs())
        .unwrap_or_default())
}

/// Split at the first `;` not preceded by a backslash.
fn split_marker(input: &str) -> (&str, Option<String>) {
    let mut escaped = false;
    for (idx, c) in input.char_indices() {
        match c {
            '\\' => escaped = !escaped,
            ';' if !escaped => {
                let marker = input[idx + 1..].trim();
                let marker = (!marker.is_empty()).then(|| marker.to_string());
                return (&input[..idx], marker);
            }
            _ => escaped = false,
        }
    }
    (input, None)
}

fn malformed(input: &str, reason: &str) -> LockgraphError {
    LockgraphError::MalformedRequirement {
        requirement: input.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str, extra: &str) -> RequirementKey {
        RequirementKey {
            name: name.to_string(),
            extra: extra.to_string(),
        }
    }

    #[test]
    fn extras_and_marker_share_marker() {
        let pairs = parse_requirement_pairs("foo[bar,baz]>=1.0; python_version < '3.9'").unwrap();
        let marker = Some("python_version < '3.9'".to_string());
        assert_eq!(
            pairs,
            vec![
                (key("foo", BASE_EXTRA), marker.clone()),
                (key("foo", "bar"), marker.clone()),
                (key("foo", "baz"), marker),
            ]
        );
    }

    #[test]
    fn bare_name() {
        let pairs = parse_requirement_pairs("requests").unwrap();
        assert_eq!(pairs, vec![(key("requests", BASE_EXTRA), None)]);
    }

    #[test]
    fn specifier_terminates_name() {
        for input in ["click==8.1", "click>=8", "click<9", "click!=8.0", "click~=8.1", "click >=8"] {
            let req = Requirement::parse(input).unwrap().unwrap();
            assert_eq!(req.name, "click", "input: {input}");
            assert!(req.extras.is_empty());
        }
    }

    #[test]
    fn extras_are_trimmed_and_deduplicated() {
        let req = Requirement::parse("foo[ a , ,b, a ]").unwrap().unwrap();
        assert_eq!(req.extras, vec!["a", "b"]);
    }

    #[test]
    fn empty_marker_is_none() {
        let req = Requirement::parse("foo ;   ").unwrap().unwrap();
        assert_eq!(req.marker, None);
    }

    #[test]
    fn escaped_semicolon_is_not_a_separator() {
        let req = Requirement::parse(r"foo\;x ; os_name == 'nt'").unwrap().unwrap();
        assert_eq!(req.name, r"foo\;x");
        assert_eq!(req.marker.as_deref(), Some("os_name == 'nt'"));
    }

    #[test]
    fn blank_and_marker_only_are_empty() {
        assert!(parse_requirement_pairs("").unwrap().is_empty());
        assert!(parse_requirement_pairs("   ").unwrap().is_empty());
        assert!(parse_requirement_pairs("; sys_platform == 'linux'").unwrap().is_empty());
    }

    #[test]
    fn missing_name_is_malformed() {
        for input in [">=1.0", "[extra]", "==2"] {
            let err = parse_requirement_pairs(input).unwrap_err();
            assert!(
                matches!(err, LockgraphError::MalformedRequirement { .. }),
                "input: {input}"
            );
        }
    }

    #[test]
    fn unclosed_bracket_is_malformed() {
        let err = parse_requirement_pairs("foo[bar").unwrap_err();
        assert!(err.to_string().contains("unclosed extras bracket"));
    }

    #[test]
    fn leading_whitespace_is_ignored() {
        let req = Requirement::parse("   foo[x]").unwrap().unwrap();
        assert_eq!(req.name, "foo");
        assert_eq!(req.extras, vec!["x"]);
    }

    #[test]
    fn any_whitespace_ends_name() {
        for input in ["typing-extensions\t>=4", "typing-extensions\n", "typing-extensions\u{a0}>=4"] {
            let req = Requirement::parse(input).unwrap().unwrap();
            assert_eq!(req.name, "typing-extensions", "input: {input:?}");
        }
    }

    #[test]
    fn space_before_bracket_means_no_extras() {
        let req = Requirement::parse("foo [x]").unwrap().unwrap();
        assert_eq!(req.name, "foo");
        assert!(req.extras.is_empty());
    }
}
