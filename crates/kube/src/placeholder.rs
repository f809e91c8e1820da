//! Placeholder syntax
//!
//! * `<key>` reads `key` from the manifest's `avp.kubernetes.io/path` secret.
//!   Only recognised when that annotation is set.
//! * `<path:PATH#KEY>` and `<path:PATH#KEY#VERSION>` name the secret inline.
//!
//! Either form may be followed by `| modifier` segments.

use crate::modifiers::Modifier;
use avp_core::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([^<>]+)>").expect("placeholder pattern is valid"));

const INLINE_PREFIX: &str = "path:";

/// Where a placeholder's value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Key in the secret named by the path annotation
    Bare { key: String },
    /// Key in an explicitly named secret
    Inline {
        path: String,
        key: String,
        version: Option<String>,
    },
}

/// One parsed placeholder with its modifier chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub reference: Reference,
    pub modifiers: Vec<Modifier>,
}

impl Placeholder {
    /// Parse the text between `<` and `>`
    pub fn parse(inner: &str) -> Result<Self> {
        let invalid = |message: &str| Error::placeholder(format!("<{inner}>"), message);

        let mut segments = inner.split('|');
        let reference = segments.next().unwrap_or_default().trim();

        let reference = match reference.strip_prefix(INLINE_PREFIX) {
            Some(target) => {
                let parts: Vec<&str> = target.split('#').map(str::trim).collect();
                match parts.as_slice() {
                    [path, key] | [path, key, ""] => inline(path, key, None),
                    [path, key, version] => inline(path, key, Some(*version)),
                    _ => None,
                }
                .ok_or_else(|| invalid("expected <path:PATH#KEY> or <path:PATH#KEY#VERSION>"))?
            }
            None if reference.is_empty() => return Err(invalid("empty secret key")),
            None => Reference::Bare {
                key: reference.to_string(),
            },
        };

        let modifiers = segments
            .map(Modifier::parse)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            reference,
            modifiers,
        })
    }
}

fn inline(path: &str, key: &str, version: Option<&str>) -> Option<Reference> {
    if path.is_empty() || key.is_empty() {
        return None;
    }
    Some(Reference::Inline {
        path: path.to_string(),
        key: key.to_string(),
        version: version.map(str::to_string),
    })
}

/// One `<...>` occurrence in a string value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence<'t> {
    /// Byte range of the whole `<...>` text
    pub range: Range<usize>,
    /// Text between the angle brackets
    pub inner: &'t str,
}

impl Occurrence<'_> {
    pub fn parse(&self) -> Result<Placeholder> {
        Placeholder::parse(self.inner)
    }
}

/// Find the placeholders in `text`.
///
/// Bare `<key>` forms are only returned when `bare_allowed` is set, so text
/// such as `<none>` in a manifest without a path annotation is left alone.
pub fn find(text: &str, bare_allowed: bool) -> Vec<Occurrence<'_>> {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let inner = captures.get(1)?.as_str();
            if bare_allowed || inner.trim_start().starts_with(INLINE_PREFIX) {
                Some(Occurrence {
                    range: whole.range(),
                    inner,
                })
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_placeholder() {
        let placeholder = Placeholder::parse(" password ").unwrap();
        assert_eq!(
            placeholder.reference,
            Reference::Bare {
                key: "password".to_string()
            }
        );
        assert!(placeholder.modifiers.is_empty());
    }

    #[test]
    fn test_inline_placeholder_with_version_and_modifiers() {
        let placeholder =
            Placeholder::parse("path:secret/data/app#config#3 | jsonParse | jsonPath {.db}")
                .unwrap();
        assert_eq!(
            placeholder.reference,
            Reference::Inline {
                path: "secret/data/app".to_string(),
                key: "config".to_string(),
                version: Some("3".to_string()),
            }
        );
        assert_eq!(placeholder.modifiers.len(), 2);
        assert_eq!(placeholder.modifiers[0], Modifier::JsonParse);
    }

    #[test]
    fn test_malformed_inline_placeholders() {
        for bad in ["path:secret/data/app", "path:#key", "path:a#", "path:a#b#c#d", ""] {
            let err = Placeholder::parse(bad).unwrap_err();
            assert!(matches!(err, Error::Placeholder { .. }), "{bad}");
        }
    }

    #[test]
    fn test_unknown_modifier_is_reported() {
        let err = Placeholder::parse("key | shout").unwrap_err();
        assert!(matches!(err, Error::Modifier { .. }));
    }

    #[test]
    fn test_find_respects_bare_allowed() {
        let text = "user=<user> host=<path:kv/db#host> other=<none>";
        let inline_only = find(text, false);
        assert_eq!(inline_only.len(), 1);
        assert_eq!(inline_only[0].inner, "path:kv/db#host");
        assert_eq!(&text[inline_only[0].range.clone()], "<path:kv/db#host>");

        assert_eq!(find(text, true).len(), 3);
        assert!(find("no placeholders here", true).is_empty());
    }
}
