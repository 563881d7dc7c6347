//! ESI directives and include target resolution.

use std::sync::LazyLock;

use http::uri::{Authority, PathAndQuery};
use regex::Regex;

use super::EsiError;
use crate::core::RequestContext;

/// `src` must be an absolute path, optionally behind an http(s) scheme.
static ABSOLUTE_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:https?:/)?/").expect("Invalid regex"));

/// ESI directive elements handled by the processor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    /// `esi:include` - fetch `src` and splice it in.
    Include,
    /// `esi:remove` - drop the subtree.
    Remove,
    /// `esi:comment` - drop the subtree.
    Comment,
}

impl DirectiveKind {
    /// Map a qualified element name to a directive.
    #[inline]
    pub fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"esi:include" => Some(Self::Include),
            b"esi:remove" => Some(Self::Remove),
            b"esi:comment" => Some(Self::Comment),
            _ => None,
        }
    }

    /// Qualified element name.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Include => "esi:include",
            Self::Remove => "esi:remove",
            Self::Comment => "esi:comment",
        }
    }
}

impl std::fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated `esi:include` target on the enclosing request's server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncludeTarget {
    src: String,
    path: String,
    query: String,
}

impl IncludeTarget {
    /// Validate `src` against the enclosing request.
    ///
    /// Accepted forms are `/path?query`, `http:/path` and
    /// `http://host[:port]/path` where host (and port, if present) name the
    /// server of `ctx`. Everything else is [`EsiError::NonAbsoluteSource`].
    /// A trailing `#fragment` is discarded.
    pub fn parse(src: &str, ctx: &RequestContext) -> Result<Self, EsiError> {
        let reject = || EsiError::NonAbsoluteSource {
            src: src.to_string(),
        };

        if !ABSOLUTE_SRC.is_match(src) {
            return Err(reject());
        }

        let (authority, rest) = split_authority(src);

        if let Some(authority) = authority {
            if !is_same_origin(authority, ctx) {
                return Err(reject());
            }
        }

        if !rest.starts_with('/') {
            return Err(reject());
        }

        let pq: PathAndQuery = rest.parse().map_err(|_| reject())?;

        Ok(Self {
            src: src.to_string(),
            path: pq.path().to_string(),
            query: pq.query().unwrap_or("").to_string(),
        })
    }

    /// Original `src` attribute.
    #[inline]
    pub fn src(&self) -> &str {
        &self.src
    }

    /// Target path.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Target query string (empty if none).
    #[inline]
    pub fn query(&self) -> &str {
        &self.query
    }
}

/// Split an optional `http(s):` scheme and `//authority` off `src`.
fn split_authority(src: &str) -> (Option<&str>, &str) {
    let scheme_len = if has_prefix_ignore_case(src, "https:") {
        6
    } else if has_prefix_ignore_case(src, "http:") {
        5
    } else {
        0
    };

    let rest = &src[scheme_len..];
    match rest.strip_prefix("//") {
        Some(after) => {
            let end = after.find(['/', '?', '#']).unwrap_or(after.len());
            (Some(&after[..end]), &after[end..])
        }
        None => (None, rest),
    }
}

#[inline]
fn has_prefix_ignore_case(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Check that an include authority names the enclosing server.
fn is_same_origin(authority: &str, ctx: &RequestContext) -> bool {
    let Ok(authority) = authority.parse::<Authority>() else {
        return false;
    };

    if !authority.host().eq_ignore_ascii_case(&ctx.server_name) {
        return false;
    }

    authority
        .port_u16()
        .is_none_or(|port| port == ctx.server_port)
}
