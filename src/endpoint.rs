use regex::Regex;
use std::sync::LazyLock;

/// Schemes accepted as-is. Anything else gets `http://` prepended.
const SCHEMES: [&str; 2] = ["http", "https"];

/// Scheme used when the user types a bare host.
const DEFAULT_SCHEME: &str = "http";

static SLASH_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/{2,}").expect("slash-run pattern is valid"));

/// sanitize
///
/// Normalizes a user-typed deployment URL into the canonical base URL used for
/// every outbound call to the R2R deployment.
///
/// The result is either empty or `http(s)://<rest>` where the scheme is
/// lower-case, `<rest>` has no leading, trailing or doubled slashes, and the
/// host keeps whatever case the user typed. Blank input (empty, whitespace,
/// or a scheme with no host) resolves to the canonical form of `fallback`.
///
/// Never fails, and `sanitize(&sanitize(x, f), f) == sanitize(x, f)`.
pub fn sanitize(raw: &str, fallback: &str) -> String {
    let trimmed = raw.trim();
    if is_blank(trimmed) {
        let fallback = fallback.trim();
        if is_blank(fallback) {
            return String::new();
        }
        return canonicalize(fallback);
    }
    canonicalize(trimmed)
}

/// A string with no host: nothing, only slashes and whitespace, or a bare
/// `http:`/`https:` scheme followed by any mix of them.
fn is_blank(input: &str) -> bool {
    let stem = input.trim_end_matches(|c: char| c == '/' || c.is_whitespace());
    stem.is_empty()
        || SCHEMES
            .iter()
            .any(|scheme| stem.eq_ignore_ascii_case(&format!("{scheme}:")))
}

/// Expects trimmed, non-blank input.
fn canonicalize(input: &str) -> String {
    let stripped = input.trim_end_matches(|c: char| c == '/' || c.is_whitespace());
    let (scheme, rest) = split_scheme(stripped);
    let rest = rest.trim_start_matches('/');
    let rest = SLASH_RUN.replace_all(rest, "/");
    format!("{scheme}://{rest}")
}

/// Splits off a case-insensitive `http://` or `https://` prefix, returning the
/// lower-case scheme. Inputs without one get the default scheme.
fn split_scheme(input: &str) -> (&'static str, &str) {
    for scheme in SCHEMES {
        let prefix = format!("{scheme}://");
        if let Some(head) = input.get(..prefix.len()) {
            if head.eq_ignore_ascii_case(&prefix) {
                return (scheme, &input[prefix.len()..]);
            }
        }
    }
    (DEFAULT_SCHEME, input)
}
