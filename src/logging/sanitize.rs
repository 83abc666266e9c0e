use once_cell::sync::Lazy;
use regex::Regex;

pub const REDACTED: &str = "****";

/// Keys whose string values never leave the process.
static SENSITIVE: Lazy<Vec<(Regex, String)>> = Lazy::new(|| {
    ["password", "token", "authorization"]
        .into_iter()
        .map(|key| {
            let pattern = format!(r#"(?i)"{key}"\s*:\s*"(?:[^"\\]|\\.)*""#);
            let replacement = format!(r#""{key}": "{REDACTED}""#);
            (Regex::new(&pattern).expect("static pattern"), replacement)
        })
        .collect()
});

/// Redacts `"password"`, `"token"` and `"authorization"` string values in
/// serialized JSON, at any depth and in any key casing.
///
/// Works on the text, not a parsed tree: everything else is left verbatim.
pub fn sanitize(serialized: &str) -> String {
    let mut out = serialized.to_owned();
    for (pattern, replacement) in SENSITIVE.iter() {
        if let std::borrow::Cow::Owned(replaced) =
            pattern.replace_all(&out, regex::NoExpand(replacement))
        {
            out = replaced;
        }
    }
    out
}
