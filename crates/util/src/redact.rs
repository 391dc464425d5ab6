use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static SENSITIVE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(authorization: (?:bearer )?)([\w\-\.=:/+]+)",
        r"(?i)([A-Z0-9_]*?(?:KEY|TOKEN|SECRET|PASSWORD)=)([^\s]+)",
        r"(?i)(password )(\S+)",
        r"(dapi)[0-9a-f]{16,}",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Redacts values that look like secrets in a string.
///
/// Covers Authorization headers, `*_TOKEN=`/`*_KEY=` style assignments,
/// netrc `password` entries, and Databricks personal access tokens.
pub fn redact_sensitive(input: &str) -> String {
    let mut redacted = input.to_string();
    for pattern in SENSITIVE_PATTERNS.iter() {
        redacted = pattern
            .replace_all(&redacted, |caps: &Captures| {
                let prefix = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                format!("{}<redacted>", prefix)
            })
            .to_string();
    }
    redacted
}
