//! Token discovery from `~/.netrc`.
//!
//! The Databricks tooling accepts entries of the form:
//!
//! ```text
//! machine dbc-1234.cloud.databricks.com
//!   login token
//!   password dapi...
//! ```

use std::{fs, path::PathBuf};

use pledge_util::{env_var_trimmed, expand_tilde};

/// Overrides the netrc location (mostly for tests and containers).
pub(crate) const NETRC_PATH_ENV: &str = "NETRC";

fn netrc_path() -> Option<PathBuf> {
    if let Some(path) = env_var_trimmed(NETRC_PATH_ENV) {
        return Some(expand_tilde(&path));
    }
    dirs_next::home_dir().map(|home| home.join(".netrc"))
}

/// Attempt to read the password for `host` from the user's netrc file.
pub(crate) fn netrc_token_for_host(host: &str) -> Option<String> {
    let content = fs::read_to_string(netrc_path()?).ok()?;
    parse_netrc_password(&content, host)
}

/// Minimal netrc reader: returns the `password` of the `machine` stanza matching `host`.
fn parse_netrc_password(content: &str, host: &str) -> Option<String> {
    let mut tokens = content.split_whitespace();
    let mut in_matching_machine = false;

    while let Some(token) = tokens.next() {
        match token {
            "machine" => {
                in_matching_machine = tokens.next().is_some_and(|machine| machine.eq_ignore_ascii_case(host));
            }
            "default" => in_matching_machine = false,
            "password" if in_matching_machine => return tokens.next().map(str::to_string),
            _ => {}
        }
    }
    None
}
