// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};

pub const BACKEND_URL: &str = "ERP_BACKEND_URL";
pub const SERVICE_ROLE_KEY: &str = "ERP_SERVICE_ROLE_KEY";
pub const ACCESS_TOKEN: &str = "ERP_ACCESS_TOKEN";
const OAUTH_CLIENT_ID: &str = "ERP_OAUTH_CLIENT_ID";
const OAUTH_CLIENT_SECRET: &str = "ERP_OAUTH_CLIENT_SECRET";
const OAUTH_REDIRECT_URI: &str = "ERP_OAUTH_REDIRECT_URI";
const STEP_DEBUG: &str = "ERP_STEP_DEBUG";

/// Checked in this order; the first one missing is reported.
const REQUIRED: [&str; 3] = [ACCESS_TOKEN, BACKEND_URL, SERVICE_ROLE_KEY];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shown {
    Raw,
    Masked,
}

const REPORTED: [(&str, Shown); 6] = [
    (BACKEND_URL, Shown::Raw),
    (SERVICE_ROLE_KEY, Shown::Masked),
    (ACCESS_TOKEN, Shown::Masked),
    (OAUTH_CLIENT_ID, Shown::Masked),
    (OAUTH_CLIENT_SECRET, Shown::Masked),
    (OAUTH_REDIRECT_URI, Shown::Raw),
];

/// First six characters and the length, or `EMPTY`.
pub fn mask(value: Option<&str>) -> String {
    match value {
        Some(value) if !value.is_empty() => {
            let prefix: String = value.chars().take(6).collect();
            format!("{prefix}… (len:{})", value.chars().count())
        }
        _ => "EMPTY".to_owned(),
    }
}

/// Builds the report lines for the backend environment and fails on the
/// first missing required variable. Lines are returned even on failure so
/// callers can print what was found.
pub fn check<F>(lookup: F) -> (Vec<String>, Result<()>)
where
    F: Fn(&str) -> Option<String>,
{
    let mut lines = Vec::with_capacity(REPORTED.len() + 1);
    for (name, display) in REPORTED {
        let value = lookup(name);
        let shown = match display {
            Shown::Raw => value
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| "EMPTY".to_owned()),
            Shown::Masked => mask(value.as_deref()),
        };
        lines.push(format!("{name} {shown}"));
    }
    let debug = lookup(STEP_DEBUG).is_some_and(|value| !value.is_empty());
    lines.push(format!(
        "{STEP_DEBUG} {}",
        if debug { "ENABLED" } else { "DISABLED" }
    ));

    let missing = REQUIRED
        .into_iter()
        .find(|name| lookup(name).is_none_or(|value| value.is_empty()));
    let result = match missing {
        Some(name) => Err(missing_var(name)),
        None => Ok(()),
    };
    (lines, result)
}

fn missing_var(name: &str) -> anyhow::Error {
    anyhow!("missing {name} -- export it or add it to the environment before using remote mode")
}

/// Reads one required variable for remote mode.
pub fn require(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(missing_var(name)),
    }
}
