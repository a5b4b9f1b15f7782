// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Hostname detection for the `host` record field.

use tracing::warn;

/// Returns the local hostname, or `"unknown"` when it cannot be determined.
#[must_use]
pub fn get_hostname() -> String {
    match system_hostname() {
        Some(hostname) if !hostname.is_empty() => hostname,
        _ => {
            warn!("QUEUE | Could not determine hostname, using 'unknown'");
            "unknown".to_string()
        }
    }
}

#[cfg(unix)]
fn system_hostname() -> Option<String> {
    match nix::unistd::gethostname() {
        Ok(hostname) => hostname.into_string().ok(),
        Err(e) => {
            warn!("QUEUE | Failed to get system hostname: {}", e);
            None
        }
    }
}

#[cfg(windows)]
fn system_hostname() -> Option<String> {
    std::env::var("COMPUTERNAME").ok()
}

#[cfg(not(any(unix, windows)))]
fn system_hostname() -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_hostname_not_empty() {
        assert!(!get_hostname().is_empty());
    }

    #[test]
    fn test_hostname_is_stable() {
        assert_eq!(get_hostname(), get_hostname());
    }
}
