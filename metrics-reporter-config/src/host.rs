//! Local host name lookup and metric-name prefix templating.

use crate::{ConfigError, Result};

/// Placeholder replaced by the sanitized local host name when used as a prefix.
pub const HOSTNAME_PLACEHOLDER: &str = "${host.name}";

/// Global tag key holding the local host name.
pub const HOSTNAME_TAG: &str = "hostname";

/// Resolves the host name of the local machine.
///
/// This is a blocking call into the operating system and is not cached.
pub fn local_hostname() -> Result<String> {
    let name = hostname::get().map_err(|e| ConfigError::HostResolution(e.to_string()))?;
    name.into_string().map_err(|raw| {
        ConfigError::HostResolution(format!("host name is not valid UTF-8: {:?}", raw))
    })
}

/// Replaces every character outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Resolves a raw prefix value.
///
/// [`HOSTNAME_PLACEHOLDER`] becomes the sanitized local host name, any other
/// value is returned unchanged.
pub fn resolve_prefix(raw: &str) -> Result<String> {
    if raw == HOSTNAME_PLACEHOLDER {
        Ok(sanitize(&local_hostname()?))
    } else {
        Ok(raw.to_string())
    }
}
