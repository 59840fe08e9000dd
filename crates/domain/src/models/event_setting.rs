//! Event-wide settings stored as key/value rows.

use serde::{Deserialize, Serialize};

/// Key of the switch that opens and closes public registration.
pub const REGISTRATION_ENABLED_KEY: &str = "registration_enabled";

/// Parses a stored boolean setting value. Anything other than `false`
/// (case-insensitive) reads as enabled, matching the default of an absent row.
pub fn parse_flag(value: &str) -> bool {
    !value.trim().eq_ignore_ascii_case("false")
}

pub fn format_flag(enabled: bool) -> &'static str {
    if enabled {
        "true"
    } else {
        "false"
    }
}

/// Request and response body for the registration switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationSwitch {
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(" FALSE "));
        assert!(parse_flag(""));
    }

    #[test]
    fn test_format_flag() {
        assert_eq!(format_flag(true), "true");
        assert_eq!(format_flag(false), "false");
    }
}
