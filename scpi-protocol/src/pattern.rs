//! Glob matching of resource strings.
//!
//! `?` matches exactly one character, `*` matches zero or more characters.
//! Matching ignores ASCII case.
use regex::{Regex, RegexBuilder};

use crate::error::AddressError;

/// Pattern used when listing resources without an explicit filter.
pub const DEFAULT_QUERY: &str = "?*::INSTR";

/// A compiled resource glob.
#[derive(Clone, Debug)]
pub struct ResourcePattern {
    pattern: String,
    regex: Regex,
}

impl ResourcePattern {
    pub fn new(pattern: &str) -> Result<ResourcePattern, AddressError> {
        let mut expression = String::with_capacity(pattern.len() * 2 + 2);
        expression.push('^');
        for c in pattern.chars() {
            match c {
                '?' => expression.push('.'),
                '*' => expression.push_str(".*"),
                other => expression.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        expression.push('$');
        let regex = RegexBuilder::new(&expression)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
            .map_err(|e| AddressError::Invalid(format!("invalid pattern '{pattern}': {e}")))?;
        Ok(ResourcePattern {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, resource: &str) -> bool {
        self.regex.is_match(resource)
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

/// Returns whether `resource` matches the glob `pattern`.
///
/// A pattern that cannot be compiled matches nothing.
pub fn matches_pattern(resource: &str, pattern: &str) -> bool {
    ResourcePattern::new(pattern)
        .map(|p| p.matches(resource))
        .unwrap_or(false)
}

#[cfg(test)]
mod test {
    use super::*;

    const RIGOL: &str = "USB0::0x1AB1::0x04CE::DS1ZA123::INSTR";

    #[test]
    fn usb_glob() {
        assert!(matches_pattern(RIGOL, "USB?*::INSTR"));
        assert!(!matches_pattern(RIGOL, "GPIB?*::INSTR"));
    }

    #[test]
    fn case_insensitive() {
        assert!(matches_pattern(RIGOL, "usb0::0x1ab1::*"));
    }

    #[test]
    fn question_mark_is_exactly_one_character() {
        assert!(matches_pattern("ASRL1::INSTR", "ASRL?::INSTR"));
        assert!(!matches_pattern("ASRL12::INSTR", "ASRL?::INSTR"));
        assert!(!matches_pattern("::INSTR", "?*::INSTR"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        assert!(matches_pattern("SIM::a.b::INSTR", "SIM::a.b::INSTR"));
        assert!(!matches_pattern("SIM::axb::INSTR", "SIM::a.b::INSTR"));
        assert!(!matches_pattern("TCPIP0::10.0.0.1::5025::SOCKET", "*(5025)*"));
    }

    #[test]
    fn default_query_excludes_sockets() {
        let pattern = ResourcePattern::new(DEFAULT_QUERY).unwrap();
        assert!(pattern.matches("SIM::psu::INSTR"));
        assert!(!pattern.matches("TCPIP0::host::5025::SOCKET"));
        assert_eq!(pattern.as_str(), DEFAULT_QUERY);
    }
}
