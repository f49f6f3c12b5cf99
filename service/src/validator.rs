//! Header line validation.
//!
//! Checks a raw `Name: Value` line against a fixed allow-list of header name
//! characters and a printable-range rule for values. Used to decide whether
//! browser-supplied header data is safe to persist or log.

/// Symbols permitted in a header name besides ASCII letters and digits.
const NAME_SYMBOLS: &[u8] = b"^_`|~!#$%&'*+-.";

/// Validates `Name: Value` header lines.
///
/// The name allow-list is computed once in [`HeaderValidator::new`] and never
/// mutated, so a single validator can be shared freely across tasks.
#[derive(Debug, Clone)]
pub struct HeaderValidator {
    allowed_name_chars: [bool; 256],
}

impl Default for HeaderValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderValidator {
    #[must_use]
    pub fn new() -> Self {
        let mut allowed_name_chars = [false; 256];
        for byte in (b'0'..=b'9').chain(b'A'..=b'Z').chain(b'a'..=b'z') {
            allowed_name_chars[usize::from(byte)] = true;
        }
        for &byte in NAME_SYMBOLS {
            allowed_name_chars[usize::from(byte)] = true;
        }
        Self { allowed_name_chars }
    }

    /// Tab, or anything in `32..=255` except DEL.
    #[must_use]
    pub const fn is_valid_value_character(code_point: u32) -> bool {
        code_point == 9 || (code_point > 31 && code_point <= 255 && code_point != 127)
    }

    /// Returns true when every character of `value` is a valid value character.
    ///
    /// An empty value passes; [`HeaderValidator::is_valid`] rejects it separately.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn is_valid_header_value(&self, value: &str) -> bool {
        value
            .chars()
            .all(|c| Self::is_valid_value_character(u32::from(c)))
    }

    /// Returns true when every character of `name` is in the allow-list.
    ///
    /// An empty name passes; [`HeaderValidator::is_valid`] rejects it separately.
    #[must_use]
    pub fn is_valid_header_name(&self, name: &str) -> bool {
        name.chars().all(|c| self.is_allowed_name_char(c))
    }

    /// Validate a full header line.
    ///
    /// The line is split on the first colon and both halves are trimmed. A
    /// line without a colon, or with an empty name or value, is invalid.
    #[must_use]
    pub fn is_valid(&self, header: &str) -> bool {
        let Some((name, value)) = header.split_once(':') else {
            tracing::debug!("header line has no name/value separator");
            return false;
        };

        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() || value.is_empty() {
            return false;
        }

        self.is_valid_header_name(name) && self.is_valid_header_value(value)
    }

    fn is_allowed_name_char(&self, c: char) -> bool {
        usize::try_from(u32::from(c))
            .ok()
            .and_then(|index| self.allowed_name_chars.get(index))
            .copied()
            .unwrap_or(false)
    }
}
