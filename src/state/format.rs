//! Display formatting for dialed numbers

/// Number dialed, texted or messaged when the buffer is empty
pub const DEFAULT_DESTINATION: &str = "15616091285";

/// Display shown when the buffer has no digits
pub const DEFAULT_DISPLAY: &str = "+1 561 609 1285";

/// Format a raw keypad buffer for display.
///
/// Non-digit characters (`*`, `#`, anything typed into the number field)
/// are stripped first. Exactly eleven digits render as
/// `+C AAA PPP LLLL`; any other non-empty run renders as `+<digits>`.
pub fn format_number(number: &str) -> String {
    let cleaned: String = number.chars().filter(|c| c.is_ascii_digit()).collect();

    // Country digit + area + prefix + line. Ten-digit input is not grouped.
    if cleaned.len() == 11 {
        return format!(
            "+{} {} {} {}",
            &cleaned[..1],
            &cleaned[1..4],
            &cleaned[4..7],
            &cleaned[7..]
        );
    }

    if !cleaned.is_empty() {
        return format!("+{cleaned}");
    }

    DEFAULT_DISPLAY.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eleven_digits_grouped() {
        assert_eq!(format_number("15616091285"), "+1 561 609 1285");
    }

    #[test]
    fn test_short_number_passthrough() {
        assert_eq!(format_number("123"), "+123");
    }

    #[test]
    fn test_empty_uses_default_display() {
        assert_eq!(format_number(""), DEFAULT_DISPLAY);
        assert_eq!(format_number(DEFAULT_DESTINATION), DEFAULT_DISPLAY);
    }

    #[test]
    fn test_ten_digits_not_grouped() {
        assert_eq!(format_number("5616091285"), "+5616091285");
    }

    #[test]
    fn test_symbols_stripped() {
        assert_eq!(format_number("*1#5616091285"), "+1 561 609 1285");
        assert_eq!(format_number("*#"), DEFAULT_DISPLAY);
        assert_eq!(format_number("(561) 609-1285"), "+5616091285");
    }
}
