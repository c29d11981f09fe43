//! Conversion of unit-suffixed sensor text (`"72.3 °C"`, `"65.7 W"`) into numbers.

/// Parses a raw reading, stripping one occurrence of `" " + unit`.
///
/// The leading decimal literal of what remains is parsed with `.` as the
/// decimal separator regardless of locale; trailing text is ignored, so
/// `"65.7 W"` still parses when the configured unit is `"°C"`.
///
/// Returns `None` when the text is empty, does not start with a number, or
/// the number is out of `f64` range.
pub fn parse_reading(raw: &str, unit: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let suffix = format!(" {}", unit);
    let cleaned = trimmed.replacen(&suffix, "", 1);

    let literal = leading_decimal(&cleaned);
    if literal.is_empty() {
        return None;
    }
    literal.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Same as [`parse_reading`] but resolves every failure to `0.0`.
///
/// A genuine zero reading and an unparseable one are indistinguishable here;
/// use [`parse_reading`] where that difference matters.
pub fn parse_value(raw: &str, unit: &str) -> f64 {
    parse_reading(raw, unit).unwrap_or(0.0)
}

/// Longest prefix of `s` shaped like `[+-]digits[.digits][(e|E)[+-]digits]`.
fn leading_decimal(s: &str) -> &str {
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }

    if digits == 0 {
        return "";
    }

    // Exponent only counts when it carries at least one digit.
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    &s[..end]
}
