//! Number formatting for console output.

/// `1234567` -> `"1,234,567"`.
pub fn format_count(value: u64) -> String {
    group_thousands(&value.to_string())
}

/// `1234.5` -> `"$1,234.50"`.
pub fn format_currency(value: f64) -> String {
    let rendered = format!("{:.2}", value.abs());
    let (whole, cents) = rendered.split_once('.').unwrap_or((rendered.as_str(), "00"));
    let sign = if value < 0.0 && rendered != "0.00" { "-" } else { "" };
    format!("{}${}.{}", sign, group_thousands(whole), cents)
}

/// Fraction to percentage with one decimal: `0.125` -> `"12.5%"`.
pub fn format_percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1_234_567), "1,234,567");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(25_000.0), "$25,000.00");
        assert_eq!(format_currency(1234.567), "$1,234.57");
        assert_eq!(format_currency(0.5), "$0.50");
        assert_eq!(format_currency(-1500.0), "-$1,500.00");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(0.125), "12.5%");
        assert_eq!(format_percent(0.0), "0.0%");
        assert_eq!(format_percent(-0.05), "-5.0%");
    }
}
