// Money formatting for display
//
// Amounts are plain f64 values in złoty. Display uses two decimals with a
// comma separator and the currency suffix: 150.0 -> "150,00 zł".

pub const CURRENCY_SUFFIX: &str = "zł";

/// Shown in place of an amount the catalog does not provide
pub const MISSING_AMOUNT: &str = "-";

pub fn format_amount(amount: f64) -> String {
    format!("{} {}", format_decimal(amount), CURRENCY_SUFFIX)
}

/// Two decimals with a comma separator, no currency
pub fn format_decimal(amount: f64) -> String {
    format!("{:.2}", amount).replace('.', ",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(150.0), "150,00 zł");
        assert_eq!(format_amount(2.5), "2,50 zł");
        assert_eq!(format_amount(0.0), "0,00 zł");
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(1234.5), "1234,50");
        assert_eq!(format_decimal(0.126), "0,13");
        assert_eq!(format_decimal(-3.0), "-3,00");
    }
}
