//! Market-type detection and provider symbol formatting.
//!
//! Classification is total: every input maps to exactly one market, with JP
//! as the fallback when no rule matches. Formatting is a pure function of
//! (code, market type).

use tracing::warn;

use crate::models::MarketType;

/// Suffix the data provider uses for Tokyo-listed instruments.
pub const DOMESTIC_SUFFIX: &str = ".T";

/// Decide which market convention a raw ticker string belongs to.
///
/// JP: ends with `.T`, or exactly four ASCII digits. US: one to five ASCII
/// letters (case-insensitive). Anything else falls back to JP with a
/// warning; class-share forms like `BRK.B` have no dedicated rule and land
/// here too.
pub fn classify(ticker: &str) -> MarketType {
    let ticker = ticker.trim();
    if ticker.is_empty() {
        return MarketType::Jp;
    }

    if ticker.ends_with(DOMESTIC_SUFFIX) {
        return MarketType::Jp;
    }

    if ticker.len() == 4 && ticker.bytes().all(|b| b.is_ascii_digit()) {
        return MarketType::Jp;
    }

    if (1..=5).contains(&ticker.len()) && ticker.bytes().all(|b| b.is_ascii_alphabetic()) {
        return MarketType::Us;
    }

    warn!("could not classify ticker {ticker:?}, defaulting to JP");
    MarketType::Jp
}

/// Format a listing code into the provider's symbol for the given market.
///
/// US symbols are passed through trimmed and uppercased. JP codes keep an
/// existing suffix, numeric codes are zero-padded to four digits, and
/// alphanumeric codes (e.g. `130A`) take the suffix unchanged.
pub fn format_symbol(code: &str, market: MarketType) -> String {
    let code = code.trim();

    match market {
        MarketType::Us => code.to_ascii_uppercase(),
        MarketType::Jp => {
            if code.ends_with(DOMESTIC_SUFFIX) {
                return code.to_string();
            }
            match code.parse::<u64>() {
                Ok(n) => format!("{n:04}{DOMESTIC_SUFFIX}"),
                Err(_) => format!("{code}{DOMESTIC_SUFFIX}"),
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_domestic_codes() {
        assert_eq!(classify("7203"), MarketType::Jp);
        assert_eq!(classify("7203.T"), MarketType::Jp);
        assert_eq!(classify("130A.T"), MarketType::Jp);
    }

    #[test]
    fn classify_foreign_symbols() {
        assert_eq!(classify("AAPL"), MarketType::Us);
        assert_eq!(classify("aapl"), MarketType::Us);
        assert_eq!(classify("V"), MarketType::Us);
        assert_eq!(classify("GOOGL"), MarketType::Us);
    }

    #[test]
    fn classify_falls_back_to_domestic() {
        assert_eq!(classify(""), MarketType::Jp);
        assert_eq!(classify("BRK.B"), MarketType::Jp);
        assert_eq!(classify("TOOLONG"), MarketType::Jp);
        assert_eq!(classify("130A"), MarketType::Jp);
    }

    #[test]
    fn classify_is_total_over_printable_input() {
        for ticker in ["7203", "AAPL", "BRK.B", "  MSFT  ", "①②③", "-", "9984.T"] {
            // must return without panicking, and always one of the two markets
            let market = classify(ticker);
            assert!(matches!(market, MarketType::Jp | MarketType::Us));
        }
    }

    #[test]
    fn format_domestic_symbols() {
        assert_eq!(format_symbol("7203", MarketType::Jp), "7203.T");
        assert_eq!(format_symbol("130A", MarketType::Jp), "130A.T");
        assert_eq!(format_symbol("7203.T", MarketType::Jp), "7203.T");
        // numeric codes are padded to four digits
        assert_eq!(format_symbol("42", MarketType::Jp), "0042.T");
    }

    #[test]
    fn format_foreign_symbols() {
        assert_eq!(format_symbol("aapl", MarketType::Us), "AAPL");
        assert_eq!(format_symbol("  msft ", MarketType::Us), "MSFT");
    }
}
