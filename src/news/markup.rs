//! Structured-markup ticker extraction: pulls candidate symbols out of
//! `<ticker>` element text and any element's `symbol` attribute
//! (comma-separated), using `quick-xml`'s pull-based reader rather than
//! building a DOM — the only thing a full tree would buy here is
//! de-duplication, which a `BTreeSet` handles directly.
use std::collections::BTreeSet;

use quick_xml::{events::Event, Reader};
use tracing::warn;

/// Extracts candidate ticker symbols from a raw news payload. Returns an
/// empty set (never an error) on malformed markup — extraction failure must
/// not stall the pipeline.
pub fn extract_tickers(markup: &str) -> BTreeSet<String> {
    let mut tickers = BTreeSet::new();
    let mut reader = Reader::from_str(markup);
    reader.trim_text(true);

    let mut in_ticker_tag = false;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(tag)) => {
                in_ticker_tag = tag.name().as_ref() == b"ticker";
                collect_symbol_attribute(&tag, &mut tickers);
            },
            Ok(Event::Empty(tag)) => {
                collect_symbol_attribute(&tag, &mut tickers);
            },
            Ok(Event::Text(text)) if in_ticker_tag => {
                if let Ok(value) = text.unescape() {
                    let trimmed = value.trim();
                    if !trimmed.is_empty() {
                        tickers.insert(trimmed.to_string());
                    }
                }
            },
            Ok(Event::End(tag)) => {
                if tag.name().as_ref() == b"ticker" {
                    in_ticker_tag = false;
                }
            },
            Ok(Event::Eof) => break,
            Err(err) => {
                warn!(%err, "failed to parse news markup");
                return BTreeSet::new();
            },
            _ => {},
        }
        buf.clear();
    }
    tickers
}

fn collect_symbol_attribute(tag: &quick_xml::events::BytesStart, tickers: &mut BTreeSet<String>) {
    let Ok(Some(attr)) = tag.try_get_attribute("symbol") else { return };
    let Ok(value) = attr.unescape_value() else { return };
    for symbol in value.split(',') {
        let trimmed = symbol.trim();
        if !trimmed.is_empty() {
            tickers.insert(trimmed.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_ticker_element_text() {
        let tickers = extract_tickers("<news><ticker>AAPL</ticker><ticker>MSFT</ticker></news>");
        assert_eq!(tickers, BTreeSet::from(["AAPL".to_string(), "MSFT".to_string()]));
    }

    #[test]
    fn extracts_symbol_attribute_and_dedupes() {
        let tickers = extract_tickers(r#"<news><article symbol="SPY,QQQ"/><ticker>SPY</ticker></news>"#);
        assert_eq!(tickers, BTreeSet::from(["SPY".to_string(), "QQQ".to_string()]));
    }

    #[test]
    fn malformed_markup_yields_empty_set() {
        assert!(extract_tickers("<news><unterminated").is_empty());
    }
}
