use super::fixed_sequence::FixedSequenceFeed;
use crate::error::EngineError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::{io::Read, str::FromStr};
use tempo_instrument::{bar::{Bar, BarType}, event::Event};

/// One row of the "Bar CSV import" format (SPEC_FULL.md §6): UTF-8, header
/// `start_dt,end_dt,open,high,low,close,volume`, ISO-8601 UTC timestamps. The [`BarType`] is
/// supplied externally -- it is not embedded in the file.
///
/// Grounded in `barter-strategy`'s use of the `csv` crate to ingest historical bar data for
/// backtests.
#[derive(Debug, serde::Deserialize)]
struct BarRow {
    start_dt: String,
    end_dt: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
}

fn parse_dt(value: &str) -> Result<DateTime<Utc>, EngineError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| EngineError::Validation(format!("invalid ISO-8601 timestamp {value:?}: {err}")))
}

fn parse_decimal(value: &str) -> Result<Decimal, EngineError> {
    Decimal::from_str(value)
        .map_err(|err| EngineError::Validation(format!("invalid decimal {value:?}: {err}")))
}

/// Parses a CSV reader into an ordered [`Vec<Bar>`] for `bar_type`, one per row, in file order.
pub fn bars_from_csv<R: Read>(reader: R, bar_type: &BarType) -> Result<Vec<Bar>, EngineError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut bars = Vec::new();

    for result in rdr.deserialize() {
        let row: BarRow = result.map_err(|err| EngineError::Validation(format!("csv row: {err}")))?;

        let bar = Bar::new(
            bar_type.clone(),
            parse_dt(&row.start_dt)?,
            parse_dt(&row.end_dt)?,
            parse_decimal(&row.open)?,
            parse_decimal(&row.high)?,
            parse_decimal(&row.low)?,
            parse_decimal(&row.close)?,
            parse_decimal(&row.volume)?,
            false,
        )?;
        bars.push(bar);
    }

    Ok(bars)
}

/// Builds a [`FixedSequenceFeed`] from a CSV reader, wrapping each parsed [`Bar`] into an
/// [`Event::bar`] with `dt_received == bar.end_dt` (the CSV format carries no separate ingestion
/// timestamp).
pub fn feed_from_csv<R: Read>(reader: R, bar_type: &BarType) -> Result<FixedSequenceFeed, EngineError> {
    let events = bars_from_csv(reader, bar_type)?
        .into_iter()
        .map(|bar| {
            let dt_received = bar.end_dt;
            Event::bar(bar, dt_received)
        })
        .collect();

    Ok(FixedSequenceFeed::new(events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::EventFeed;
    use rust_decimal_macros::dec;
    use tempo_instrument::bar::{PeriodUnit, PriceType};

    fn bar_type() -> BarType {
        BarType {
            instrument_name: "ES".into(),
            period_value: 1,
            period_unit: PeriodUnit::Minute,
            price_type: PriceType::Last,
        }
    }

    const CSV: &str = "start_dt,end_dt,open,high,low,close,volume\n\
2024-01-01T00:00:00Z,2024-01-01T00:01:00Z,10,12,9,11,100\n\
2024-01-01T00:01:00Z,2024-01-01T00:02:00Z,11,13,10,12,50\n";

    #[test]
    fn parses_rows_into_bars() {
        let bars = bars_from_csv(CSV.as_bytes(), &bar_type()).unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].open, dec!(10));
        assert_eq!(bars[1].close, dec!(12));
    }

    #[test]
    fn feed_replays_bars_as_events_in_order() {
        let mut feed = feed_from_csv(CSV.as_bytes(), &bar_type()).unwrap();

        let first = feed.pop().unwrap();
        assert_eq!(first.dt_event, bars_from_csv(CSV.as_bytes(), &bar_type()).unwrap()[0].end_dt);
        assert!(feed.pop().is_some());
        assert!(feed.is_finished());
    }

    #[test]
    fn rejects_malformed_decimal() {
        let bad = "start_dt,end_dt,open,high,low,close,volume\n2024-01-01T00:00:00Z,2024-01-01T00:01:00Z,x,12,9,11,100\n";
        assert!(bars_from_csv(bad.as_bytes(), &bar_type()).is_err());
    }
}
