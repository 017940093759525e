//! Raw price series validation and cleaning.
//!
//! Turns one ticker's raw table into a [`CleanSeries`]: parse, sort, de-duplicate,
//! drop non-positive and OHLC-inconsistent rows, then attach return, log return,
//! range and RSI. Rows whose derived fields are undefined are dropped.

use chrono::NaiveDate;
use ohlcv_core::config::CleaningConfig;
use ohlcv_core::rolling::rsi_series;
use ohlcv_core::{CleanRow, CleanSeries, Error, OhlcvRecord, RawTable, Result, DATE_FORMAT};
use tracing::debug;

/// Required columns, each with accepted header spellings in priority order.
const REQUIRED_COLUMNS: [(&str, &[&str]); 7] = [
    ("Date", &["Date"]),
    ("Open", &["Open"]),
    ("High", &["High"]),
    ("Low", &["Low"]),
    ("RawClose", &["RawClose", "Raw_Close"]),
    ("AdjClose", &["AdjClose", "Adj_Close"]),
    ("Volume", &["Volume"]),
];

/// Row counts from one cleaning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleaningStats {
    /// Rows in the raw table.
    pub input_rows: usize,
    /// Rows with an unparseable date or non-numeric field.
    pub unparseable_rows: usize,
    /// Rows superseded by a later row with the same date.
    pub duplicate_rows: usize,
    /// Rows with volume <= 0.
    pub non_positive_volume: usize,
    /// Rows with any price <= 0.
    pub non_positive_price: usize,
    /// Rows violating high/low bounds.
    pub ohlc_inconsistent: usize,
    /// Rows dropped because return or RSI was undefined.
    pub warmup_rows: usize,
    /// Rows retained.
    pub output_rows: usize,
}

/// Column positions resolved against a raw table header.
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    raw_close: usize,
    adj_close: usize,
    volume: usize,
}

impl ColumnMap {
    fn resolve(raw: &RawTable) -> Result<Self> {
        let mut idx = [0usize; 7];
        for (slot, (name, spellings)) in idx.iter_mut().zip(REQUIRED_COLUMNS.iter()) {
            *slot = spellings
                .iter()
                .find_map(|s| raw.column_index(s))
                .ok_or_else(|| Error::schema(format!("missing column {name}")))?;
        }
        Ok(Self {
            date: idx[0],
            open: idx[1],
            high: idx[2],
            low: idx[3],
            raw_close: idx[4],
            adj_close: idx[5],
            volume: idx[6],
        })
    }
}

/// A row after coercion, before filtering. Volume is signed so that
/// non-positive values survive to the volume filter.
#[derive(Debug, Clone, Copy)]
struct ParsedRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    raw_close: f64,
    adj_close: f64,
    volume: i64,
}

impl ParsedRow {
    fn to_record(self) -> Option<OhlcvRecord> {
        Some(OhlcvRecord {
            date: self.date,
            open: self.open,
            high: self.high,
            low: self.low,
            raw_close: self.raw_close,
            adj_close: self.adj_close,
            volume: u64::try_from(self.volume).ok()?,
        })
    }
}

/// Validates and normalizes raw price tables.
#[derive(Debug, Clone)]
pub struct Cleaner {
    /// RSI window.
    rsi_period: usize,
}

impl Cleaner {
    /// Create a new cleaner from configuration.
    pub fn new(config: &CleaningConfig) -> Self {
        Self {
            rsi_period: config.rsi_period,
        }
    }

    /// Clean a raw table.
    ///
    /// Fails with [`Error::Schema`] when a required column is absent and with
    /// [`Error::DataQuality`] when no row survives.
    pub fn clean(&self, raw: &RawTable) -> Result<CleanSeries> {
        self.clean_with_stats(raw).map(|(series, _)| series)
    }

    /// Clean a raw table and report what was dropped at each step.
    pub fn clean_with_stats(&self, raw: &RawTable) -> Result<(CleanSeries, CleaningStats)> {
        let cols = ColumnMap::resolve(raw)?;
        let mut stats = CleaningStats {
            input_rows: raw.len(),
            ..Default::default()
        };

        let mut rows: Vec<ParsedRow> = (0..raw.len())
            .filter_map(|i| parse_row(raw, i, &cols))
            .collect();
        stats.unparseable_rows = stats.input_rows - rows.len();

        // Stable sort keeps file order among equal dates, so the last one wins below.
        rows.sort_by_key(|r| r.date);
        let before = rows.len();
        let rows = dedup_last(rows);
        stats.duplicate_rows = before - rows.len();

        let (rows, dropped): (Vec<_>, Vec<_>) = rows.into_iter().partition(|r| r.volume > 0);
        stats.non_positive_volume = dropped.len();

        let records: Vec<OhlcvRecord> = rows.into_iter().filter_map(ParsedRow::to_record).collect();

        let before = records.len();
        let records: Vec<OhlcvRecord> = records.into_iter().filter(|r| r.has_positive_prices()).collect();
        stats.non_positive_price = before - records.len();

        let before = records.len();
        let records: Vec<OhlcvRecord> = records.into_iter().filter(|r| r.is_ohlc_consistent()).collect();
        stats.ohlc_inconsistent = before - records.len();

        let clean_rows = self.derive(&records);
        stats.warmup_rows = records.len() - clean_rows.len();
        stats.output_rows = clean_rows.len();

        debug!(
            input = stats.input_rows,
            unparseable = stats.unparseable_rows,
            duplicates = stats.duplicate_rows,
            bad_volume = stats.non_positive_volume,
            bad_price = stats.non_positive_price,
            ohlc = stats.ohlc_inconsistent,
            warmup = stats.warmup_rows,
            output = stats.output_rows,
            "cleaning pass finished"
        );

        if clean_rows.is_empty() {
            return Err(Error::data_quality(format!(
                "no usable rows after cleaning ({} input rows)",
                stats.input_rows
            )));
        }
        Ok((CleanSeries::new(clean_rows), stats))
    }

    /// Attach derived fields, keeping only rows where all of them are finite.
    fn derive(&self, records: &[OhlcvRecord]) -> Vec<CleanRow> {
        let closes: Vec<f64> = records.iter().map(|r| r.adj_close).collect();
        let rsi = rsi_series(&closes, self.rsi_period);

        records
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(i, bar)| {
                let ratio = closes[i] / closes[i - 1];
                let row = CleanRow {
                    bar: *bar,
                    ret: ratio - 1.0,
                    log_return: ratio.ln(),
                    volatility: bar.range(),
                    rsi_14: rsi[i]?,
                };
                let finite = [row.ret, row.log_return, row.volatility, row.rsi_14]
                    .iter()
                    .all(|v| v.is_finite());
                finite.then_some(row)
            })
            .collect()
    }
}

/// Keep the last row of each run of equal dates in a date-sorted vector.
fn dedup_last(rows: Vec<ParsedRow>) -> Vec<ParsedRow> {
    let mut out: Vec<ParsedRow> = Vec::with_capacity(rows.len());
    for row in rows {
        match out.last_mut() {
            Some(last) if last.date == row.date => *last = row,
            _ => out.push(row),
        }
    }
    out
}

fn parse_row(raw: &RawTable, i: usize, cols: &ColumnMap) -> Option<ParsedRow> {
    let cell = |c: usize| raw.cell(i, c);
    Some(ParsedRow {
        date: parse_date(cell(cols.date)?)?,
        open: parse_price(cell(cols.open)?)?,
        high: parse_price(cell(cols.high)?)?,
        low: parse_price(cell(cols.low)?)?,
        raw_close: parse_price(cell(cols.raw_close)?)?,
        adj_close: parse_price(cell(cols.adj_close)?)?,
        volume: parse_volume(cell(cols.volume)?)?,
    })
}

/// Strict `YYYY-MM-DD`; anything else is treated as null.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

fn parse_price(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Integer text, or float text with no fractional part.
fn parse_volume(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const HEADER: [&str; 7] = ["Date", "Open", "High", "Low", "RawClose", "AdjClose", "Volume"];

    fn table(rows: Vec<[String; 7]>) -> RawTable {
        RawTable::new(
            HEADER.iter().map(|s| s.to_string()).collect(),
            rows.into_iter().map(|r| r.to_vec()).collect(),
        )
    }

    fn day(i: i64) -> String {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (base + chrono::Duration::days(i)).format(DATE_FORMAT).to_string()
    }

    /// A valid bar whose close oscillates so RSI has both gains and losses.
    fn good_row(i: i64) -> [String; 7] {
        let close = 100.0 + (i % 5) as f64 + i as f64 * 0.1;
        [
            day(i),
            format!("{}", close - 0.5),
            format!("{}", close + 1.0),
            format!("{}", close - 1.0),
            format!("{close}"),
            format!("{close}"),
            "1000".to_string(),
        ]
    }

    fn good_table(n: i64) -> RawTable {
        table((0..n).map(good_row).collect())
    }

    fn cleaner() -> Cleaner {
        Cleaner::new(&CleaningConfig::default())
    }

    #[test]
    fn test_missing_volume_is_schema_error() {
        let mut raw = good_table(30);
        raw.headers.pop();
        for row in raw.rows.iter_mut() {
            row.pop();
        }
        let err = cleaner().clean(&raw).unwrap_err();
        assert!(matches!(err, Error::Schema(ref m) if m.contains("Volume")));
    }

    #[test]
    fn test_underscore_aliases_accepted() {
        let mut raw = good_table(30);
        raw.headers[4] = "Raw_Close".to_string();
        raw.headers[5] = "Adj_Close".to_string();
        assert!(cleaner().clean(&raw).is_ok());
    }

    #[test]
    fn test_warmup_rows_dropped() {
        let (series, stats) = cleaner().clean_with_stats(&good_table(40)).unwrap();
        // Row 0 has no prior close; rows 1..=13 have fewer than 14 price changes.
        assert_eq!(series.len(), 40 - 14);
        assert_eq!(stats.warmup_rows, 14);
        assert_eq!(series.rows[0].bar.date.format(DATE_FORMAT).to_string(), day(14));
    }

    #[test]
    fn test_derived_fields() {
        let series = cleaner().clean(&good_table(40)).unwrap();
        let prev = &series.rows[0];
        let row = &series.rows[1];
        let ratio = row.bar.adj_close / prev.bar.adj_close;
        assert_relative_eq!(row.ret, ratio - 1.0, epsilon = 1e-12);
        assert_relative_eq!(row.log_return, ratio.ln(), epsilon = 1e-12);
        assert_relative_eq!(row.volatility, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_bad_rows_filtered() {
        let mut rows: Vec<[String; 7]> = (0..40).map(good_row).collect();
        // Unparseable date formats
        rows[20][0] = "2024/01/21".to_string();
        rows[21][0] = "2024-01-22 09:30:00".to_string();
        // Non-numeric price
        rows[22][1] = "n/a".to_string();
        // Zero volume
        rows[23][6] = "0".to_string();
        // Negative price
        rows[24][3] = "-1".to_string();
        // High below close
        rows[25][2] = "50".to_string();

        let (series, stats) = cleaner().clean_with_stats(&table(rows)).unwrap();
        assert_eq!(stats.unparseable_rows, 3);
        assert_eq!(stats.non_positive_volume, 1);
        assert_eq!(stats.non_positive_price, 1);
        assert_eq!(stats.ohlc_inconsistent, 1);
        assert!(series.validate().is_ok());
    }

    #[test]
    fn test_duplicate_date_last_wins() {
        let mut rows: Vec<[String; 7]> = (0..30).map(good_row).collect();
        let mut dup = good_row(25);
        dup[6] = "7777".to_string();
        rows.push(dup);
        // Shuffle order to exercise the sort
        rows.swap(3, 27);

        let (series, stats) = cleaner().clean_with_stats(&table(rows)).unwrap();
        assert_eq!(stats.duplicate_rows, 1);
        let hit = series
            .rows
            .iter()
            .find(|r| r.bar.date.format(DATE_FORMAT).to_string() == day(25))
            .unwrap();
        assert_eq!(hit.bar.volume, 7777);
        assert!(series.validate().is_ok());
    }

    #[test]
    fn test_duplicate_superseded_by_zero_volume_drops_day() {
        let mut rows: Vec<[String; 7]> = (0..30).map(good_row).collect();
        let mut dup = good_row(25);
        dup[6] = "0".to_string();
        rows.push(dup);

        let series = cleaner().clean(&table(rows)).unwrap();
        assert!(series
            .rows
            .iter()
            .all(|r| r.bar.date.format(DATE_FORMAT).to_string() != day(25)));
    }

    #[test]
    fn test_undecodable_cell_drops_only_its_row() {
        let mut csv = HEADER.join(",").into_bytes();
        csv.push(b'\n');
        for i in 0..40 {
            csv.extend_from_slice(good_row(i).join(",").as_bytes());
            csv.push(b'\n');
        }
        csv.extend_from_slice(b"2024-12-31,\xff,1,1,1,1,1\n");
        let raw = crate::table::read_table_from(&csv[..]).unwrap();
        assert_eq!(raw.len(), 41);

        let (series, stats) = cleaner().clean_with_stats(&raw).unwrap();
        assert_eq!(stats.unparseable_rows, 1);
        assert_eq!(series.len(), 40 - 14);
    }

    #[test]
    fn test_float_volume_coercion() {
        assert_eq!(parse_volume("1200.0"), Some(1200));
        assert_eq!(parse_volume("12.5"), None);
        assert_eq!(parse_volume("abc"), None);
        assert_eq!(parse_volume("-3"), Some(-3));
    }

    #[test]
    fn test_too_short_is_data_quality_error() {
        let err = cleaner().clean(&good_table(10)).unwrap_err();
        assert!(matches!(err, Error::DataQuality(_)));
    }

    #[test]
    fn test_deterministic() {
        let mut rows: Vec<[String; 7]> = (0..60).map(good_row).collect();
        rows.swap(10, 40);
        rows[15][6] = "x".to_string();
        let raw = table(rows);
        assert_eq!(cleaner().clean(&raw).unwrap(), cleaner().clean(&raw).unwrap());
    }

    #[test]
    fn test_rsi_within_bounds() {
        let series = cleaner().clean(&good_table(120)).unwrap();
        assert!(series.rows.iter().all(|r| (0.0..=100.0).contains(&r.rsi_14)));
    }
}
