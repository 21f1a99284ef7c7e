//! Option-chain normalization.
//!
//! Turns a wide raw table (call and put columns side by side) into the long
//! [`NormalizedQuote`] record set. Parse failures never raise: a cell that does
//! not parse is treated as missing, and records missing a required field are
//! dropped by the invariant filter and counted in the [`NormalizationReport`].

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info};

use super::types::{
    ColumnAliases, NormalizationReport, Normalized, NormalizedQuote, OptionType, QuoteField,
    RawQuoteRow, RawTable, SideQuote,
};

const DAYS_PER_YEAR: f64 = 365.0;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y%m%d"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Parse a date cell, accepting plain dates, naive timestamps and RFC 3339.
pub fn parse_date(cell: &str) -> Option<NaiveDate> {
    let s = cell.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    let dt = DateTime::parse_from_rfc3339(s).ok()?;
    Some(dt.date_naive())
}

/// Parse a numeric cell. Non-numeric and non-finite values are missing.
pub fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Column positions of the fields present in a table's header.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    positions: HashMap<QuoteField, usize>,
}

impl ColumnMap {
    /// Resolve headers against the alias table. Unmapped columns are ignored;
    /// when two headers map to the same field the first one wins.
    pub fn resolve(headers: &[String], aliases: &ColumnAliases) -> Self {
        let mut positions = HashMap::new();
        for (idx, header) in headers.iter().enumerate() {
            if let Some(field) = aliases.resolve(header) {
                positions.entry(field).or_insert(idx);
            }
        }
        Self { positions }
    }

    pub fn has(&self, field: QuoteField) -> bool {
        self.positions.contains_key(&field)
    }

    /// Sides whose implied-vol column exists in the schema.
    pub fn sides(&self) -> Vec<OptionType> {
        let mut sides = Vec::with_capacity(2);
        if self.has(QuoteField::CallIv) {
            sides.push(OptionType::Call);
        }
        if self.has(QuoteField::PutIv) {
            sides.push(OptionType::Put);
        }
        sides
    }

    fn cell<'a>(&self, row: &'a [String], field: QuoteField) -> Option<&'a str> {
        self.positions
            .get(&field)
            .and_then(|&idx| row.get(idx))
            .map(String::as_str)
    }

    fn number(&self, row: &[String], field: QuoteField) -> Option<f64> {
        self.cell(row, field).and_then(parse_number)
    }

    fn date(&self, row: &[String], field: QuoteField) -> Option<NaiveDate> {
        self.cell(row, field).and_then(parse_date)
    }

    /// Coerce one raw row into its typed form.
    pub fn read_row(&self, row: &[String]) -> RawQuoteRow {
        RawQuoteRow {
            quote_date: self.date(row, QuoteField::QuoteDate),
            expire_date: self.date(row, QuoteField::ExpireDate),
            underlying_last: self.number(row, QuoteField::UnderlyingLast),
            strike: self.number(row, QuoteField::Strike),
            days_to_expiry: self.number(row, QuoteField::DaysToExpiry),
            call: SideQuote {
                implied_vol: self.number(row, QuoteField::CallIv),
                bid: self.number(row, QuoteField::CallBid),
                ask: self.number(row, QuoteField::CallAsk),
            },
            put: SideQuote {
                implied_vol: self.number(row, QuoteField::PutIv),
                bid: self.number(row, QuoteField::PutBid),
                ask: self.number(row, QuoteField::PutAsk),
            },
        }
    }
}

/// Build the record for one side of a raw row, or `None` if it violates the
/// normalized-quote invariant (required field missing or non-positive expiry).
pub fn side_record(raw: &RawQuoteRow, option_type: OptionType) -> Option<NormalizedQuote> {
    let side = raw.side(option_type);
    let time_to_expiry_years = raw.days_to_expiry? / DAYS_PER_YEAR;
    if time_to_expiry_years <= 0.0 {
        return None;
    }

    Some(NormalizedQuote {
        quote_date: raw.quote_date?,
        expire_date: raw.expire_date?,
        option_type,
        strike: raw.strike?,
        underlying_last: raw.underlying_last?,
        implied_vol: side.implied_vol,
        mid_price: side.mid_price(),
        time_to_expiry_years,
    })
}

/// Ascending by (quote date, expiry, strike, side), calls before puts.
pub fn record_order(a: &NormalizedQuote, b: &NormalizedQuote) -> Ordering {
    a.quote_date
        .cmp(&b.quote_date)
        .then(a.expire_date.cmp(&b.expire_date))
        .then(a.strike.total_cmp(&b.strike))
        .then(a.option_type.cmp(&b.option_type))
}

/// Normalize a raw option-chain table into sorted long-format quotes.
pub fn normalize(table: &RawTable, aliases: &ColumnAliases) -> Normalized {
    let columns = ColumnMap::resolve(&table.headers, aliases);
    let sides = columns.sides();
    if sides.is_empty() {
        debug!("no implied-vol column for either side; nothing to emit");
    }

    let mut report = NormalizationReport {
        rows_in: table.rows.len(),
        ..NormalizationReport::default()
    };
    let mut quotes = Vec::with_capacity(table.rows.len() * sides.len());

    for row in &table.rows {
        let raw = columns.read_row(row);
        for &side in &sides {
            report.candidates += 1;
            if let Some(quote) = side_record(&raw, side) {
                quotes.push(quote);
            }
        }
    }

    quotes.sort_by(record_order);
    report.kept = quotes.len();

    info!(
        rows_in = report.rows_in,
        candidates = report.candidates,
        kept = report.kept,
        dropped = report.dropped(),
        "normalized option chain"
    );

    Normalized { quotes, report }
}
