use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::SurfaceError;

/// Option side. `Call` orders before `Put`, which the normalized sort relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OptionType {
    #[serde(rename = "C", alias = "CALL", alias = "call")]
    Call,
    #[serde(rename = "P", alias = "PUT", alias = "put")]
    Put,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "C",
            Self::Put => "P",
        }
    }
}

impl FromStr for OptionType {
    type Err = SurfaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "C" | "CALL" => Ok(Self::Call),
            "P" | "PUT" => Ok(Self::Put),
            other => Err(SurfaceError::invalid_input(format!(
                "unknown option type '{}' (expected C/CALL or P/PUT)",
                other
            ))),
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal field names a raw option-chain column can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteField {
    QuoteDate,
    ExpireDate,
    UnderlyingLast,
    Strike,
    CallIv,
    PutIv,
    CallBid,
    CallAsk,
    PutBid,
    PutAsk,
    DaysToExpiry,
}

impl QuoteField {
    pub const ALL: [QuoteField; 11] = [
        QuoteField::QuoteDate,
        QuoteField::ExpireDate,
        QuoteField::UnderlyingLast,
        QuoteField::Strike,
        QuoteField::CallIv,
        QuoteField::PutIv,
        QuoteField::CallBid,
        QuoteField::CallAsk,
        QuoteField::PutBid,
        QuoteField::PutAsk,
        QuoteField::DaysToExpiry,
    ];

    /// Lowercase internal name of the field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::QuoteDate => "quote_date",
            Self::ExpireDate => "expire_date",
            Self::UnderlyingLast => "underlying_last",
            Self::Strike => "strike",
            Self::CallIv => "c_iv",
            Self::PutIv => "p_iv",
            Self::CallBid => "c_bid",
            Self::CallAsk => "c_ask",
            Self::PutBid => "p_bid",
            Self::PutAsk => "p_ask",
            Self::DaysToExpiry => "dte",
        }
    }

    /// Bracketed-uppercase header used by end-of-day option-chain exports.
    pub fn source_header(&self) -> &'static str {
        match self {
            Self::QuoteDate => "[QUOTE_DATE]",
            Self::ExpireDate => "[EXPIRE_DATE]",
            Self::UnderlyingLast => "[UNDERLYING_LAST]",
            Self::Strike => "[STRIKE]",
            Self::CallIv => "[C_IV]",
            Self::PutIv => "[P_IV]",
            Self::CallBid => "[C_BID]",
            Self::CallAsk => "[C_ASK]",
            Self::PutBid => "[P_BID]",
            Self::PutAsk => "[P_ASK]",
            Self::DaysToExpiry => "[DTE]",
        }
    }
}

/// Alias table mapping source column headers to [`QuoteField`]s.
///
/// Lookups ignore case and whitespace, so `" [c_iv] "` resolves like `"[C_IV]"`.
#[derive(Debug, Clone)]
pub struct ColumnAliases {
    aliases: HashMap<String, QuoteField>,
}

impl Default for ColumnAliases {
    /// Every field answers to its bracketed source header and its internal name.
    fn default() -> Self {
        let mut table = Self::empty();
        for field in QuoteField::ALL {
            table.insert(field.source_header(), field);
            table.insert(field.name(), field);
        }
        table
    }
}

impl ColumnAliases {
    pub fn empty() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }

    pub fn insert(&mut self, alias: &str, field: QuoteField) {
        self.aliases.insert(alias_key(alias), field);
    }

    pub fn with_alias(mut self, alias: &str, field: QuoteField) -> Self {
        self.insert(alias, field);
        self
    }

    pub fn resolve(&self, header: &str) -> Option<QuoteField> {
        self.aliases.get(&alias_key(header)).copied()
    }
}

fn alias_key(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Raw option-chain table as read from the source: headers plus string cells.
/// Rows may be shorter than the header; missing cells read as empty.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }
}

/// Per-side fields of one raw row.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SideQuote {
    pub implied_vol: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
}

impl SideQuote {
    /// Mid of bid and ask; missing when either leg is missing.
    pub fn mid_price(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some(0.5 * (bid + ask)),
            _ => None,
        }
    }
}

/// One typed row of the source table. Every cell that failed to parse is `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawQuoteRow {
    pub quote_date: Option<NaiveDate>,
    pub expire_date: Option<NaiveDate>,
    pub underlying_last: Option<f64>,
    pub strike: Option<f64>,
    pub days_to_expiry: Option<f64>,
    pub call: SideQuote,
    pub put: SideQuote,
}

impl RawQuoteRow {
    pub fn side(&self, option_type: OptionType) -> &SideQuote {
        match option_type {
            OptionType::Call => &self.call,
            OptionType::Put => &self.put,
        }
    }
}

/// Canonical long-format quote: one row per (quote date, expiry, strike, side).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedQuote {
    pub quote_date: NaiveDate,
    pub expire_date: NaiveDate,
    pub option_type: OptionType,
    pub strike: f64,
    pub underlying_last: f64,
    #[serde(rename = "iv")]
    pub implied_vol: Option<f64>,
    pub mid_price: Option<f64>,
    pub time_to_expiry_years: f64,
}

/// Row accounting for one normalization run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    /// Raw rows read from the table.
    pub rows_in: usize,
    /// Side records emitted before the invariant filter.
    pub candidates: usize,
    /// Records that passed the filter.
    pub kept: usize,
}

impl NormalizationReport {
    pub fn dropped(&self) -> usize {
        self.candidates - self.kept
    }
}

#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub quotes: Vec<NormalizedQuote>,
    pub report: NormalizationReport,
}
