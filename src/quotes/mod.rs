pub mod io;
pub mod normalizer;
pub mod types;

pub use normalizer::normalize;
pub use types::{
    ColumnAliases, NormalizationReport, Normalized, NormalizedQuote, OptionType, QuoteField,
    RawQuoteRow, RawTable, SideQuote,
};
