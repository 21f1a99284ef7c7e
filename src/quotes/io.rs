//! CSV boundary for the quote pipeline: raw chain tables in, normalized records
//! in and out.

use csv::{ReaderBuilder, Writer};
use std::io::{Read, Write};
use std::path::Path;

use super::types::{NormalizedQuote, RawTable};
use crate::error::SurfaceResult;

/// Read a raw option-chain CSV. Rows may have fewer cells than the header.
pub fn read_raw_table<P: AsRef<Path>>(path: P) -> SurfaceResult<RawTable> {
    let file = std::fs::File::open(path)?;
    read_raw_table_from(file)
}

pub fn read_raw_table_from<R: Read>(reader: R) -> SurfaceResult<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(RawTable::new(headers, rows))
}

/// Write normalized quotes with the columns
/// `quote_date,expire_date,option_type,strike,underlying_last,iv,mid_price,time_to_expiry_years`.
pub fn write_normalized<P: AsRef<Path>>(path: P, quotes: &[NormalizedQuote]) -> SurfaceResult<()> {
    let file = std::fs::File::create(path)?;
    write_normalized_to(file, quotes)
}

pub fn write_normalized_to<W: Write>(writer: W, quotes: &[NormalizedQuote]) -> SurfaceResult<()> {
    let mut wtr = Writer::from_writer(writer);
    for quote in quotes {
        wtr.serialize(quote)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_normalized<P: AsRef<Path>>(path: P) -> SurfaceResult<Vec<NormalizedQuote>> {
    let file = std::fs::File::open(path)?;
    read_normalized_from(file)
}

pub fn read_normalized_from<R: Read>(reader: R) -> SurfaceResult<Vec<NormalizedQuote>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let mut quotes = Vec::new();
    for result in rdr.deserialize() {
        let quote: NormalizedQuote = result?;
        quotes.push(quote);
    }
    Ok(quotes)
}
