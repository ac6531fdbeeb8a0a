use crate::domain::listing::{Category, NewListing, Price};
use crate::error::{MarketError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One line of a catalog fixture: `title,category,price,summary`.
#[derive(Debug, Deserialize)]
struct FixtureRow {
    title: String,
    category: String,
    price: Decimal,
    #[serde(default)]
    summary: Option<String>,
}

impl TryFrom<FixtureRow> for NewListing {
    type Error = MarketError;

    fn try_from(row: FixtureRow) -> Result<Self> {
        let category: Category = row.category.parse()?;
        let mut listing = NewListing::new(row.title, category, Price::new(row.price)?);
        listing.summary = row.summary;
        listing.validated()
    }
}

/// Reads catalog fixture rows from a CSV source.
///
/// This reader wraps `csv::Reader` and yields one `Result<NewListing>` per
/// record, so a malformed line does not stop the rest of the file.
pub struct ListingReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ListingReader<R> {
    /// Creates a new `ListingReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes and validates each record.
    pub fn listings(self) -> impl Iterator<Item = Result<NewListing>> {
        self.reader.into_deserialize().map(|result| {
            let row: FixtureRow = result?;
            NewListing::try_from(row)
        })
    }
}
