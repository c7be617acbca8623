//! In-memory, read-only record store.

use crate::models::SaleRecord;

/// The table of sales records for one analysis run.
///
/// Built once by the loader and never mutated; a new run reloads the CSV and
/// builds a new store.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<SaleRecord>,
}

impl RecordStore {
    pub fn new(records: Vec<SaleRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[SaleRecord] {
        &self.records
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The first `n` records in file order.
    pub fn head(&self, n: usize) -> &[SaleRecord] {
        &self.records[..n.min(self.records.len())]
    }

    /// Distinct non-empty makes in order of first appearance.
    pub fn distinct_makes(&self) -> Vec<&str> {
        let mut makes: Vec<&str> = Vec::new();
        for record in &self.records {
            let make = record.make.as_str();
            if !make.is_empty() && !makes.contains(&make) {
                makes.push(make);
            }
        }
        makes
    }

    /// Records whose make equals `make`, ignoring case.
    pub fn for_make<'a>(&'a self, make: &'a str) -> impl Iterator<Item = &'a SaleRecord> + 'a {
        self.records
            .iter()
            .filter(move |r| r.make.eq_ignore_ascii_case(make))
    }
}

impl FromIterator<SaleRecord> for RecordStore {
    fn from_iter<I: IntoIterator<Item = SaleRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Test fixture: builds a record with derived fields filled in.
#[cfg(test)]
pub(crate) fn record(year: i32, make: &str, model: &str, quantity: u64, price: f64) -> SaleRecord {
    SaleRecord {
        year,
        make: make.to_string(),
        model: model.to_string(),
        quantity,
        region: None,
        price,
        revenue: quantity as f64 * price,
        year_month: format!("{}-01", year),
    }
}
