use crate::error::Result;
use crate::models::{KeyStorage, KeyTable, Report, StationSummary};

pub struct ResultAggregator {
    table_capacity: usize,
}

impl ResultAggregator {
    pub fn new(table_capacity: usize) -> Self {
        Self { table_capacity }
    }

    /// Fold per-worker tables into one. No tables gives an empty table.
    pub fn reduce<'a>(&self, tables: Vec<KeyTable<'a>>) -> Result<KeyTable<'a>> {
        let mut tables = tables.into_iter();
        let Some(mut merged) = tables.next() else {
            return Ok(KeyTable::new(self.table_capacity, KeyStorage::Owned));
        };

        for table in tables {
            merged.merge_from(table)?;
        }
        Ok(merged)
    }

    /// Final per-station statistics, sorted by the raw bytes of the name.
    pub fn report(&self, table: &KeyTable<'_>) -> Report {
        let mut rows: Vec<_> = table.iter().filter(|(_, acc)| !acc.is_empty()).collect();
        rows.sort_unstable_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));

        let stations = rows
            .into_iter()
            .map(|(name, acc)| StationSummary {
                name: name.to_string_lossy().into_owned(),
                min: acc.min as i64,
                mean: acc.mean_tenths(),
                max: acc.max as i64,
                count: acc.count,
            })
            .collect();

        Report { stations }
    }
}
