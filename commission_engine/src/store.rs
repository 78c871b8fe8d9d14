//! Record storage.
//!
//! The engine never talks to a database directly.  It reads through the
//! [`RecordSource`] trait, which hands back plain record vectors already
//! filtered to a period range.  [`InMemoryStore`] is the implementation
//! used by the server; it is filled from a directory of JSON files and
//! supports the upserts performed by data entry and bulk import.

use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::{CollectionRecord, CommissionRule, PeriodRange, Representative, SalesRecord};

/// Read access to persisted records.
///
/// Implementations must be thread-safe (`Send + Sync`) because the HTTP
/// layer shares one source across concurrent requests.
pub trait RecordSource: Send + Sync {
    /// Sales records within `range`, optionally for one representative.
    fn sales_records(
        &self,
        range: &PeriodRange,
        representative: Option<&str>,
    ) -> Result<Vec<SalesRecord>, StoreError>;

    /// Collection records within `range`, optionally for one representative.
    fn collection_records(
        &self,
        range: &PeriodRange,
        representative: Option<&str>,
    ) -> Result<Vec<CollectionRecord>, StoreError>;

    fn commission_rules(&self) -> Result<Vec<CommissionRule>, StoreError>;

    fn representatives(&self) -> Result<Vec<Representative>, StoreError>;
}

/// Records held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    sales: Vec<SalesRecord>,
    collections: Vec<CollectionRecord>,
    rules: Vec<CommissionRule>,
    representatives: Vec<Representative>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a sales record or replaces the one with the same
    /// representative, category, year and month.
    pub fn upsert_sales(&mut self, record: SalesRecord) {
        let existing = self.sales.iter_mut().find(|r| {
            r.representative_id == record.representative_id
                && r.category == record.category
                && r.year == record.year
                && r.month == record.month
        });
        match existing {
            Some(slot) => *slot = record,
            None => self.sales.push(record),
        }
    }

    /// Inserts a collection or replaces the one for the same
    /// representative, year and month.
    pub fn upsert_collection(&mut self, record: CollectionRecord) {
        let existing = self.collections.iter_mut().find(|r| {
            r.representative_id == record.representative_id
                && r.year == record.year
                && r.month == record.month
        });
        match existing {
            Some(slot) => *slot = record,
            None => self.collections.push(record),
        }
    }

    /// Inserts a rule or replaces the one for the same category.
    pub fn upsert_rule(&mut self, rule: CommissionRule) {
        match self.rules.iter_mut().find(|r| r.category == rule.category) {
            Some(slot) => *slot = rule,
            None => self.rules.push(rule),
        }
    }

    pub fn add_representative(&mut self, representative: Representative) {
        match self.representatives.iter_mut().find(|r| r.id == representative.id) {
            Some(slot) => *slot = representative,
            None => self.representatives.push(representative),
        }
    }
}

impl RecordSource for InMemoryStore {
    fn sales_records(
        &self,
        range: &PeriodRange,
        representative: Option<&str>,
    ) -> Result<Vec<SalesRecord>, StoreError> {
        Ok(self
            .sales
            .iter()
            .filter(|r| range.contains(r.year, r.month))
            .filter(|r| representative.map_or(true, |id| r.representative_id == id))
            .cloned()
            .collect())
    }

    fn collection_records(
        &self,
        range: &PeriodRange,
        representative: Option<&str>,
    ) -> Result<Vec<CollectionRecord>, StoreError> {
        Ok(self
            .collections
            .iter()
            .filter(|r| range.contains(r.year, r.month))
            .filter(|r| representative.map_or(true, |id| r.representative_id == id))
            .cloned()
            .collect())
    }

    fn commission_rules(&self) -> Result<Vec<CommissionRule>, StoreError> {
        Ok(self.rules.clone())
    }

    fn representatives(&self) -> Result<Vec<Representative>, StoreError> {
        Ok(self.representatives.clone())
    }
}

/// Reads a JSON array from `path`, or an empty vector if the file does
/// not exist.
fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    if !path.is_file() {
        debug!(path = %path.display(), "record file absent, using empty set");
        return Ok(Vec::new());
    }
    let data = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a store from a directory.
///
/// The directory may contain `sales.json`, `collections.json`,
/// `rules.json` and `representatives.json`, each a JSON array.  Missing
/// files are treated as empty.  Records go through the upsert methods,
/// so a later duplicate key replaces an earlier one.
pub fn load_from_dir(dir: &Path) -> Result<InMemoryStore, StoreError> {
    let mut store = InMemoryStore::new();
    for record in read_records::<SalesRecord>(&dir.join("sales.json"))? {
        store.upsert_sales(record);
    }
    for record in read_records::<CollectionRecord>(&dir.join("collections.json"))? {
        store.upsert_collection(record);
    }
    for rule in read_records::<CommissionRule>(&dir.join("rules.json"))? {
        store.upsert_rule(rule);
    }
    for rep in read_records::<Representative>(&dir.join("representatives.json"))? {
        store.add_representative(rep);
    }
    info!(
        sales = store.sales.len(),
        collections = store.collections.len(),
        rules = store.rules.len(),
        representatives = store.representatives.len(),
        dir = %dir.display(),
        "loaded records"
    );
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Period;

    fn sale(rep: &str, category: &str, sales: f64, month: u32) -> SalesRecord {
        SalesRecord {
            representative_id: rep.into(),
            company_id: None,
            category: category.into(),
            sales,
            target: 1000.0,
            year: 2024,
            month,
        }
    }

    fn collection(rep: &str, amount: f64, month: u32) -> CollectionRecord {
        CollectionRecord {
            representative_id: rep.into(),
            company_id: None,
            amount,
            year: 2024,
            month,
        }
    }

    #[test]
    fn upsert_replaces_on_key() {
        let mut store = InMemoryStore::new();
        store.upsert_sales(sale("a", "x", 100.0, 1));
        store.upsert_sales(sale("a", "x", 250.0, 1));
        store.upsert_sales(sale("a", "y", 10.0, 1));
        store.upsert_collection(collection("a", 50.0, 1));
        store.upsert_collection(collection("a", 75.0, 1));

        let range = PeriodRange::single(Period::new(2024, 1).unwrap());
        let sales = store.sales_records(&range, None).unwrap();
        assert_eq!(sales.len(), 2);
        assert_eq!(sales[0].sales, 250.0);
        let collections = store.collection_records(&range, Some("a")).unwrap();
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].amount, 75.0);
    }

    #[test]
    fn filters_by_range_and_representative() {
        let mut store = InMemoryStore::new();
        store.upsert_sales(sale("a", "x", 1.0, 1));
        store.upsert_sales(sale("a", "x", 2.0, 2));
        store.upsert_sales(sale("b", "x", 3.0, 2));
        let range = PeriodRange::new(Period::new(2024, 2).unwrap(), Period::new(2024, 6).unwrap()).unwrap();
        assert_eq!(store.sales_records(&range, None).unwrap().len(), 2);
        let only_b = store.sales_records(&range, Some("b")).unwrap();
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].sales, 3.0);
    }

    #[test]
    fn loads_directory_with_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("sales.json"),
            r#"[{"representative_id":"a","company_id":"c1","category":"x","sales":10,"target":20,"year":2024,"month":5}]"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("rules.json"),
            r#"[{"category":"x","tier1_rate":0.1,"tier2_rate":0.2,"tier3_rate":0.3,"tier1_from":0,"tier1_to":70}]"#,
        )
        .unwrap();

        let store = load_from_dir(dir.path()).unwrap();
        let range = PeriodRange::single(Period::new(2024, 5).unwrap());
        assert_eq!(store.sales_records(&range, None).unwrap().len(), 1);
        assert!(store.collection_records(&range, None).unwrap().is_empty());
        assert_eq!(store.commission_rules().unwrap()[0].tier1_to, Some(70.0));
        assert!(store.representatives().unwrap().is_empty());
    }

    #[test]
    fn malformed_file_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("collections.json"), "not json").unwrap();
        let err = load_from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
        assert!(err.to_string().contains("collections.json"));
    }
}
