use super::{MemoryStore, prepare_new, sort_oldest_first, validate_record};
use crate::error::MemoryError;
use crate::model::{MemoryFilter, MemoryId, MemoryRecord};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Store holding records in process memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<MemoryId, MemoryRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn add(&self, record: MemoryRecord) -> Result<MemoryRecord, MemoryError> {
        let record = prepare_new(record)?;
        let mut records = self.records.write();
        if records.contains_key(&record.meta.id) {
            return Err(MemoryError::DuplicateId(record.meta.id));
        }
        records.insert(record.meta.id.clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryRecord>, MemoryError> {
        Ok(self.records.read().get(id).cloned())
    }

    async fn update(&self, record: MemoryRecord) -> Result<(), MemoryError> {
        validate_record(&record)?;
        let mut records = self.records.write();
        match records.get_mut(&record.meta.id) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(MemoryError::NotFound(record.meta.id)),
        }
    }

    async fn purge(&self, id: &str) -> Result<bool, MemoryError> {
        Ok(self.records.write().remove(id).is_some())
    }

    async fn query(&self, filter: &MemoryFilter) -> Result<Vec<MemoryRecord>, MemoryError> {
        let mut matched = self
            .records
            .read()
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect::<Vec<_>>();
        sort_oldest_first(&mut matched);
        Ok(matched)
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.records.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryStore;
    use crate::error::MemoryError;
    use crate::model::{MemoryFilter, MemoryRecord, MemoryType, Scope};
    use crate::store::MemoryStore;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn crud_round_trip() {
        let store = InMemoryStore::new();
        let scope = Scope::new("generic", "default");
        let record = store
            .add(MemoryRecord::new(&scope, MemoryType::Core, "ship v1", Utc::now()))
            .await
            .expect("add");
        assert!(matches!(
            store.add(record.clone()).await,
            Err(MemoryError::DuplicateId(_))
        ));

        let mut edited = record.clone();
        edited.body.text = "ship v2".to_string();
        store.update(edited.clone()).await.expect("update");
        assert_eq!(store.get(&record.meta.id).await.expect("get"), Some(edited));

        let by_type = store
            .query(&MemoryFilter::in_scope(&scope).with_type(MemoryType::Persona))
            .await
            .expect("query");
        assert!(by_type.is_empty());

        assert!(store.purge(&record.meta.id).await.expect("purge"));
        assert!(store.is_empty());
        let missing = MemoryRecord::new(&scope, MemoryType::Core, "x", Utc::now());
        assert!(matches!(
            store.update(missing).await,
            Err(MemoryError::NotFound(_))
        ));
    }
}
