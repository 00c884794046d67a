use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{apply_update, check_guards, Document, Filter, Storage, StorageError, StorageResult, WriteOp};

type Collections = HashMap<String, BTreeMap<String, Value>>;

/// In-process document store.
///
/// A batch stages its effects against a snapshot taken under the write lock
/// and only publishes them once every operation has succeeded, so a failed
/// batch leaves the store untouched.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    collections: RwLock<Collections>,
    injected_failures: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` atomic writes fail with `Unavailable` after
    /// staging, as a dropped connection during commit would.
    pub fn fail_next_writes(&self, count: usize) {
        self.injected_failures.store(count, Ordering::SeqCst);
    }

    fn take_injected_failure(&self) -> bool {
        self.injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn current<'a>(
    staged: &'a HashMap<(String, String), Option<Value>>,
    base: &'a Collections,
    collection: &str,
    id: &str,
) -> Option<&'a Value> {
    match staged.get(&(collection.to_string(), id.to_string())) {
        Some(staged) => staged.as_ref(),
        None => base.get(collection).and_then(|docs| docs.get(id)),
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|body| Document::new(id, body.clone())))
    }

    async fn query(&self, collection: &str, filters: &[Filter]) -> StorageResult<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        Ok(docs
            .iter()
            .filter(|(_, body)| filters.iter().all(|filter| filter.matches(body)))
            .map(|(id, body)| Document::new(id.clone(), body.clone()))
            .collect())
    }

    async fn atomic_write(&self, ops: Vec<WriteOp>) -> StorageResult<()> {
        let mut collections = self.collections.write().await;
        let mut staged: HashMap<(String, String), Option<Value>> = HashMap::new();

        for op in &ops {
            match op {
                WriteOp::Insert { collection, document } => {
                    if current(&staged, &collections, collection, &document.id).is_some() {
                        return Err(StorageError::Conflict(format!(
                            "{}/{} already exists",
                            collection, document.id
                        )));
                    }
                    staged.insert((collection.clone(), document.id.clone()), Some(document.body.clone()));
                }
                WriteOp::Update { collection, id, guards, changes } => {
                    let mut body = current(&staged, &collections, collection, id)
                        .cloned()
                        .ok_or_else(|| StorageError::NotFound {
                            collection: collection.clone(),
                            id: id.clone(),
                        })?;
                    apply_update(collection, id, guards, changes, &mut body)?;
                    staged.insert((collection.clone(), id.clone()), Some(body));
                }
                WriteOp::Delete { collection, id, guards } => {
                    let exists = match current(&staged, &collections, collection, id) {
                        Some(body) => {
                            check_guards(collection, id, guards, body)?;
                            true
                        }
                        None => false,
                    };
                    if exists {
                        staged.insert((collection.clone(), id.clone()), None);
                    }
                }
            }
        }

        if self.take_injected_failure() {
            warn!("Injected write failure, discarding {} staged operations", ops.len());
            return Err(StorageError::Unavailable("injected write failure".to_string()));
        }

        for ((collection, id), body) in staged {
            let docs = collections.entry(collection).or_default();
            match body {
                Some(body) => {
                    docs.insert(id, body);
                }
                None => {
                    docs.remove(&id);
                }
            }
        }

        debug!("Committed batch of {} operations", ops.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Change, Guard};
    use serde_json::json;

    fn doc(id: &str, body: Value) -> Document {
        Document::new(id, body)
    }

    #[tokio::test]
    async fn duplicate_insert_in_one_batch_conflicts() {
        let storage = MemoryStorage::new();
        let err = storage
            .atomic_write(vec![
                WriteOp::insert("claims", doc("s1_A_1", json!({"booking_id": "b1"}))),
                WriteOp::insert("claims", doc("s1_A_1", json!({"booking_id": "b1"}))),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Conflict(_)));
        assert!(storage.get("claims", "s1_A_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_guard_discards_earlier_operations() {
        let storage = MemoryStorage::new();
        storage
            .atomic_write(vec![WriteOp::insert("counters", doc("c", json!({"n": 1})))])
            .await
            .unwrap();

        let err = storage
            .atomic_write(vec![
                WriteOp::insert("things", doc("t1", json!({}))),
                WriteOp::update("counters", "c", vec![Guard::at_least("n", 2)], vec![Change::increment("n", -2)]),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Conflict(_)));
        assert!(storage.get("things", "t1").await.unwrap().is_none());
        let counter = storage.get("counters", "c").await.unwrap().unwrap();
        assert_eq!(counter.body["n"], 1);
    }

    #[tokio::test]
    async fn injected_failure_leaves_store_untouched() {
        let storage = MemoryStorage::new();
        storage.fail_next_writes(1);

        let err = storage
            .atomic_write(vec![WriteOp::insert("things", doc("t1", json!({})))])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));
        assert!(storage.get("things", "t1").await.unwrap().is_none());

        storage
            .atomic_write(vec![WriteOp::insert("things", doc("t1", json!({})))])
            .await
            .unwrap();
        assert!(storage.get("things", "t1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_of_missing_document_is_a_no_op() {
        let storage = MemoryStorage::new();
        storage
            .atomic_write(vec![WriteOp::delete("claims", "missing", vec![Guard::equals("booking_id", "b1")])])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn query_applies_all_filters() {
        let storage = MemoryStorage::new();
        storage
            .atomic_write(vec![
                WriteOp::insert("bookings", doc("b1", json!({"showtime_id": "s1", "status": "PENDING"}))),
                WriteOp::insert("bookings", doc("b2", json!({"showtime_id": "s1", "status": "CANCELLED"}))),
                WriteOp::insert("bookings", doc("b3", json!({"showtime_id": "s2", "status": "PENDING"}))),
            ])
            .await
            .unwrap();

        let found = storage
            .query("bookings", &[Filter::eq("showtime_id", "s1"), Filter::eq("status", "PENDING")])
            .await
            .unwrap();
        let ids: Vec<_> = found.into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["b1".to_string()]);
    }
}
