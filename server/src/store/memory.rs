use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use super::path::LedgerPath;
use super::tree::{assemble, child_names, flatten};
use super::{LedgerError, LedgerStore};

/// Process-local ledger used when no database is configured, and by tests.
///
/// Faults can be injected to rehearse a flaky venue network: the whole store
/// can be taken offline, writes can be failed on their own, and reads can be
/// slowed down.
#[derive(Default)]
pub struct InMemoryLedger {
    entries: RwLock<BTreeMap<String, Value>>,
    offline: AtomicBool,
    writes_failing: AtomicBool,
    read_delay_ms: AtomicU64,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, failing: bool) {
        self.writes_failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_read_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.read_delay_ms.store(millis, Ordering::SeqCst);
    }

    async fn before_read(&self) -> Result<(), LedgerError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("in-memory ledger is offline".to_string()));
        }
        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(())
    }

    fn before_write(&self) -> Result<(), LedgerError> {
        if self.offline.load(Ordering::SeqCst) || self.writes_failing.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("in-memory ledger rejected the write".to_string()));
        }
        Ok(())
    }
}

fn subtree<'a>(
    entries: &'a BTreeMap<String, Value>,
    path: &LedgerPath,
) -> impl Iterator<Item = (&'a str, &'a Value)> {
    let own = entries
        .get_key_value(&path.key())
        .filter(|_| !path.is_root());
    let prefix = path.descendant_prefix();
    let descendants = entries
        .range(prefix.clone()..)
        .take_while(move |(key, _)| key.starts_with(prefix.as_str()));
    own.into_iter()
        .chain(descendants)
        .map(|(key, value)| (key.as_str(), value))
}

fn replace_subtree(entries: &mut BTreeMap<String, Value>, path: &LedgerPath, value: Value) {
    let doomed: Vec<String> = subtree(entries, path).map(|(key, _)| key.to_string()).collect();
    for key in doomed {
        entries.remove(&key);
    }
    entries.extend(flatten(path, value));
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn get(&self, path: &LedgerPath) -> Result<Option<Value>, LedgerError> {
        self.before_read().await?;
        let entries = self.entries.read().await;
        Ok(assemble(path, subtree(&entries, path)))
    }

    async fn set(&self, path: &LedgerPath, value: Value) -> Result<(), LedgerError> {
        self.before_write()?;
        let mut entries = self.entries.write().await;
        replace_subtree(&mut entries, path, value);
        Ok(())
    }

    async fn children(&self, path: &LedgerPath) -> Result<Vec<String>, LedgerError> {
        self.before_read().await?;
        let entries = self.entries.read().await;
        let keys = subtree(&entries, path).map(|(key, _)| key);
        Ok(child_names(path, keys))
    }

    async fn compare_and_set(
        &self,
        path: &LedgerPath,
        expected: Option<&Value>,
        new: Value,
    ) -> Result<bool, LedgerError> {
        self.before_write()?;
        let mut entries = self.entries.write().await;
        let current = assemble(path, subtree(&entries, path));
        if current.as_ref() != expected {
            return Ok(false);
        }
        replace_subtree(&mut entries, path, new);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn ticket_path(n: u32) -> LedgerPath {
        LedgerPath::root().child("tickets").child(n.to_string())
    }

    #[tokio::test]
    async fn test_set_replaces_whole_subtree() {
        let ledger = InMemoryLedger::new();
        let path = ticket_path(1);

        ledger.set(&path, json!({ "code": "A", "note": "x" })).await.unwrap();
        ledger.set(&path, json!({ "code": "B" })).await.unwrap();

        assert_eq!(ledger.get(&path).await.unwrap(), Some(json!({ "code": "B" })));
        ledger.set(&path, Value::Null).await.unwrap();
        assert_eq!(ledger.get(&path).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_children_lists_sequence_numbers() {
        let ledger = InMemoryLedger::new();
        for n in [1, 2, 10] {
            ledger.set(&ticket_path(n), json!({ "code": n })).await.unwrap();
        }
        let names = ledger.children(&LedgerPath::root().child("tickets")).await.unwrap();
        assert_eq!(names, vec!["1", "10", "2"]);
    }

    #[tokio::test]
    async fn test_compare_and_set_on_absent_and_present_values() {
        let ledger = InMemoryLedger::new();
        let flag = ticket_path(1).child("validated");

        assert!(ledger.compare_and_set(&flag, None, json!(false)).await.unwrap());
        assert!(!ledger.compare_and_set(&flag, None, json!(true)).await.unwrap());
        assert!(ledger
            .compare_and_set(&flag, Some(&json!(false)), json!(true))
            .await
            .unwrap());
        assert!(!ledger
            .compare_and_set(&flag, Some(&json!(false)), json!(true))
            .await
            .unwrap());
        assert_eq!(ledger.get(&flag).await.unwrap(), Some(json!(true)));
    }

    #[tokio::test]
    async fn test_concurrent_compare_and_set_has_one_winner() {
        let ledger = Arc::new(InMemoryLedger::new());
        let flag = ticket_path(7).child("validated");
        ledger.set(&flag, json!(false)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let ledger = Arc::clone(&ledger);
            let flag = flag.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .compare_and_set(&flag, Some(&json!(false)), json!(true))
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_offline_ledger_reports_unavailable() {
        let ledger = InMemoryLedger::new();
        ledger.set_offline(true);
        assert!(matches!(
            ledger.get(&ticket_path(1)).await,
            Err(LedgerError::Unavailable(_))
        ));
        ledger.set_offline(false);
        ledger.fail_writes(true);
        assert!(ledger.get(&ticket_path(1)).await.is_ok());
        assert!(ledger.set(&ticket_path(1), json!(1)).await.is_err());
    }
}
