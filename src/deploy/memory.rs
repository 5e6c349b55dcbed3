//! In-memory [`RemoteStore`].
//!
//! Backs `deploy --dry-run` rehearsals in tests and the integration suite.
//! Uses `Mutex` (not `RefCell`) so it is `Sync` and works with rayon.

use super::remote::{RemoteError, RemoteObject, RemoteStore};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// A recorded mutating request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Put { key: String, content_type: String },
    Delete { key: String },
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    writes: Mutex<Vec<Write>>,
    /// Remaining injected failures per key for `put`.
    put_failures: Mutex<HashMap<String, (usize, u16)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with objects, none of them counted as writes.
    pub fn with_objects<I, K, V>(objects: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        let store = Self::new();
        if let Ok(mut map) = store.objects.lock() {
            map.extend(objects.into_iter().map(|(k, v)| (k.into(), v.into())));
        }
        store
    }

    /// Make the next `times` puts of `key` fail with HTTP `status`.
    pub fn fail_puts_for(&self, key: &str, times: usize, status: u16) {
        if let Ok(mut failures) = self.put_failures.lock() {
            failures.insert(key.to_string(), (times, status));
        }
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().ok()?.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every put and delete performed so far, in order.
    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|w| w.len()).unwrap_or(0)
    }

    pub fn clear_writes(&self) {
        if let Ok(mut w) = self.writes.lock() {
            w.clear();
        }
    }

    fn poisoned(key: &str) -> RemoteError {
        RemoteError::Request {
            key: key.to_string(),
            message: "memory store lock poisoned".to_string(),
        }
    }

    fn record(&self, write: Write) {
        if let Ok(mut w) = self.writes.lock() {
            w.push(write);
        }
    }
}

impl RemoteStore for MemoryStore {
    fn list(&self) -> Result<Vec<RemoteObject>, RemoteError> {
        let objects = self.objects.lock().map_err(|_| Self::poisoned(""))?;
        Ok(objects
            .iter()
            .map(|(key, bytes)| RemoteObject {
                key: key.clone(),
                size: bytes.len() as u64,
            })
            .collect())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteError> {
        let objects = self.objects.lock().map_err(|_| Self::poisoned(key))?;
        Ok(objects.get(key).cloned())
    }

    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), RemoteError> {
        {
            let mut failures = self.put_failures.lock().map_err(|_| Self::poisoned(key))?;
            if let Some((remaining, status)) = failures.get_mut(key)
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(RemoteError::Status {
                    key: key.to_string(),
                    status: *status,
                });
            }
        }
        self.objects
            .lock()
            .map_err(|_| Self::poisoned(key))?
            .insert(key.to_string(), bytes.to_vec());
        self.record(Write::Put {
            key: key.to_string(),
            content_type: content_type.to_string(),
        });
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), RemoteError> {
        self.objects
            .lock()
            .map_err(|_| Self::poisoned(key))?
            .remove(key);
        self.record(Write::Delete { key: key.to_string() });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_objects_are_not_writes() {
        let store = MemoryStore::with_objects([("a.html", "a")]);
        assert_eq!(store.keys(), vec!["a.html"]);
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn put_get_delete() {
        let store = MemoryStore::new();
        store.put("a.html", b"a", "text/html").unwrap();
        assert_eq!(store.get("a.html").unwrap(), Some(b"a".to_vec()));
        store.delete("a.html").unwrap();
        assert_eq!(store.get("a.html").unwrap(), None);
        assert_eq!(
            store.writes(),
            vec![
                Write::Put {
                    key: "a.html".into(),
                    content_type: "text/html".into()
                },
                Write::Delete { key: "a.html".into() },
            ]
        );
    }

    #[test]
    fn injected_failures_run_out() {
        let store = MemoryStore::new();
        store.fail_puts_for("a.html", 2, 503);
        assert!(store.put("a.html", b"a", "text/html").is_err());
        assert!(store.put("a.html", b"a", "text/html").is_err());
        assert!(store.put("a.html", b"a", "text/html").is_ok());
    }

    #[test]
    fn list_reports_sizes() {
        let store = MemoryStore::with_objects([("a", "abc"), ("b", "")]);
        let listed = store.list().unwrap();
        assert_eq!(listed[0], RemoteObject { key: "a".into(), size: 3 });
        assert_eq!(listed[1].size, 0);
    }
}
