use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::models::{CustomerIdentity, PaymentSuccessMarker};

/// Names one logical entry and the type stored under it.
pub struct TypedKey<T> {
    pub name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }
}

/// Set after a successful search, cleared on logout. Scoped per client.
pub const CUSTOMER_IDENTITY: TypedKey<CustomerIdentity> = TypedKey::new("customer_identity");

/// Set after a successful gateway return, keyed by appointment id. Scoped
/// per client, so logout drops it with the identity.
pub const PAYMENT_SUCCESS: TypedKey<BTreeMap<String, PaymentSuccessMarker>> =
    TypedKey::new("payment_success");

/// Small persisted key-value state with an explicit lifecycle.
pub trait SessionStore: Send + Sync {
    fn get_raw(&self, scope: &str, key: &str) -> AppResult<Option<String>>;
    fn set_raw(&self, scope: &str, key: &str, value: &str) -> AppResult<()>;
    fn clear_raw(&self, scope: &str, key: &str) -> AppResult<bool>;
    fn clear_scope(&self, scope: &str) -> AppResult<()>;
}

impl dyn SessionStore {
    /// An entry that no longer deserializes reads as absent.
    pub fn get<T: DeserializeOwned>(&self, scope: &str, key: &TypedKey<T>) -> AppResult<Option<T>> {
        let Some(raw) = self.get_raw(scope, key.name)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(scope, key = key.name, error = %e, "discarding unreadable session entry");
                Ok(None)
            }
        }
    }

    pub fn set<T: Serialize>(&self, scope: &str, key: &TypedKey<T>, value: &T) -> AppResult<()> {
        let raw = serde_json::to_string(value)
            .map_err(|e| AppError::Config(format!("cannot serialize {}: {e}", key.name)))?;
        self.set_raw(scope, key.name, &raw)
    }

    pub fn clear<T>(&self, scope: &str, key: &TypedKey<T>) -> AppResult<bool> {
        self.clear_raw(scope, key.name)
    }
}

pub struct SqliteSessionStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteSessionStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }
}

impl SessionStore for SqliteSessionStore {
    fn get_raw(&self, scope: &str, key: &str) -> AppResult<Option<String>> {
        let conn = self.db.lock().unwrap();
        Ok(queries::get_entry(&conn, scope, key)?)
    }

    fn set_raw(&self, scope: &str, key: &str, value: &str) -> AppResult<()> {
        let conn = self.db.lock().unwrap();
        Ok(queries::set_entry(&conn, scope, key, value)?)
    }

    fn clear_raw(&self, scope: &str, key: &str) -> AppResult<bool> {
        let conn = self.db.lock().unwrap();
        Ok(queries::clear_entry(&conn, scope, key)?)
    }

    fn clear_scope(&self, scope: &str) -> AppResult<()> {
        let conn = self.db.lock().unwrap();
        let removed = queries::clear_scope(&conn, scope)?;
        tracing::debug!(scope, removed, "cleared session scope");
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl SessionStore for MemorySessionStore {
    fn get_raw(&self, scope: &str, key: &str) -> AppResult<Option<String>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.get(&(scope.to_string(), key.to_string())).cloned())
    }

    fn set_raw(&self, scope: &str, key: &str, value: &str) -> AppResult<()> {
        self.entries
            .lock()
            .unwrap()
            .insert((scope.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    fn clear_raw(&self, scope: &str, key: &str) -> AppResult<bool> {
        let mut entries = self.entries.lock().unwrap();
        Ok(entries.remove(&(scope.to_string(), key.to_string())).is_some())
    }

    fn clear_scope(&self, scope: &str) -> AppResult<()> {
        self.entries.lock().unwrap().retain(|(s, _), _| s != scope);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::db::init_memory_db;
    use crate::models::SearchKind;

    fn stores() -> Vec<Box<dyn SessionStore>> {
        let conn = init_memory_db().unwrap();
        vec![
            Box::new(MemorySessionStore::default()),
            Box::new(SqliteSessionStore::new(Arc::new(Mutex::new(conn)))),
        ]
    }

    #[test]
    fn test_typed_get_set_clear() {
        for store in stores() {
            let identity = CustomerIdentity {
                kind: SearchKind::Phone,
                value: "0987654321".to_string(),
                saved_at: Utc::now(),
            };
            assert!(store.get("client-1", &CUSTOMER_IDENTITY).unwrap().is_none());

            store.set("client-1", &CUSTOMER_IDENTITY, &identity).unwrap();
            let loaded = store.get("client-1", &CUSTOMER_IDENTITY).unwrap().unwrap();
            assert_eq!(loaded.value, "0987654321");
            assert!(store.get("client-2", &CUSTOMER_IDENTITY).unwrap().is_none());

            assert!(store.clear("client-1", &CUSTOMER_IDENTITY).unwrap());
            assert!(store.get("client-1", &CUSTOMER_IDENTITY).unwrap().is_none());
        }
    }

    #[test]
    fn test_unreadable_entry_reads_as_absent() {
        for store in stores() {
            store.set_raw("client-1", PAYMENT_SUCCESS.name, "{not json").unwrap();
            assert!(store.get("client-1", &PAYMENT_SUCCESS).unwrap().is_none());
        }
    }

    #[test]
    fn test_clear_scope_is_logout() {
        for store in stores() {
            store.set_raw("client-1", "a", "1").unwrap();
            store.set_raw("client-1", "b", "2").unwrap();
            store.set_raw("client-2", "a", "3").unwrap();

            store.clear_scope("client-1").unwrap();
            assert!(store.get_raw("client-1", "a").unwrap().is_none());
            assert_eq!(store.get_raw("client-2", "a").unwrap().as_deref(), Some("3"));
        }
    }
}
