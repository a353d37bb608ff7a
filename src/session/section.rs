// Session sections
// Named sub-namespaces of a session with their own expiration policy

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::Session;

/// Stored contents of one section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionData {
    /// Section variables
    pub values: HashMap<String, Value>,

    /// Unix timestamp after which the whole section is dropped
    pub expires_at: Option<i64>,

    /// Per-variable expiry timestamps
    pub variable_expiry: HashMap<String, i64>,
}

impl SectionData {
    /// Drop expired variables; returns true when the whole section has expired
    pub fn purge_expired(&mut self, now: i64) -> bool {
        if matches!(self.expires_at, Some(at) if now > at) {
            return true;
        }

        let expired: Vec<String> = self
            .variable_expiry
            .iter()
            .filter(|(_, &at)| now > at)
            .map(|(name, _)| name.clone())
            .collect();

        for name in expired {
            self.values.remove(&name);
            self.variable_expiry.remove(&name);
        }

        false
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.expires_at.is_none() && self.variable_expiry.is_empty()
    }
}

/// Handle to a named section of the current session
#[derive(Clone)]
pub struct SessionSection {
    session: Session,
    name: String,
}

impl SessionSection {
    pub(super) fn new(session: Session, name: &str) -> Self {
        Self {
            session,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decode a variable; undecodable values read as absent
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_get(key) {
            Ok(value) => value,
            Err(e) => {
                debug!(section = %self.name, key = %key, error = %e, "Discarding undecodable session value");
                None
            }
        }
    }

    pub fn try_get<T: DeserializeOwned>(&self, key: &str) -> serde_json::Result<Option<T>> {
        let raw = self.session.read_section(&self.name, |section| {
            section.and_then(|s| s.values.get(key).cloned())
        });

        raw.map(serde_json::from_value).transpose()
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> serde_json::Result<()> {
        let value = serde_json::to_value(value)?;
        self.session.write_section(&self.name, |section| {
            section.values.insert(key.to_string(), value);
        });
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.session.read_section(&self.name, |section| {
            section.map_or(false, |s| s.values.contains_key(key))
        })
    }

    /// Remove one variable together with its expiry
    pub fn remove(&self, key: &str) {
        self.session.write_section(&self.name, |section| {
            section.values.remove(key);
            section.variable_expiry.remove(key);
        });
    }

    /// Cancel the whole section
    pub fn clear(&self) {
        self.session.write_section(&self.name, |section| {
            *section = SectionData::default();
        });
    }

    pub fn len(&self) -> usize {
        self.session
            .read_section(&self.name, |section| section.map_or(0, |s| s.values.len()))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        self.session.read_section(&self.name, |section| {
            section.map_or_else(Vec::new, |s| s.values.keys().cloned().collect())
        })
    }

    /// Expire the whole section after `ttl`; `None` keeps it for the session's lifetime
    pub fn set_expiration(&self, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| self.expiry_timestamp(ttl));
        self.session.write_section(&self.name, |section| {
            section.expires_at = expires_at;
        });
    }

    /// Expire a single variable after `ttl`; `None` clears its expiry
    pub fn set_variable_expiration(&self, key: &str, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| self.expiry_timestamp(ttl));
        self.session.write_section(&self.name, |section| match expires_at {
            Some(at) => {
                section.variable_expiry.insert(key.to_string(), at);
            }
            None => {
                section.variable_expiry.remove(key);
            }
        });
    }

    pub fn remove_expiration(&self) {
        self.set_expiration(None);
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.session
            .read_section(&self.name, |section| section.and_then(|s| s.expires_at))
    }

    fn expiry_timestamp(&self, ttl: Duration) -> i64 {
        let lifetime = self.session.store().lifetime();
        if ttl > lifetime + Duration::from_secs(3) {
            warn!(
                section = %self.name,
                ttl_secs = ttl.as_secs(),
                lifetime_secs = lifetime.as_secs(),
                "The expiration time is greater than the session expiration time"
            );
        }

        self.session.store().now() + ttl.as_secs() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Clock, SessionStore};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_purge_drops_expired_variables_only() {
        let mut data = SectionData::default();
        data.values.insert("a".into(), Value::from(1));
        data.values.insert("b".into(), Value::from(2));
        data.variable_expiry.insert("a".into(), 100);

        assert!(!data.purge_expired(101));
        assert!(!data.values.contains_key("a"));
        assert!(data.values.contains_key("b"));
        assert!(data.variable_expiry.is_empty());
    }

    #[test]
    fn test_purge_reports_expired_section() {
        let mut data = SectionData {
            expires_at: Some(50),
            ..Default::default()
        };

        assert!(!data.purge_expired(50));
        assert!(data.purge_expired(51));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_expiration_beyond_session_lifetime_warns() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let store = Arc::new(SessionStore::with_clock(Duration::from_secs(3600), Clock::manual(1_000)));
        let section = store.start(None).section("basket");

        tracing::subscriber::with_default(subscriber, || {
            section.set_expiration(Some(Duration::from_secs(3600)));
            section.set_expiration(Some(Duration::from_secs(7200)));
        });

        let output = String::from_utf8(logs.0.lock().clone()).unwrap();
        assert_eq!(
            output
                .matches("The expiration time is greater than the session expiration time")
                .count(),
            1
        );
        assert_eq!(section.expires_at(), Some(1_000 + 7200));
    }
}
