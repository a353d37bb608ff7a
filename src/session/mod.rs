// Session Store Module
// Cookie-identified server-side sessions split into expiring sections

pub mod section;

pub use section::{SectionData, SessionSection};

use dashmap::DashMap;
use parking_lot::Mutex;
use rand::{distributions::Alphanumeric, Rng};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Length of generated session ids
const SESSION_ID_LENGTH: usize = 32;

/// Accept ids like `[0-9a-zA-Z,-]{22,256}`
pub fn is_valid_session_id(id: &str) -> bool {
    (22..=256).contains(&id.len())
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == ',' || c == '-')
}

fn generate_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// Time source for expirations
#[derive(Clone)]
pub enum Clock {
    System,
    /// Manually advanced clock for tests and simulations
    Manual(Arc<AtomicI64>),
}

impl Clock {
    pub fn manual(start: i64) -> Self {
        Clock::Manual(Arc::new(AtomicI64::new(start)))
    }

    pub fn now(&self) -> i64 {
        match self {
            Clock::System => chrono::Utc::now().timestamp(),
            Clock::Manual(t) => t.load(Ordering::SeqCst),
        }
    }

    /// Move a manual clock forward; no-op for the system clock
    pub fn advance(&self, by: Duration) {
        if let Clock::Manual(t) = self {
            t.fetch_add(by.as_secs() as i64, Ordering::SeqCst);
        }
    }
}

/// Data held for a single visitor
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    pub created_at: i64,
    pub last_access: i64,
    pub sections: HashMap<String, SectionData>,
}

impl SessionData {
    fn new(now: i64) -> Self {
        Self {
            created_at: now,
            last_access: now,
            sections: HashMap::new(),
        }
    }

    fn purge_expired(&mut self, now: i64) {
        self.sections
            .retain(|_, section| !section.purge_expired(now) && !section.is_empty());
    }
}

/// Concurrent session storage keyed by session id
pub struct SessionStore {
    sessions: DashMap<String, SessionData>,
    lifetime: Duration,
    clock: Clock,
}

impl SessionStore {
    pub fn new(lifetime: Duration) -> Self {
        Self::with_clock(lifetime, Clock::System)
    }

    pub fn with_clock(lifetime: Duration, clock: Clock) -> Self {
        info!(lifetime_secs = lifetime.as_secs(), "Session store initialized");

        Self {
            sessions: DashMap::new(),
            lifetime,
            clock,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Resolve the session named by a cookie, or open a fresh one
    ///
    /// Unknown, malformed or idle ids are never adopted; a new id is issued.
    pub fn start(self: &Arc<Self>, cookie_id: Option<&str>) -> Session {
        let now = self.now();

        if let Some(id) = cookie_id.filter(|id| is_valid_session_id(id)) {
            if let Some(mut data) = self.sessions.get_mut(id) {
                if !self.is_idle(&data, now) {
                    data.purge_expired(now);
                    data.last_access = now;
                    drop(data);

                    return Session::new(self.clone(), id.to_string());
                }
            }

            if self.sessions.remove(id).is_some() {
                debug!("Idle session discarded");
            }
        }

        let id = self.create(now);
        Session::new(self.clone(), id)
    }

    fn create(&self, now: i64) -> String {
        loop {
            let id = generate_session_id();
            if let dashmap::mapref::entry::Entry::Vacant(entry) = self.sessions.entry(id.clone()) {
                entry.insert(SessionData::new(now));
                debug!("New session created");
                return id;
            }
        }
    }

    fn is_idle(&self, data: &SessionData, now: i64) -> bool {
        now - data.last_access > self.lifetime.as_secs() as i64
    }

    /// Move session data under a new id; returns the new id
    fn rename(&self, old_id: &str) -> String {
        let now = self.now();
        let data = self
            .sessions
            .remove(old_id)
            .map(|(_, data)| data)
            .unwrap_or_else(|| SessionData::new(now));

        loop {
            let id = generate_session_id();
            if let dashmap::mapref::entry::Entry::Vacant(entry) = self.sessions.entry(id.clone()) {
                entry.insert(data);
                return id;
            }
        }
    }

    /// Drop idle sessions and expired sections; returns how many sessions were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.now();
        let before = self.sessions.len();

        self.sessions.retain(|_, data| {
            if self.is_idle(data, now) {
                return false;
            }
            data.purge_expired(now);
            true
        });

        before.saturating_sub(self.sessions.len())
    }

    /// Run `purge_expired` periodically until shutdown is signalled
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        let store = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = store.purge_expired();
                        if removed > 0 {
                            info!(removed = removed, active = store.len(), "Expired sessions purged");
                        }
                    }
                    _ = shutdown.recv() => {
                        debug!("Session sweeper stopped");
                        break;
                    }
                }
            }
        })
    }
}

/// Request-scoped handle to the visitor's session
///
/// Clones share the current id, so a regeneration performed by a handler is
/// visible to the middleware that writes the cookie.
#[derive(Clone)]
pub struct Session {
    store: Arc<SessionStore>,
    id: Arc<Mutex<String>>,
}

impl Session {
    fn new(store: Arc<SessionStore>, id: String) -> Self {
        Self {
            store,
            id: Arc::new(Mutex::new(id)),
        }
    }

    pub fn id(&self) -> String {
        self.id.lock().clone()
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn section(&self, name: &str) -> SessionSection {
        SessionSection::new(self.clone(), name)
    }

    /// Issue a new id for the same data (session fixation defence)
    pub fn regenerate_id(&self) {
        let mut id = self.id.lock();
        let new_id = self.store.rename(&id);
        *id = new_id;
        debug!("Session id regenerated");
    }

    /// Drop all data and continue with an empty session under a new id
    pub fn destroy(&self) {
        let mut id = self.id.lock();
        self.store.sessions.remove(id.as_str());
        *id = self.store.create(self.store.now());
    }

    pub(crate) fn read_section<R>(&self, name: &str, f: impl FnOnce(Option<&SectionData>) -> R) -> R {
        let id = self.id();
        match self.store.sessions.get(&id) {
            Some(data) => f(data.sections.get(name)),
            None => f(None),
        }
    }

    pub(crate) fn write_section<R>(&self, name: &str, f: impl FnOnce(&mut SectionData) -> R) -> R {
        let id = self.id();
        let now = self.store.now();
        let mut data = self
            .store
            .sessions
            .entry(id)
            .or_insert_with(|| SessionData::new(now));

        f(data.sections.entry(name.to_string()).or_default())
    }
}
