//! Registry of live creation sessions.
//!
//! Sessions are opened lazily on first entry and cached by id. Lookups
//! clone the `Arc` out of the map; no `DashMap` guard is held across an
//! await. A background sweep evicts sessions idle past the configured
//! timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use avazon_types::error::CreationError;

use crate::repository::creation::CreationRepository;

use super::handle::CreationSession;

pub struct SessionRegistry<R: CreationRepository> {
    sessions: DashMap<Uuid, Arc<CreationSession<R>>>,
    idle_timeout: Option<Duration>,
}

impl<R: CreationRepository + 'static> SessionRegistry<R> {
    /// `idle_timeout` of zero disables idle eviction.
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout: (!idle_timeout.is_zero()).then_some(idle_timeout),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<CreationSession<R>>> {
        self.sessions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .filter(|session| !session.is_closed())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// The cached session for `id`, or the one `open` builds.
    ///
    /// When two callers race to open the same id, the first insert wins and
    /// the losing build is shut down.
    pub async fn get_or_open<F>(&self, id: Uuid, open: F) -> Result<Arc<CreationSession<R>>, CreationError>
    where
        F: Future<Output = Result<Arc<CreationSession<R>>, CreationError>>,
    {
        if let Some(session) = self.get(&id) {
            return Ok(session);
        }

        let built = open.await?;
        match self.sessions.entry(id) {
            Entry::Occupied(entry) if !entry.get().is_closed() => {
                built.shutdown();
                Ok(Arc::clone(entry.get()))
            }
            Entry::Occupied(mut entry) => {
                entry.insert(Arc::clone(&built));
                Ok(built)
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&built));
                Ok(built)
            }
        }
    }

    /// Remove `id` and shut it down. Returns the removed session.
    pub fn evict(&self, id: &Uuid) -> Option<Arc<CreationSession<R>>> {
        let (_, session) = self.sessions.remove(id)?;
        session.shutdown();
        Some(session)
    }

    /// Evict closed sessions and sessions idle past the timeout.
    pub fn evict_idle(&self) -> usize {
        let expired: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|entry| {
                let session = entry.value();
                session.is_closed()
                    || self
                        .idle_timeout
                        .is_some_and(|timeout| session.idle_for() > timeout)
            })
            .map(|entry| *entry.key())
            .collect();

        let count = expired.iter().filter(|id| self.evict(id).is_some()).count();
        if count > 0 {
            info!(evicted = count, remaining = self.sessions.len(), "evicted idle creation sessions");
        }
        count
    }

    /// Run `evict_idle` every `interval` until `cancel` fires.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        registry.evict_idle();
                    }
                }
            }
            debug!("session sweeper stopped");
        })
    }

    /// Shut down every session.
    pub fn shutdown_all(&self) {
        let ids: Vec<Uuid> = self.sessions.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            self.evict(&id);
        }
    }
}
