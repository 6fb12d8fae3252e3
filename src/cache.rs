//! Memoization of template fetches
//!
//! The resolver probes candidate keys one at a time, and several templates
//! in one render tree routinely expand to the same candidates. The cache
//! sits between the resolver and the [`TemplateLoader`] so each distinct
//! key hits the backing store at most once per engine, no matter how many
//! render passes or concurrent renders ask for it.
//!
//! Concurrent requests for one key collapse into a single flight: the
//! first caller becomes the owner and fetches, later callers park on a
//! [`Notify`] handle until the owner publishes the result. The fetch runs
//! on a detached task, so a caller cancelled mid-await cannot strand the
//! parked waiters; the result still lands in the cache.
//!
//! Fetch errors are never cached. The owner removes the pending entry and
//! wakes the waiters, and whichever caller retries first becomes the new
//! owner. A fetch task that dies without publishing, say through a loader
//! panic, degrades the same way: the caller that spawned it releases the
//! entry on its behalf.
//!
//! [`TemplateLoader`]: crate::loader::TemplateLoader
//! [`Notify`]: tokio::sync::Notify

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Notify;

use crate::error::LoadError;
use crate::key::TemplateKey;
use crate::loader::TemplateLoader;

/// Controls what the resolution cache remembers between fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Remember found templates and confirmed misses alike.
    ///
    /// The default. Candidate expansion probes mostly-absent keys (locale
    /// variants, index fallbacks), so forgetting misses would re-fetch the
    /// same absent candidates on every render.
    #[default]
    HitsAndMisses,

    /// Remember found templates only; misses go back to the backing store
    /// every time.
    ///
    /// Useful when templates appear at runtime and a stale negative entry
    /// would hide them.
    HitsOnly,

    /// No memoization; every probe goes to the backing store.
    Off,
}

/// State of one cached fetch.
#[derive(Debug, Clone)]
enum FetchState {
    /// Another task is currently fetching this key.
    ///
    /// Carries the notification handle waiters park on until the owning
    /// task publishes its result.
    Pending(Arc<Notify>),

    /// Fetch completed; `None` records a confirmed miss.
    Ready(Option<Arc<str>>),
}

/// Single-flight memoization of loader fetches, shared by every render of
/// one engine.
#[derive(Debug, Clone)]
pub(crate) struct ResolutionCache {
    policy: CachePolicy,
    entries: Arc<DashMap<TemplateKey, FetchState>>,
}

impl ResolutionCache {
    pub(crate) fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Returns the cached content for `key`, fetching it from `loader` on
    /// first access.
    ///
    /// `Ok(None)` is a confirmed miss. Under [`CachePolicy::HitsAndMisses`]
    /// the miss is remembered; under [`CachePolicy::HitsOnly`] the next
    /// call probes the backing store again.
    pub(crate) async fn get_or_load(
        &self,
        key: &TemplateKey,
        loader: &Arc<dyn TemplateLoader>,
    ) -> Result<Option<Arc<str>>, LoadError> {
        if self.policy == CachePolicy::Off {
            return Ok(loader.load(key).await?.map(Arc::from));
        }

        let notify = Arc::new(Notify::new());

        loop {
            match self.entries.entry(key.clone()) {
                dashmap::mapref::entry::Entry::Occupied(entry) => match entry.get() {
                    FetchState::Ready(content) => {
                        let content = content.clone();
                        drop(entry);
                        tracing::trace!("cache hit for {key}");
                        return Ok(content);
                    }
                    FetchState::Pending(existing) => {
                        let existing = existing.clone();
                        // Create the notified future BEFORE dropping the
                        // entry. Notify only wakes futures that are already
                        // waiting, so creating it after the drop could miss
                        // a notification sent in between.
                        let notified = existing.notified();
                        drop(entry);
                        tracing::trace!("waiting for in-flight fetch of {key}");
                        notified.await;
                        continue;
                    }
                },
                dashmap::mapref::entry::Entry::Vacant(entry) => {
                    entry.insert(FetchState::Pending(notify.clone()));
                    break;
                }
            }
        }

        // This call owns the fetch. It runs on a detached task so that
        // cancelling the caller cannot strand the waiters parked on the
        // notify handle; the task always publishes before it exits.
        let entries = Arc::clone(&self.entries);
        let loader = Arc::clone(loader);
        let owned_key = key.clone();
        let policy = self.policy;
        let task_notify = Arc::clone(&notify);

        let fetch = tokio::spawn(async move {
            match loader.load(&owned_key).await {
                Ok(content) => {
                    let content: Option<Arc<str>> = content.map(Arc::from);
                    if policy == CachePolicy::HitsOnly && content.is_none() {
                        entries.remove(&owned_key);
                    } else {
                        entries.insert(owned_key, FetchState::Ready(content.clone()));
                    }
                    task_notify.notify_waiters();
                    Ok(content)
                }
                Err(err) => {
                    tracing::warn!("fetch of {owned_key} failed; releasing cache entry");
                    entries.remove(&owned_key);
                    task_notify.notify_waiters();
                    Err(err)
                }
            }
        });

        match fetch.await {
            Ok(result) => result,
            Err(err) => {
                // The task died without publishing, most likely a loader
                // panic. The entry is still pending; release it and wake
                // the waiters so one of them retries as the new owner.
                self.entries
                    .remove_if(key, |_, state| matches!(state, FetchState::Pending(_)));
                notify.notify_waiters();
                Err(LoadError::Backend {
                    reason: format!("fetch task for {key} did not complete: {err}"),
                })
            }
        }
    }
}
