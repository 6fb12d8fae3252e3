//! Shared fixtures for the integration tests.
//!
//! Provides one-time tracing setup and a recording loader that wraps
//! [`StaticLoader`] so tests can assert how many fetches actually reach
//! the backing store.

// Not every test file uses every helper.
#![allow(dead_code)]

use std::sync::{Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use reweave::loader::{StaticLoader, TemplateLoader};
use reweave::{LoadError, TemplateKey};

static INIT_LOGGING: Once = Once::new();

/// Initializes tracing for tests, honoring `RUST_LOG`.
///
/// Without `RUST_LOG` set this does nothing, keeping test output quiet:
///
/// ```bash
/// RUST_LOG=reweave=trace cargo test
/// ```
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        if std::env::var("RUST_LOG").is_err() {
            return;
        }
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// An in-memory loader that records every probe.
///
/// An optional artificial delay keeps loads in flight long enough for
/// concurrency tests to overlap them.
pub struct RecordingLoader {
    inner: StaticLoader,
    probes: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl RecordingLoader {
    pub fn new(inner: StaticLoader) -> Self {
        Self {
            inner,
            probes: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Makes every load sleep first, so concurrent fetches overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Total number of loads that reached the backing store.
    pub fn load_count(&self) -> usize {
        self.probes.lock().unwrap().len()
    }

    /// Number of loads for one display-formatted key, e.g. `"'page'"` or
    /// `"'mails:cart'(en)"`.
    pub fn loads_of(&self, key: &str) -> usize {
        self.probes.lock().unwrap().iter().filter(|probe| *probe == key).count()
    }
}

#[async_trait]
impl TemplateLoader for RecordingLoader {
    async fn load(&self, key: &TemplateKey) -> Result<Option<String>, LoadError> {
        self.probes.lock().unwrap().push(key.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.load(key).await
    }
}
