//! The shared context every tab of one profile runs in.
//!
//! A [`Profile`] owns what tabs of a browser profile share: the storage
//! directory, the broadcast hub and the running database workers. It is built
//! once and handed to each [`PatientRegistry`](crate::PatientRegistry).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::config::RegistryConfig;
use crate::registry::PatientRegistry;
use crate::sync::BroadcastHub;
use crate::worker::{StoreLocation, Worker, WorkerResult};

/// Builder for [`Profile`].
#[derive(Debug, Clone)]
pub struct ProfileBuilder {
    data_dir: Option<PathBuf>,
    config: RegistryConfig,
    broadcast: bool,
}

impl ProfileBuilder {
    /// Persist stores under `dir`. Without this the profile is in-memory.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    /// Whether cross-tab broadcast is available. When disabled, writes only
    /// notify the writing tab's own subscribers.
    pub fn broadcast(mut self, enabled: bool) -> Self {
        self.broadcast = enabled;
        self
    }

    pub fn build(self) -> Arc<Profile> {
        Arc::new(Profile {
            data_dir: self.data_dir,
            config: self.config,
            hub: self.broadcast.then(BroadcastHub::new),
            workers: Mutex::new(HashMap::new()),
        })
    }
}

/// Shared state for all tabs of one profile.
pub struct Profile {
    data_dir: Option<PathBuf>,
    config: RegistryConfig,
    hub: Option<Arc<BroadcastHub>>,
    workers: Mutex<HashMap<String, Weak<Worker>>>,
}

impl Profile {
    pub fn builder() -> ProfileBuilder {
        ProfileBuilder {
            data_dir: None,
            config: RegistryConfig::default(),
            broadcast: true,
        }
    }

    /// Durable profile rooted at `dir`, with default names.
    pub fn open(dir: impl Into<PathBuf>) -> Arc<Self> {
        Self::builder().data_dir(dir).build()
    }

    /// In-memory profile; stores vanish with their last tab.
    pub fn in_memory() -> Arc<Self> {
        Self::builder().build()
    }

    /// Open a new tab on this profile. Nothing is started until first use.
    pub fn open_tab(self: &Arc<Self>) -> PatientRegistry {
        PatientRegistry::new(Arc::clone(self))
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Where the store for the configured namespace lives.
    pub fn store_location(&self) -> StoreLocation {
        match &self.data_dir {
            Some(dir) => StoreLocation::File(dir.join(self.config.store_file_name())),
            None => StoreLocation::Memory,
        }
    }

    pub fn broadcast_hub(&self) -> Option<&Arc<BroadcastHub>> {
        self.hub.as_ref()
    }

    /// The worker for the configured namespace, starting it if no tab holds
    /// one. At most one worker per namespace runs at a time.
    pub fn attach_worker(&self) -> WorkerResult<Arc<Worker>> {
        let namespace = &self.config.namespace;
        // Held across spawn so two tabs racing here cannot start two engines.
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(worker) = workers.get(namespace).and_then(Weak::upgrade) {
            tracing::debug!(namespace = %namespace, "attaching to running worker");
            return Ok(worker);
        }

        let worker = Arc::new(Worker::spawn(namespace, self.store_location())?);
        workers.insert(namespace.clone(), Arc::downgrade(&worker));
        Ok(worker)
    }
}
