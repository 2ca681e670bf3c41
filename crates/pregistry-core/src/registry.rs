//! The database client facade a tab talks to.

use std::sync::{Arc, OnceLock};

use thiserror::Error;

use crate::db::{
    insert_params, Row, RowDecodeError, SqlValue, INSERT_PATIENT, SELECT_PATIENTS,
    SELECT_PATIENT_BY_ID,
};
use crate::models::{NewPatient, Patient};
use crate::profile::Profile;
use crate::statement::StatementKind;
use crate::subscribers::{SubscriberRegistry, Subscription};
use crate::sync::SyncChannel;
use crate::worker::{Worker, WorkerError};

/// Registry errors.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Database not initialized: {0}")]
    Init(String),

    #[error(transparent)]
    Query(#[from] WorkerError),

    #[error("Malformed patient row: {0}")]
    Decode(#[from] RowDecodeError),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

struct Ready {
    worker: Arc<Worker>,
    channel: Option<SyncChannel>,
}

/// One tab's view of the patient store.
///
/// Setup is deferred to the first operation and happens once; a failed setup
/// is remembered and every later operation reports it.
pub struct PatientRegistry {
    profile: Arc<Profile>,
    subscribers: Arc<SubscriberRegistry>,
    ready: OnceLock<Result<Ready, String>>,
}

impl PatientRegistry {
    pub fn new(profile: Arc<Profile>) -> Self {
        Self {
            profile,
            subscribers: SubscriberRegistry::new(),
            ready: OnceLock::new(),
        }
    }

    pub fn profile(&self) -> &Arc<Profile> {
        &self.profile
    }

    /// Attach to the worker and join the sync channel, once.
    pub fn ensure_ready(&self) -> RegistryResult<()> {
        self.ready().map(|_| ())
    }

    fn ready(&self) -> RegistryResult<&Ready> {
        self.ready
            .get_or_init(|| self.initialize())
            .as_ref()
            .map_err(|e| RegistryError::Init(e.clone()))
    }

    fn initialize(&self) -> Result<Ready, String> {
        let worker = self.profile.attach_worker().map_err(|e| {
            tracing::warn!(error = %e, "database initialization failed");
            e.to_string()
        })?;

        let channel = match self.profile.broadcast_hub() {
            Some(hub) => {
                let name = &self.profile.config().channel_name;
                match SyncChannel::open(hub, name, Arc::clone(&self.subscribers)) {
                    Ok(channel) => Some(channel),
                    Err(e) => {
                        tracing::warn!(error = %e, "cross-tab sync unavailable");
                        None
                    }
                }
            }
            None => {
                tracing::info!("broadcast unavailable; changes notify this tab only");
                None
            }
        };

        Ok(Ready { worker, channel })
    }

    /// Run any statement. Writes (by leading verb) invalidate: first the other
    /// tabs are signalled, then this tab's subscribers run, then rows return.
    pub fn execute_query(&self, sql: &str, params: &[SqlValue]) -> RegistryResult<Vec<Row>> {
        let ready = self.ready()?;
        let rows = ready.worker.query(sql, params)?;

        if StatementKind::classify(sql).is_write() {
            let remote = ready
                .channel
                .as_ref()
                .map_or(0, SyncChannel::post_invalidate);
            let local = self.subscribers.notify();
            tracing::debug!(remote, local, "write invalidated subscribers");
        }

        Ok(rows)
    }

    /// Insert a patient under a freshly generated id and return the id.
    pub fn add_patient(&self, patient: NewPatient) -> RegistryResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let patient = patient.normalized();
        self.execute_query(INSERT_PATIENT, &insert_params(&id, &patient))?;
        tracing::info!(id = %id, "patient registered");
        Ok(id)
    }

    /// All patients, newest first.
    pub fn get_patients(&self) -> RegistryResult<Vec<Patient>> {
        self.execute_query(SELECT_PATIENTS, &[])?
            .iter()
            .map(|row| Patient::try_from(row).map_err(Into::into))
            .collect()
    }

    pub fn get_patient_by_id(&self, id: &str) -> RegistryResult<Option<Patient>> {
        self.execute_query(SELECT_PATIENT_BY_ID, &[SqlValue::from(id)])?
            .first()
            .map(Patient::try_from)
            .transpose()
            .map_err(Into::into)
    }

    /// Register interest in data changes from this tab or any other.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
