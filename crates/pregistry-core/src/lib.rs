//! pRegistry Core Library
//!
//! Local-first patient registry. Every tab of a profile shares one embedded
//! SQLite store, and writes in any tab invalidate the views of all of them.
//!
//! # Architecture
//!
//! ```text
//!  View (listing / form / console)
//!        │                    ▲ re-fetch
//!        ▼                    │
//!  PatientRegistry ──── SubscriberRegistry ◄──── SyncChannel listener
//!        │      │                                      ▲
//!        │      └── on write: post {"type":"invalidate"} ──► other tabs
//!        ▼
//!  Worker thread (one per profile + namespace)
//!        │
//!        ▼
//!  SQLite store: <data_dir>/pRegistry.sqlite3
//! ```
//!
//! # Core Principle
//!
//! **Signals carry no data.** An invalidation only says "something changed";
//! every receiver re-queries the store.
//!
//! # Modules
//!
//! - [`db`]: SQLite layer, free-form statements and patient SQL
//! - [`models`]: Domain types (Patient, NewPatient)
//! - [`worker`]: Background thread owning the store
//! - [`sync`]: Cross-tab broadcast of invalidations
//! - [`subscribers`]: Per-tab change callbacks
//! - [`registry`]: The facade views talk to
//! - [`views`]: Registration, listing and query console state

pub mod config;
pub mod db;
pub mod models;
pub mod profile;
pub mod registry;
pub mod statement;
pub mod subscribers;
pub mod sync;
pub mod views;
pub mod worker;

// Re-export commonly used types
pub use config::RegistryConfig;
pub use db::{Database, Row, SqlValue};
pub use models::{NewPatient, Patient};
pub use profile::{Profile, ProfileBuilder};
pub use registry::{PatientRegistry, RegistryError, RegistryResult};
pub use statement::StatementKind;
pub use subscribers::Subscription;
pub use sync::SyncMessage;

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::Arc;

use views::{QueryConsole, RegistrationForm, SubmitError};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum RegistryFfiError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<RegistryError> for RegistryFfiError {
    fn from(e: RegistryError) -> Self {
        RegistryFfiError::DatabaseError(e.to_string())
    }
}

impl From<SubmitError> for RegistryFfiError {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::Invalid(invalid) => RegistryFfiError::InvalidInput(invalid.to_string()),
            SubmitError::Registry(e) => e.into(),
        }
    }
}

impl From<serde_json::Error> for RegistryFfiError {
    fn from(e: serde_json::Error) -> Self {
        RegistryFfiError::SerializationError(e.to_string())
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open a durable profile rooted at `data_dir`.
#[uniffi::export]
pub fn open_profile(data_dir: String) -> Arc<FfiProfile> {
    Arc::new(FfiProfile {
        profile: Profile::open(data_dir),
    })
}

/// Create an in-memory profile (for testing).
#[uniffi::export]
pub fn open_profile_in_memory() -> Arc<FfiProfile> {
    Arc::new(FfiProfile {
        profile: Profile::in_memory(),
    })
}

// =========================================================================
// Callback Interface
// =========================================================================

/// Implemented by the host UI to hear about data changes.
#[uniffi::export(callback_interface)]
pub trait ChangeListener: Send + Sync {
    fn on_data_changed(&self);
}

// =========================================================================
// Main API Objects
// =========================================================================

/// A profile shared by every tab the host opens on it.
#[derive(uniffi::Object)]
pub struct FfiProfile {
    profile: Arc<Profile>,
}

#[uniffi::export]
impl FfiProfile {
    /// Open a new tab. The store is attached on first use.
    pub fn open_tab(&self) -> Arc<RegistryHandle> {
        Arc::new(RegistryHandle {
            registry: Arc::new(self.profile.open_tab()),
        })
    }
}

/// One tab's registry.
#[derive(uniffi::Object)]
pub struct RegistryHandle {
    registry: Arc<PatientRegistry>,
}

#[uniffi::export]
impl RegistryHandle {
    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Validate a registration form and store the patient; returns its id.
    pub fn register_patient(&self, form: FfiRegistrationForm) -> Result<String, RegistryFfiError> {
        let today = chrono::Local::now().date_naive();
        let form: RegistrationForm = form.into();
        Ok(form.submit(&self.registry, today)?)
    }

    /// All patients, newest first.
    pub fn list_patients(&self) -> Result<Vec<FfiPatient>, RegistryFfiError> {
        let patients = self.registry.get_patients()?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: String) -> Result<Option<FfiPatient>, RegistryFfiError> {
        let patient = self.registry.get_patient_by_id(&id)?;
        Ok(patient.map(|p| p.into()))
    }

    // =========================================================================
    // Query Operations
    // =========================================================================

    /// Run a statement with a JSON array of scalar parameters; rows come back
    /// as a JSON array of objects.
    pub fn execute_query_json(
        &self,
        sql: String,
        params_json: String,
    ) -> Result<String, RegistryFfiError> {
        let params: Vec<SqlValue> = if params_json.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&params_json)?
        };
        let rows = self.registry.execute_query(&sql, &params)?;
        Ok(serde_json::to_string(&rows)?)
    }

    /// Run console text and export the result as CSV.
    pub fn export_query_csv(&self, sql: String) -> Result<String, RegistryFfiError> {
        let mut console = QueryConsole::new(None);
        console.set_sql(sql);
        match console.run(&self.registry) {
            Ok(report) => Ok(report.to_csv()),
            Err(message) => Err(RegistryFfiError::DatabaseError(message.to_string())),
        }
    }

    // =========================================================================
    // Change Notifications
    // =========================================================================

    /// Call `listener` after every write, from this tab or another.
    pub fn subscribe(&self, listener: Box<dyn ChangeListener>) -> Arc<FfiSubscription> {
        let listener: Arc<dyn ChangeListener> = Arc::from(listener);
        let subscription = self.registry.subscribe(move || listener.on_data_changed());
        Arc::new(FfiSubscription { subscription })
    }
}

/// Returned by [`RegistryHandle::subscribe`].
#[derive(uniffi::Object)]
pub struct FfiSubscription {
    subscription: Subscription,
}

#[uniffi::export]
impl FfiSubscription {
    /// Stop receiving notifications. Safe to call more than once.
    pub fn unsubscribe(&self) {
        self.subscription.unsubscribe();
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    /// `YYYY-MM-DD`
    pub dob: String,
    pub gender: String,
    pub blood_group: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub insurance: Option<String>,
    pub policy_number: Option<String>,
    pub medical_history: Option<String>,
    pub created_at: String,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            first_name: patient.first_name,
            last_name: patient.last_name,
            dob: patient.dob.format("%Y-%m-%d").to_string(),
            gender: patient.gender,
            blood_group: patient.blood_group,
            city: patient.city,
            state: patient.state,
            country: patient.country,
            address: patient.address,
            phone: patient.phone,
            email: patient.email,
            insurance: patient.insurance,
            policy_number: patient.policy_number,
            medical_history: patient.medical_history,
            created_at: patient.created_at,
        }
    }
}

/// FFI-safe registration form. Blank optional fields may be empty strings.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRegistrationForm {
    pub first_name: String,
    pub last_name: String,
    pub dob: String,
    pub gender: String,
    pub blood_group: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub phone: String,
    pub email: String,
    pub insurance: String,
    pub policy_number: String,
    pub medical_history: String,
}

impl From<FfiRegistrationForm> for RegistrationForm {
    fn from(form: FfiRegistrationForm) -> Self {
        RegistrationForm {
            first_name: form.first_name,
            last_name: form.last_name,
            dob: form.dob,
            gender: form.gender,
            blood_group: form.blood_group,
            address: form.address,
            city: form.city,
            state: form.state,
            country: form.country,
            phone: form.phone,
            email: form.email,
            insurance: form.insurance,
            policy_number: form.policy_number,
            medical_history: form.medical_history,
        }
    }
}
