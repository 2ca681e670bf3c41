//! Headless state behind the registry's screens.
//!
//! - [`registration`]: form validation and submit (`/register-patient`)
//! - [`listing`]: the patient table (`/` and `/patients`)
//! - [`console`]: the SQL console (`/patients/query?patientId=...`)

pub mod console;
pub mod listing;
pub mod registration;

pub use console::{ColumnInfo, QueryConsole, QueryReport, EXAMPLE_QUERIES};
pub use listing::{PatientListing, SortColumn, PAGE_SIZES};
pub use registration::{
    FieldError, RegistrationForm, SubmitError, ValidationError, BLOOD_GROUP_OPTIONS,
    GENDER_OPTIONS,
};
