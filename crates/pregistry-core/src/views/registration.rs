//! Patient registration form.
//!
//! Validation here is a fast-fail convenience in front of the store; the
//! store's NOT NULL constraints hold independently of it.

use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::NewPatient;
use crate::registry::{PatientRegistry, RegistryError};

/// Choices offered by the gender select.
pub const GENDER_OPTIONS: &[&str] = &["Male", "Female", "Other"];

/// Choices offered by the blood group select.
pub const BLOOD_GROUP_OPTIONS: &[&str] = &["A+", "A-", "B+", "B-", "O+", "O-", "AB+", "AB-"];

/// Raw form values, as typed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationForm {
    pub first_name: String,
    pub last_name: String,
    /// `YYYY-MM-DD`
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

/// One failing field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Form field name (camelCase)
    pub field: &'static str,
    pub message: String,
}

/// Every field that failed validation, in form order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

impl ValidationError {
    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.field == field)
            .map(|f| f.message.as_str())
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "Invalid registration ({})", parts.join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// Why a submission did not register a patient.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("Failed to register patient: {0}")]
    Registry(#[from] RegistryError),
}

#[derive(Default)]
struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    fn fail(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    fn required(&mut self, field: &'static str, value: &str, max: Option<usize>) -> String {
        let value = value.trim();
        if value.is_empty() {
            self.fail(field, "Required");
        } else if let Some(max) = max {
            self.max_len(field, value, max);
        }
        value.to_string()
    }

    fn optional(&mut self, field: &'static str, value: &str, max: usize) -> Option<String> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        self.max_len(field, value, max);
        Some(value.to_string())
    }

    fn max_len(&mut self, field: &'static str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.fail(field, format!("Must be at most {} characters", max));
        }
    }
}

impl RegistrationForm {
    /// Check the form against its rules. `today` bounds the date of birth.
    pub fn validate(&self, today: NaiveDate) -> Result<NewPatient, ValidationError> {
        let mut check = Checker::default();

        let first_name = check.required("firstName", &self.first_name, Some(50));
        let last_name = check.required("lastName", &self.last_name, Some(50));

        let dob = match self.dob.trim() {
            "" => {
                check.fail("dob", "Required");
                None
            }
            raw => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                Ok(date) if date > today => {
                    check.fail("dob", "Date of birth cannot be in the future");
                    None
                }
                Ok(date) => Some(date),
                Err(_) => {
                    check.fail("dob", "Invalid date");
                    None
                }
            },
        };

        let gender = check.required("gender", &self.gender, None);
        let blood_group = check.required("bloodGroup", &self.blood_group, None);
        let address = check.required("address", &self.address, Some(200));
        let city = check.required("city", &self.city, Some(50));
        let state = check.required("state", &self.state, Some(50));
        let country = check.required("country", &self.country, Some(50));
        let phone = check.required("phone", &self.phone, Some(20));

        let email = check.required("email", &self.email, None);
        if !email.is_empty() && !is_email_shaped(&email) {
            check.fail("email", "Invalid email");
        }

        let insurance = check.optional("insurance", &self.insurance, 50);
        let policy_number = check.optional("policyNumber", &self.policy_number, 50);
        let medical_history = check.optional("medicalHistory", &self.medical_history, 500);

        match dob {
            Some(dob) if check.errors.is_empty() => Ok(NewPatient {
                first_name,
                last_name,
                dob,
                gender,
                blood_group,
                city,
                state,
                country,
                address,
                phone,
                email,
                insurance,
                policy_number,
                medical_history,
            }),
            _ => Err(ValidationError {
                fields: check.errors,
            }),
        }
    }

    /// Validate and register. Invalid forms never reach the store.
    pub fn submit(
        &self,
        registry: &PatientRegistry,
        today: NaiveDate,
    ) -> Result<String, SubmitError> {
        let patient = self.validate(today)?;
        Ok(registry.add_patient(patient)?)
    }
}

/// HTML-form style address (dot-atom local part, hostname labels) that also
/// requires an alphabetic top-level label of two or more letters.
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*\.[a-zA-Z]{2,}$",
    )
    .expect("email pattern is valid")
});

fn is_email_shaped(value: &str) -> bool {
    EMAIL.is_match(value)
}
