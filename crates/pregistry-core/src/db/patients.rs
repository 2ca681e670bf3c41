//! Patient statements and row decoding.
//!
//! Typed patient operations go through the same free-form statement path as the
//! query console, so this module only owns the SQL text, the parameter layout and
//! the mapping from a result [`Row`] back to a [`Patient`].

use chrono::NaiveDate;
use thiserror::Error;

use super::{Row, SqlValue};
use crate::models::{NewPatient, Patient};

/// Insert with every caller-supplied column; `created_at` is left to the store.
pub const INSERT_PATIENT: &str = r#"
    INSERT INTO patients (
        id, first_name, last_name, dob, gender, blood_group, city, state, country,
        address, phone, email, insurance, policy_number, medical_history
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
"#;

/// Newest first. `rowid` breaks ties between inserts in the same millisecond.
pub const SELECT_PATIENTS: &str = r#"
    SELECT id, first_name, last_name, dob, gender, blood_group, city, state, country,
           phone, email, address, insurance, policy_number, medical_history, created_at
    FROM patients
    ORDER BY created_at DESC, rowid DESC
"#;

pub const SELECT_PATIENT_BY_ID: &str = "SELECT * FROM patients WHERE id = $1 LIMIT 1";

/// A result row that does not have the shape of a patient record.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Column `{column}`: {reason}")]
pub struct RowDecodeError {
    pub column: &'static str,
    pub reason: String,
}

/// Parameters for [`INSERT_PATIENT`], in placeholder order.
pub fn insert_params(id: &str, patient: &NewPatient) -> Vec<SqlValue> {
    vec![
        id.into(),
        patient.first_name.as_str().into(),
        patient.last_name.as_str().into(),
        patient.dob.format("%Y-%m-%d").to_string().into(),
        patient.gender.as_str().into(),
        patient.blood_group.as_str().into(),
        patient.city.as_str().into(),
        patient.state.as_str().into(),
        patient.country.as_str().into(),
        patient.address.as_str().into(),
        patient.phone.as_str().into(),
        patient.email.as_str().into(),
        patient.insurance.clone().into(),
        patient.policy_number.clone().into(),
        patient.medical_history.clone().into(),
    ]
}

impl TryFrom<&Row> for Patient {
    type Error = RowDecodeError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Patient {
            id: required(row, "id")?,
            first_name: required(row, "first_name")?,
            last_name: required(row, "last_name")?,
            dob: date(row, "dob")?,
            gender: required(row, "gender")?,
            blood_group: required(row, "blood_group")?,
            city: required(row, "city")?,
            state: required(row, "state")?,
            country: required(row, "country")?,
            address: required(row, "address")?,
            phone: required(row, "phone")?,
            email: required(row, "email")?,
            insurance: optional(row, "insurance")?,
            policy_number: optional(row, "policy_number")?,
            medical_history: optional(row, "medical_history")?,
            created_at: required(row, "created_at")?,
        })
    }
}

fn optional(row: &Row, column: &'static str) -> Result<Option<String>, RowDecodeError> {
    match row.get(column) {
        None => Err(RowDecodeError {
            column,
            reason: "missing from result".into(),
        }),
        Some(SqlValue::Null) => Ok(None),
        Some(SqlValue::Text(s)) => Ok(Some(s.clone())),
        Some(other) => Err(RowDecodeError {
            column,
            reason: format!("expected text, found {}", other.type_name()),
        }),
    }
}

fn required(row: &Row, column: &'static str) -> Result<String, RowDecodeError> {
    optional(row, column)?.ok_or_else(|| RowDecodeError {
        column,
        reason: "unexpected NULL".into(),
    })
}

fn date(row: &Row, column: &'static str) -> Result<NaiveDate, RowDecodeError> {
    let text = required(row, column)?;
    NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|e| RowDecodeError {
        column,
        reason: format!("invalid date {:?}: {}", text, e),
    })
}
