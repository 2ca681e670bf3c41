//! Patient models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A stored patient record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// UUID assigned by the registry before insert; never reassigned
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    /// Date of birth
    pub dob: NaiveDate,
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
    /// Insert timestamp assigned by the store (`YYYY-MM-DD HH:MM:SS.SSS`, UTC)
    pub created_at: String,
}

impl Patient {
    /// "First Last", as shown in the listing.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Fields a caller supplied at registration, without store-assigned ones.
    pub fn to_new_patient(&self) -> NewPatient {
        NewPatient {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            dob: self.dob,
            gender: self.gender.clone(),
            blood_group: self.blood_group.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            country: self.country.clone(),
            address: self.address.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            insurance: self.insurance.clone(),
            policy_number: self.policy_number.clone(),
            medical_history: self.medical_history.clone(),
        }
    }
}

/// Fields for registering a patient. The registry assigns `id` and the store
/// assigns `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub dob: NaiveDate,
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
}

impl NewPatient {
    /// Optional fields with blank values collapse to `None`, as they are stored.
    pub fn normalized(mut self) -> Self {
        self.insurance = non_blank(self.insurance);
        self.policy_number = non_blank(self.policy_number);
        self.medical_history = non_blank(self.medical_history);
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
