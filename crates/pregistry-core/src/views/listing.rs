//! Patient listing with re-fetch on change.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::models::Patient;
use crate::registry::PatientRegistry;
use crate::subscribers::Subscription;

/// Page sizes the listing offers.
pub const PAGE_SIZES: &[usize] = &[5, 10, 20, 30, 40, 50];

/// Sortable listing columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    FirstName,
    LastName,
    Dob,
    Gender,
    BloodGroup,
    City,
    State,
    Country,
    Phone,
    Email,
    Address,
}

impl SortColumn {
    fn compare(self, a: &Patient, b: &Patient) -> CmpOrdering {
        match self {
            SortColumn::FirstName => a.first_name.cmp(&b.first_name),
            SortColumn::LastName => a.last_name.cmp(&b.last_name),
            SortColumn::Dob => a.dob.cmp(&b.dob),
            SortColumn::Gender => a.gender.cmp(&b.gender),
            SortColumn::BloodGroup => a.blood_group.cmp(&b.blood_group),
            SortColumn::City => a.city.cmp(&b.city),
            SortColumn::State => a.state.cmp(&b.state),
            SortColumn::Country => a.country.cmp(&b.country),
            SortColumn::Phone => a.phone.cmp(&b.phone),
            SortColumn::Email => a.email.cmp(&b.email),
            SortColumn::Address => a.address.cmp(&b.address),
        }
    }
}

/// The listing view's state.
///
/// Holds the last fetched list; a change notification only marks it stale.
/// The caller decides when to [`refresh`](Self::refresh).
pub struct PatientListing {
    registry: Arc<PatientRegistry>,
    subscription: Subscription,
    stale: Arc<AtomicBool>,
    patients: Vec<Patient>,
    error: Option<String>,
    filter: String,
    sort: Option<(SortColumn, bool)>,
    page_size: usize,
    page_index: usize,
}

impl PatientListing {
    /// Subscribe to changes and load the first list.
    pub fn open(registry: Arc<PatientRegistry>) -> Self {
        let stale = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&stale);
        let subscription = registry.subscribe(move || flag.store(true, Ordering::SeqCst));

        let mut listing = Self {
            registry,
            subscription,
            stale,
            patients: Vec::new(),
            error: None,
            filter: String::new(),
            sort: None,
            page_size: PAGE_SIZES[0],
            page_index: 0,
        };
        listing.refresh();
        listing
    }

    /// Whether a change arrived since the last fetch.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    /// Re-fetch from the store. A failure keeps the previous list and records
    /// the message.
    pub fn refresh(&mut self) {
        self.stale.store(false, Ordering::SeqCst);
        match self.registry.get_patients() {
            Ok(patients) => {
                self.patients = patients;
                self.error = None;
                self.clamp_page();
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load patients");
                self.error = Some(e.to_string());
            }
        }
    }

    /// Re-fetch only if a change arrived. Returns whether it did.
    pub fn refresh_if_stale(&mut self) -> bool {
        if self.is_stale() {
            self.refresh();
            true
        } else {
            false
        }
    }

    /// Every fetched patient, in store order (newest first).
    pub fn patients(&self) -> &[Patient] {
        &self.patients
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Case-insensitive substring filter over the displayed columns.
    pub fn set_filter(&mut self, filter: &str) {
        self.filter = filter.to_string();
        self.page_index = 0;
    }

    /// Sort by `column`; `None` restores store order.
    pub fn set_sort(&mut self, sort: Option<(SortColumn, bool)>) {
        self.sort = sort;
    }

    /// Must be one of [`PAGE_SIZES`]; other values are ignored.
    pub fn set_page_size(&mut self, size: usize) {
        if PAGE_SIZES.contains(&size) {
            self.page_size = size;
            self.clamp_page();
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_count(&self) -> usize {
        self.rows().len().div_ceil(self.page_size).max(1)
    }

    pub fn next_page(&mut self) -> bool {
        if self.page_index + 1 < self.page_count() {
            self.page_index += 1;
            true
        } else {
            false
        }
    }

    pub fn previous_page(&mut self) -> bool {
        if self.page_index > 0 {
            self.page_index -= 1;
            true
        } else {
            false
        }
    }

    /// Filtered and sorted rows, all pages.
    pub fn rows(&self) -> Vec<&Patient> {
        let needle = self.filter.trim().to_lowercase();
        let mut rows: Vec<&Patient> = self
            .patients
            .iter()
            .filter(|p| needle.is_empty() || matches_filter(p, &needle))
            .collect();

        if let Some((column, ascending)) = self.sort {
            // stable: equal keys keep store order
            rows.sort_by(|a, b| {
                let ord = column.compare(a, b);
                if ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }
        rows
    }

    /// Rows on the current page.
    pub fn visible(&self) -> Vec<&Patient> {
        self.rows()
            .into_iter()
            .skip(self.page_index * self.page_size)
            .take(self.page_size)
            .collect()
    }

    fn clamp_page(&mut self) {
        self.page_index = self.page_index.min(self.page_count() - 1);
    }
}

impl Drop for PatientListing {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}

fn matches_filter(patient: &Patient, needle: &str) -> bool {
    let dob = patient.dob.to_string();
    [
        patient.first_name.as_str(),
        patient.last_name.as_str(),
        dob.as_str(),
        patient.gender.as_str(),
        patient.blood_group.as_str(),
        patient.city.as_str(),
        patient.state.as_str(),
        patient.country.as_str(),
        patient.phone.as_str(),
        patient.email.as_str(),
        patient.address.as_str(),
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(needle))
}
