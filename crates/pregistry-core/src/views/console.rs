//! Free-form SQL console over the registry.

use serde::Serialize;

use crate::db::{Row, SqlValue};
use crate::registry::PatientRegistry;

/// Canned queries offered next to the editor: (title, sql).
pub const EXAMPLE_QUERIES: &[(&str, &str)] = &[
    (
        "All Patients (Alphabetical)",
        "SELECT * FROM patients ORDER BY last_name, first_name;",
    ),
    ("Male Patients", "SELECT * FROM patients WHERE gender = 'Male';"),
    ("O+ Blood Type", "SELECT * FROM patients WHERE blood_group = 'O+';"),
    (
        "Basic Contact Info",
        "SELECT id, first_name, last_name, phone FROM patients;",
    ),
];

/// Column header: name plus the type of the first row's value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: &'static str,
}

/// Captured outcome of one successful run.
#[derive(Debug, Clone, Serialize)]
pub struct QueryReport {
    pub query: String,
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Row>,
    /// RFC 3339, local clock
    pub executed_at: String,
}

impl QueryReport {
    fn capture(query: &str, rows: Vec<Row>) -> Self {
        let columns = rows
            .first()
            .map(|row| {
                row.iter()
                    .map(|(name, value)| ColumnInfo {
                        name: name.to_string(),
                        type_name: value.type_name(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            query: query.to_string(),
            columns,
            rows,
            executed_at: chrono::Local::now().to_rfc3339(),
        }
    }

    /// Header line of column names, then one line per row with every field
    /// double-quoted. NULL becomes an empty field.
    pub fn to_csv(&self) -> String {
        let Some(first) = self.rows.first() else {
            return String::new();
        };

        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        lines.push(first.columns().join(","));
        for row in &self.rows {
            let fields: Vec<String> = row.values().iter().map(quote_csv).collect();
            lines.push(fields.join(","));
        }
        lines.join("\n")
    }

    /// Rows as a pretty-printed JSON array of objects.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.rows)
    }
}

fn quote_csv(value: &SqlValue) -> String {
    format!("\"{}\"", value.to_string().replace('"', "\"\""))
}

/// Editor text plus the outcome of the last run.
#[derive(Debug, Clone)]
pub struct QueryConsole {
    sql: String,
    report: Option<QueryReport>,
    error: Option<String>,
}

impl QueryConsole {
    /// Console opened from the listing, optionally pre-filtered to one patient.
    pub fn new(patient_id: Option<&str>) -> Self {
        let sql = match patient_id {
            Some(id) => format!(
                "SELECT * FROM patients WHERE id = '{}';",
                id.replace('\'', "''")
            ),
            None => "SELECT * FROM patients;".to_string(),
        };
        Self {
            sql,
            report: None,
            error: None,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn set_sql(&mut self, sql: impl Into<String>) {
        self.sql = sql.into();
    }

    /// Load the `index`th entry of [`EXAMPLE_QUERIES`].
    pub fn load_example(&mut self, index: usize) -> bool {
        match EXAMPLE_QUERIES.get(index) {
            Some((_, sql)) => {
                self.sql = sql.to_string();
                true
            }
            None => false,
        }
    }

    /// Run the current text. A failure replaces the error text and keeps the
    /// last good report.
    pub fn run(&mut self, registry: &PatientRegistry) -> Result<&QueryReport, &str> {
        self.error = None;
        match registry.execute_query(&self.sql, &[]) {
            Ok(rows) => Ok(&*self.report.insert(QueryReport::capture(&self.sql, rows))),
            Err(e) => Err(self.error.insert(e.to_string()).as_str()),
        }
    }

    pub fn report(&self) -> Option<&QueryReport> {
        self.report.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewPatient;
    use crate::profile::Profile;
    use chrono::NaiveDate;

    fn seed(registry: &PatientRegistry, first: &str, gender: &str, history: Option<&str>) -> String {
        registry
            .add_patient(NewPatient {
                first_name: first.into(),
                last_name: "Smith".into(),
                dob: NaiveDate::from_ymd_opt(1970, 5, 5).unwrap(),
                gender: gender.into(),
                blood_group: "O+".into(),
                city: "Leeds".into(),
                state: "West Yorkshire".into(),
                country: "UK".into(),
                address: "1 Park Row".into(),
                phone: "0113 555 0100".into(),
                email: "smith@example.co.uk".into(),
                insurance: None,
                policy_number: None,
                medical_history: history.map(String::from),
            })
            .unwrap()
    }

    #[test]
    fn test_default_queries() {
        assert_eq!(QueryConsole::new(None).sql(), "SELECT * FROM patients;");
        assert_eq!(
            QueryConsole::new(Some("o'brien")).sql(),
            "SELECT * FROM patients WHERE id = 'o''brien';"
        );
    }

    #[test]
    fn test_patient_filter_selects_one() {
        let tab = Profile::in_memory().open_tab();
        let id = seed(&tab, "Jo", "Female", None);
        seed(&tab, "Al", "Male", None);

        let mut console = QueryConsole::new(Some(&id));
        let report = console.run(&tab).unwrap();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].text("id"), Some(id.as_str()));
    }

    #[test]
    fn test_column_types_from_first_row() {
        let tab = Profile::in_memory().open_tab();
        seed(&tab, "Jo", "Female", None);

        let mut console = QueryConsole::new(None);
        console.set_sql("SELECT first_name, 1 AS n, medical_history FROM patients");
        let report = console.run(&tab).unwrap();
        assert_eq!(
            report.columns,
            vec![
                ColumnInfo { name: "first_name".into(), type_name: "string" },
                ColumnInfo { name: "n".into(), type_name: "number" },
                ColumnInfo { name: "medical_history".into(), type_name: "null" },
            ]
        );
    }

    #[test]
    fn test_examples_run() {
        let tab = Profile::in_memory().open_tab();
        seed(&tab, "Jo", "Female", None);
        seed(&tab, "Al", "Male", None);

        let mut console = QueryConsole::new(None);
        assert!(console.load_example(1));
        assert_eq!(console.run(&tab).unwrap().rows.len(), 1);
        assert!(!console.load_example(EXAMPLE_QUERIES.len()));
    }

    #[test]
    fn test_error_kept_as_text() {
        let tab = Profile::in_memory().open_tab();
        let mut console = QueryConsole::new(None);
        console.run(&tab).unwrap();

        console.set_sql("SELECT * FROM nowhere");
        let err = console.run(&tab).unwrap_err().to_string();
        assert!(err.contains("no such table"));
        assert!(console.report().is_some());
        assert_eq!(console.error(), Some(err.as_str()));
    }

    #[test]
    fn test_statement_batch_reported_not_half_run() {
        let tab = Profile::in_memory().open_tab();
        seed(&tab, "Jo", "Female", None);

        let mut console = QueryConsole::new(None);
        console.set_sql("INSERT INTO patients (id) VALUES ('x'); DELETE FROM patients;");
        assert!(console.run(&tab).is_err());
        assert!(console.error().unwrap().contains("one statement"));
        assert_eq!(tab.get_patients().unwrap().len(), 1);
    }

    #[test]
    fn test_csv_export_quotes_everything() {
        let tab = Profile::in_memory().open_tab();
        seed(&tab, "Jo", "Female", Some("said \"hi\", twice"));

        let mut console = QueryConsole::new(None);
        console.set_sql("SELECT first_name, medical_history, insurance FROM patients");
        let csv = console.run(&tab).unwrap().to_csv();
        assert_eq!(
            csv,
            "first_name,medical_history,insurance\n\"Jo\",\"said \"\"hi\"\", twice\",\"\""
        );
    }

    #[test]
    fn test_json_export() {
        let tab = Profile::in_memory().open_tab();
        seed(&tab, "Jo", "Female", None);

        let mut console = QueryConsole::new(None);
        console.set_sql("SELECT first_name, insurance FROM patients");
        let json = console.run(&tab).unwrap().to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, serde_json::json!([{"first_name": "Jo", "insurance": null}]));
    }

    #[test]
    fn test_console_write_invalidates() {
        let tab = Profile::in_memory().open_tab();
        let hits = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let h = std::sync::Arc::clone(&hits);
        tab.subscribe(move || {
            h.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        let mut console = QueryConsole::new(None);
        console.set_sql("DELETE FROM patients");
        console.run(&tab).unwrap();
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
