//! Background thread that owns the embedded database.
//!
//! Every statement for a store is sent to its worker over a queue and executed
//! there one at a time, so nothing else ever touches the underlying file.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use thiserror::Error;

use crate::db::{Database, DbError, Row, SqlValue};
use crate::statement::StatementKind;

/// Worker errors.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Database worker is not running")]
    Disconnected,

    #[error("Failed to spawn database worker: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Where a worker keeps its store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreLocation {
    Memory,
    File(PathBuf),
}

impl StoreLocation {
    fn open(&self) -> Result<Database, DbError> {
        match self {
            StoreLocation::Memory => Database::open_in_memory(),
            StoreLocation::File(path) => Database::open(path),
        }
    }
}

struct Request {
    sql: String,
    params: Vec<SqlValue>,
    reply: Sender<Result<Vec<Row>, DbError>>,
}

/// Handle to a running database worker.
///
/// Shared by every tab attached to the same store. The thread stops once the
/// last handle is dropped.
pub struct Worker {
    namespace: String,
    tx: Option<Sender<Request>>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start a worker and wait until its store is open and the schema exists.
    pub fn spawn(namespace: &str, location: StoreLocation) -> WorkerResult<Self> {
        let (tx, rx) = mpsc::channel::<Request>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), DbError>>();

        let name = namespace.to_string();
        let thread = thread::Builder::new()
            .name(format!("pregistry-worker-{}", namespace))
            .spawn(move || {
                let db = match location.open() {
                    Ok(db) => db,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                tracing::info!(namespace = %name, store = ?location, "database worker ready");
                let _ = ready_tx.send(Ok(()));
                serve(&db, rx);
                tracing::info!(namespace = %name, "database worker stopped");
            })
            .map_err(WorkerError::Spawn)?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                namespace: namespace.to_string(),
                tx: Some(tx),
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e.into())
            }
            Err(_) => Err(WorkerError::Disconnected),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Run one statement on the worker and wait for its rows.
    pub fn query(&self, sql: &str, params: &[SqlValue]) -> WorkerResult<Vec<Row>> {
        let tx = self.tx.as_ref().ok_or(WorkerError::Disconnected)?;
        let (reply, response) = mpsc::channel();
        tx.send(Request {
            sql: sql.to_string(),
            params: params.to_vec(),
            reply,
        })
        .map_err(|_| WorkerError::Disconnected)?;

        let rows = response.recv().map_err(|_| WorkerError::Disconnected)??;
        Ok(rows)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Closing the queue ends the serve loop.
        self.tx.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn serve(db: &Database, rx: Receiver<Request>) {
    for request in rx {
        let result = db.execute(&request.sql, &request.params);
        let write = StatementKind::classify(&request.sql).is_write();
        match &result {
            Ok(rows) => tracing::debug!(
                sql = %request.sql.trim(),
                params = request.params.len(),
                write,
                rows = rows.len(),
                "statement executed"
            ),
            Err(e) => tracing::debug!(
                sql = %request.sql.trim(),
                params = request.params.len(),
                write,
                error = %e,
                "statement failed"
            ),
        }
        // The caller may have given up waiting; nothing to do then.
        let _ = request.reply.send(result);
    }
}
