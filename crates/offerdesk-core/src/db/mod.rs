//! SQLite storage for offer documents.
//!
//! Each offer is stored as one JSON document with its offer date lifted
//! into an indexed integer column, so window queries can narrow the scan
//! before documents are decoded and matched in process.

use std::{path::Path, time::Duration};

use rusqlite::Connection;

use crate::error::{DatabaseResultExt, Result};

pub mod migrations;
pub mod offer_queries;

pub use offer_queries::{ImportSummary, OfferDateRange, OfferRow};

/// How long a connection waits on a lock held by a concurrent import.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// One connection to the offer database.
pub struct Database {
    connection: Connection,
}

impl Database {
    /// Opens the database file and initializes the schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let connection = Connection::open(path).db_context("Failed to open database connection")?;
        connection
            .busy_timeout(BUSY_TIMEOUT)
            .db_context("Failed to set busy timeout")?;

        let db = Self { connection };
        db.initialize_schema()?;
        Ok(db)
    }
}
