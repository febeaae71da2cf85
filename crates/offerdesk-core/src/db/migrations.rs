//! Database schema initialization and migrations.

use log::info;

use crate::error::{DatabaseResultExt, Result};

/// Backfills the lifted offer date for rows written without it, reading the
/// RFC 3339 `offerDate` out of the stored document.
const BACKFILL_OFFER_DATE_SQL: &str = "UPDATE offers \
     SET offer_date_ms = CAST(ROUND((julianday(json_extract(document, '$.offerDate')) - 2440587.5) * 86400000) AS INTEGER) \
     WHERE offer_date_ms IS NULL AND json_extract(document, '$.offerDate') IS NOT NULL";

impl super::Database {
    /// Initializes the database schema using the embedded SQL file.
    pub(super) fn initialize_schema(&self) -> Result<()> {
        let schema_sql = include_str!("../../assets/schema.sql");
        self.connection
            .execute_batch(schema_sql)
            .db_context("Failed to initialize database schema")?;

        self.apply_migrations()?;

        Ok(())
    }

    /// Apply database migrations for existing databases
    fn apply_migrations(&self) -> Result<()> {
        let backfilled = self
            .connection
            .execute(BACKFILL_OFFER_DATE_SQL, [])
            .db_context("Failed to backfill offer dates")?;
        if backfilled > 0 {
            info!("Backfilled offer_date_ms for {backfilled} offers");
        }

        Ok(())
    }
}
