//! Offer document upserts and range scans.

use jiff::Timestamp;
use rusqlite::{params, types::Type};
use serde::Serialize;
use serde_json::Value;

use crate::error::{DatabaseResultExt, DeskError, Result};

const CHECK_OFFER_EXISTS_SQL: &str = "SELECT EXISTS(SELECT 1 FROM offers WHERE dedupe_key = ?1)";
const UPSERT_OFFER_SQL: &str = "INSERT INTO offers (dedupe_key, offer_date_ms, document, created_at, updated_at) \
     VALUES (?1, ?2, ?3, ?4, ?4) \
     ON CONFLICT(dedupe_key) DO UPDATE SET \
     offer_date_ms = excluded.offer_date_ms, document = excluded.document, updated_at = excluded.updated_at";
const COUNT_OFFERS_SQL: &str = "SELECT COUNT(*) FROM offers";
const SELECT_DOCUMENTS_SQL: &str = "SELECT document FROM offers";

/// One offer ready to be written.
#[derive(Debug, Clone)]
pub struct OfferRow {
    pub dedupe_key: String,
    pub offer_date_ms: Option<i64>,
    pub document: Value,
}

/// Outcome of an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub updated: usize,
}

/// Inclusive bounds on the lifted offer date, in epoch milliseconds.
///
/// Rows without an offer date never satisfy a bounded range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OfferDateRange {
    pub min_ms: Option<i64>,
    pub max_ms: Option<i64>,
}

impl OfferDateRange {
    pub fn is_unbounded(&self) -> bool {
        self.min_ms.is_none() && self.max_ms.is_none()
    }
}

impl super::Database {
    /// Inserts or replaces offers by dedupe key in a single transaction.
    pub fn upsert_offers(&mut self, rows: &[OfferRow]) -> Result<ImportSummary> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let now = Timestamp::now().to_string();
        let mut summary = ImportSummary::default();
        {
            let mut exists = tx
                .prepare(CHECK_OFFER_EXISTS_SQL)
                .db_context("Failed to prepare query")?;
            let mut upsert = tx
                .prepare(UPSERT_OFFER_SQL)
                .db_context("Failed to prepare query")?;

            for row in rows {
                let existed: bool = exists
                    .query_row(params![row.dedupe_key], |r| r.get(0))
                    .db_context("Failed to check offer existence")?;
                let document = serde_json::to_string(&row.document)?;
                upsert
                    .execute(params![row.dedupe_key, row.offer_date_ms, document, now])
                    .db_context("Failed to upsert offer")?;
                if existed {
                    summary.updated += 1;
                } else {
                    summary.inserted += 1;
                }
            }
        }

        tx.commit().db_context("Failed to commit transaction")?;
        Ok(summary)
    }

    /// Number of stored offers.
    pub fn count_offers(&self) -> Result<u64> {
        let count: i64 = self
            .connection
            .query_row(COUNT_OFFERS_SQL, [], |row| row.get(0))
            .db_context("Failed to count offers")?;
        Ok(count as u64)
    }

    /// Decodes every stored document whose offer date falls in `range`, in
    /// insertion order.
    pub fn load_documents(&self, range: OfferDateRange) -> Result<Vec<Value>> {
        let mut query = SELECT_DOCUMENTS_SQL.to_string();
        let mut conditions = Vec::new();
        let mut params_vec: Vec<i64> = Vec::new();

        if let Some(min) = range.min_ms {
            conditions.push("offer_date_ms >= ?");
            params_vec.push(min);
        }
        if let Some(max) = range.max_ms {
            conditions.push("offer_date_ms <= ?");
            params_vec.push(max);
        }
        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }
        query.push_str(" ORDER BY id");

        let mut stmt = self
            .connection
            .prepare(&query)
            .db_context("Failed to prepare query")?;

        let documents = stmt
            .query_map(rusqlite::params_from_iter(params_vec), |row| {
                let text: String = row.get(0)?;
                serde_json::from_str::<Value>(&text).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
                })
            })
            .db_context("Failed to query offers")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| DeskError::database("Failed to decode offer document").with_source(e))?;

        Ok(documents)
    }
}
