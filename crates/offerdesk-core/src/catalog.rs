//! The canonical field catalog.
//!
//! A small table of the offer document's queryable fields, their semantic
//! type and the words people use for them. The same table is embedded in
//! the model instructions and enforced against every validated plan, so a
//! field the model invents is rejected before any query is built.

use std::{fmt, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    error::{DeskError, Result},
    plan::{GroupKey, UniversalPlan},
};

const EMBEDDED_CATALOG: &str = include_str!("../assets/catalog.json");

/// Semantic type of a catalog field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Date,
    Number,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::String => "string",
            Self::Date => "date",
            Self::Number => "number",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCatalog {
    pub collection: String,
    pub timezone: String,
    pub fields: Vec<FieldDef>,
}

impl FieldCatalog {
    /// The catalog shipped with the crate.
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_CATALOG)
    }

    /// Reads a catalog from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| DeskError::FileSystem {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    fn from_json(text: &str) -> Result<Self> {
        let catalog: Self = serde_json::from_str(text)?;
        if catalog.fields.is_empty() {
            return Err(DeskError::Configuration {
                message: "field catalog declares no fields".to_string(),
            });
        }
        Ok(catalog)
    }

    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn date_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields
            .iter()
            .filter(|field| field.field_type == FieldType::Date)
    }

    /// Rejects a plan that names any field outside the catalog.
    ///
    /// Sort keys may also name a group key or a metric output, since those
    /// are the columns an aggregate produces.
    pub fn check_plan(&self, plan: &UniversalPlan) -> Result<()> {
        for (i, condition) in plan.filters.iter().enumerate() {
            self.require(&condition.field, format!("filters[{i}].field"))?;
        }
        if let Some(time_range) = &plan.time_range {
            self.require_date(&time_range.field, "timeRange.field".to_string())?;
        }
        for (i, key) in plan.group_by.iter().enumerate() {
            match key {
                GroupKey::Field(name) => self.require(name, format!("groupBy[{i}]"))?,
                GroupKey::TimeBucket(bucket) => {
                    self.require_date(&bucket.field, format!("groupBy[{i}].timeBucket.field"))?
                }
            }
        }
        for (i, metric) in plan.metrics.iter().enumerate() {
            if let Some(field) = &metric.field {
                self.require(field, format!("metrics[{i}].field"))?;
            }
        }
        for (i, field) in plan.projection.iter().flatten().enumerate() {
            self.require(field, format!("projection[{i}]"))?;
        }

        let outputs: Vec<String> = plan
            .group_by
            .iter()
            .map(GroupKey::output_name)
            .chain(plan.metrics.iter().map(|metric| metric.output_name()))
            .collect();
        for (i, key) in plan.sort.iter().enumerate() {
            if !self.contains(&key.by) && !outputs.contains(&key.by) {
                return Err(unknown(format!("sort[{i}].by"), &key.by));
            }
        }
        Ok(())
    }

    fn require(&self, field: &str, path: String) -> Result<()> {
        if self.contains(field) {
            Ok(())
        } else {
            Err(unknown(path, field))
        }
    }

    fn require_date(&self, field: &str, path: String) -> Result<()> {
        match self.get(field) {
            Some(def) if def.field_type == FieldType::Date => Ok(()),
            _ => Err(unknown(path, field)),
        }
    }
}

fn unknown(path: String, field: &str) -> DeskError {
    DeskError::UnknownField {
        path,
        field: field.to_string(),
    }
}
