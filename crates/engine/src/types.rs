//! Recommender type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::vector_index::{Metadata, VectorRecord};

/// A product row as supplied by the dataset.
///
/// Fields are kept exactly as read; `unitprice` is coerced to a number only
/// when the record is ingested, so a bad price fails that record alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Natural key of the product
    #[serde(rename = "productID")]
    pub product_id: String,

    /// Free-text description (the embedded field)
    pub description: String,

    pub category: String,

    /// Raw unit price text
    pub unitprice: String,

    pub country: String,
}

impl ProductRecord {
    pub fn new(
        product_id: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        unitprice: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            description: description.into(),
            category: category.into(),
            unitprice: unitprice.into(),
            country: country.into(),
        }
    }

    /// Translate the row into typed metadata.
    ///
    /// Fails when the product id is blank or the price is not a finite number.
    pub fn metadata(&self) -> Result<ProductMetadata, String> {
        if self.product_id.trim().is_empty() {
            return Err("productID is empty".to_string());
        }

        let raw = self.unitprice.trim();
        let unitprice: f64 = raw
            .parse()
            .map_err(|_| format!("unitprice '{}' is not a number", self.unitprice))?;
        if !unitprice.is_finite() {
            return Err(format!("unitprice '{}' is not finite", self.unitprice));
        }

        Ok(ProductMetadata {
            description: self.description.clone(),
            category: self.category.clone(),
            unitprice,
            country: self.country.clone(),
        })
    }
}

/// Typed metadata stored next to each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMetadata {
    pub description: String,
    pub category: String,
    pub unitprice: f64,
    pub country: String,
}

impl ProductMetadata {
    /// Flatten into the index service's scalar mapping.
    pub fn to_map(&self) -> Metadata {
        let mut map = Metadata::new();
        map.insert("description".into(), self.description.clone().into());
        map.insert("category".into(), self.category.clone().into());
        map.insert("unitprice".into(), self.unitprice.into());
        map.insert("country".into(), self.country.clone().into());
        map
    }
}

/// One stored entry: natural key, embedding, metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ProductMetadata,
}

impl IndexEntry {
    pub fn to_record(&self) -> VectorRecord {
        VectorRecord {
            id: self.id.clone(),
            values: self.vector.clone(),
            metadata: Some(self.metadata.to_map()),
        }
    }
}

/// Where a record failed during ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Id or price could not be turned into metadata
    Validate,
    /// The embedding model failed on the description
    Embed,
    /// The index rejected or dropped the write
    Upsert,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Validate => "validate",
            FailureStage::Embed => "embed",
            FailureStage::Upsert => "upsert",
        }
    }
}

/// A per-record ingestion failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub product_id: String,

    /// Zero-based position of the record in the input
    pub position: usize,

    pub stage: FailureStage,

    pub message: String,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    /// Number of records handed to the pipeline
    pub attempted: usize,

    /// Number of records whose upsert was acknowledged
    pub succeeded: usize,

    /// Number of distinct product ids written
    pub distinct_ids: usize,

    /// Failures in encounter order
    pub failures: Vec<RecordFailure>,

    pub started_at: DateTime<Utc>,

    pub duration_secs: f64,
}

impl IngestionReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// One-line summary for the operator.
    pub fn summary(&self) -> String {
        format!(
            "Uploaded {}/{} vectors successfully ({} failed) in {:.2}s",
            self.succeeded,
            self.attempted,
            self.failed(),
            self.duration_secs
        )
    }
}

/// Metadata as read back from the index.
///
/// Every field is optional: an entry written by something other than this
/// pipeline may lack a field or hold the wrong type, and that is reported as
/// absence rather than a default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductMetadataView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unitprice: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl ProductMetadataView {
    /// Decode a stored mapping; an empty mapping means no metadata.
    pub fn from_map(map: &Metadata) -> Option<Self> {
        if map.is_empty() {
            return None;
        }

        let text = |key: &str| map.get(key).and_then(|v| v.as_str()).map(str::to_string);

        Some(Self {
            description: text("description"),
            category: text("category"),
            unitprice: map.get("unitprice").and_then(|v| v.as_f64()),
            country: text("country"),
        })
    }
}

/// One ranked recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,

    /// Similarity under the index metric (cosine: -1.0 to 1.0)
    pub score: f32,

    pub metadata: Option<ProductMetadataView>,
}

/// A query that could not be answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryError {
    pub query: String,
    pub message: String,
}

/// Result of a recommendation query.
///
/// `EmptyIndex` and `NoMatch` are valid outcomes, not errors; `Failed`
/// carries a contained per-query error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Recommendation {
    Matches { matches: Vec<QueryMatch> },
    EmptyIndex,
    NoMatch,
    Failed(QueryError),
}

impl Recommendation {
    pub fn matches(&self) -> &[QueryMatch] {
        match self {
            Recommendation::Matches { matches } => matches,
            _ => &[],
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Recommendation::Failed(_))
    }
}
