use crate::models::{Metadata, QueryHit, Record};
use crate::traits::VectorCollection;
use crate::StoreError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use url::Url;
use uuid::Uuid;

const BACKEND: &str = "qdrant";

/// A collection hosted by a Qdrant server, addressed over its REST API.
///
/// Qdrant only accepts integer or UUID point ids, so each logical id is
/// mapped to a UUIDv5 and kept verbatim in the payload under `id`.
pub struct QdrantCollection {
    endpoint: String,
    collection: String,
    client: Client,
    vector_size: usize,
}

impl QdrantCollection {
    pub fn new(
        endpoint: &str,
        collection: impl Into<String>,
        vector_size: usize,
    ) -> Result<Self, StoreError> {
        let parsed = Url::parse(endpoint)?;
        Ok(Self {
            endpoint: parsed.as_str().trim_end_matches('/').to_string(),
            collection: collection.into(),
            client: Client::new(),
            vector_size,
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.endpoint, self.collection)
    }

    /// Creates the collection with cosine distance unless it already exists.
    pub async fn ensure_collection(&self) -> Result<(), StoreError> {
        let existing = self.client.get(self.collection_url()).send().await?;
        if existing.status().is_success() {
            let parsed: Value = existing.json().await?;
            let size = parsed
                .pointer("/result/config/params/vectors/size")
                .and_then(Value::as_u64)
                .map(|size| size as usize);
            return match size {
                Some(size) if size != self.vector_size => Err(StoreError::DimensionMismatch {
                    collection: self.collection.clone(),
                    expected: size,
                    actual: self.vector_size,
                }),
                _ => Ok(()),
            };
        }

        let response = self
            .client
            .put(self.collection_url())
            .json(&json!({
                "vectors": { "size": self.vector_size, "distance": "Cosine" }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("create {}: {}", self.collection, response.status()),
            });
        }
        Ok(())
    }

    fn check_dimensions(&self, actual: usize) -> Result<(), StoreError> {
        if actual != self.vector_size {
            return Err(StoreError::DimensionMismatch {
                collection: self.collection.clone(),
                expected: self.vector_size,
                actual,
            });
        }
        Ok(())
    }
}

pub fn point_id(id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes())
}

fn point_from_record(record: &Record) -> Value {
    json!({
        "id": point_id(&record.id).to_string(),
        "vector": record.vector,
        "payload": {
            "id": record.id,
            "metadata": record.metadata,
            "document": record.document,
        },
    })
}

fn hit_from_point(point: &Value) -> Option<QueryHit> {
    let id = point.pointer("/payload/id").and_then(Value::as_str)?.to_string();
    let metadata = point
        .pointer("/payload/metadata")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_else(Metadata::new);
    let document = point
        .pointer("/payload/document")
        .and_then(Value::as_str)
        .map(str::to_string);
    let score = point.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);

    Some(QueryHit {
        id,
        metadata,
        distance: 1.0 - score as f32,
        document,
    })
}

#[async_trait]
impl VectorCollection for QdrantCollection {
    fn name(&self) -> &str {
        &self.collection
    }

    async fn upsert(&self, records: Vec<Record>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let points = records
            .iter()
            .map(|record| {
                self.check_dimensions(record.vector.len())?;
                Ok(point_from_record(record))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Write {
                collection: self.collection.clone(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryHit>, StoreError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        self.check_dimensions(vector.len())?;

        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&json!({
                "vector": vector,
                "limit": k,
                "with_payload": true,
            }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: BACKEND.to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let hits: Vec<QueryHit> = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .map(|points| points.iter().filter_map(hit_from_point).collect())
            .unwrap_or_default();

        Ok(hits)
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let points: Vec<String> = ids.iter().map(|id| point_id(id).to_string()).collect();
        let response = self
            .client
            .post(format!("{}/points/delete?wait=true", self.collection_url()))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Write {
                collection: self.collection.clone(),
                details: response.status().to_string(),
            });
        }
        // qdrant does not report how many points actually existed
        Ok(ids.len())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let response = self
            .client
            .post(format!("{}/points/count", self.collection_url()))
            .json(&json!({ "exact": true }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }
        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: BACKEND.to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        Ok(parsed
            .pointer("/result/count")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize)
    }
}
