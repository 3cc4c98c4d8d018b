//! Pinecone vector index service over its REST API.
//!
//! Index management goes to the control plane; each index is then reached on
//! its own data-plane host, learned from `describe_index`.

use crate::vector_index::{
    IndexDescription, IndexHandle, IndexSpec, IndexStats, Metadata, Metric, QueryRequest,
    ScoredVector, VectorIndexService, VectorRecord,
};
use async_trait::async_trait;
use prodrec_core::{AppError, AppResult};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Pinecone control plane
pub const DEFAULT_CONTROL_URL: &str = "https://api.pinecone.io";

const API_VERSION: &str = "2024-07";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Authenticated HTTP access shared by the service and its handles.
#[derive(Debug, Clone)]
struct Api {
    client: Client,
    api_key: String,
}

impl Api {
    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    async fn send(&self, builder: RequestBuilder) -> AppResult<Response> {
        builder
            .send()
            .await
            .map_err(|e| AppError::Index(format!("Failed to reach Pinecone: {}", e)))
    }
}

/// Pinecone service client.
#[derive(Debug, Clone)]
pub struct PineconeService {
    api: Api,
    control_url: String,
}

impl PineconeService {
    /// Create a client. No request is made until the first call.
    pub fn new(api_key: impl Into<String>, control_url: Option<&str>) -> AppResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AppError::Config("Pinecone API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api: Api { client, api_key },
            control_url: control_url
                .unwrap_or(DEFAULT_CONTROL_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }

    fn indexes_url(&self) -> String {
        format!("{}/indexes", self.control_url)
    }

    /// Fetch an index model; `None` when the index does not exist.
    async fn fetch_index(&self, name: &str) -> AppResult<Option<IndexModel>> {
        let url = format!("{}/{}", self.indexes_url(), name);
        let response = self.api.send(self.api.request(Method::GET, &url)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let model = read_json(response, control_error).await?;
        Ok(Some(model))
    }
}

#[async_trait]
impl VectorIndexService for PineconeService {
    #[instrument(skip(self))]
    async fn list_index_names(&self) -> AppResult<Vec<String>> {
        let response = self
            .api
            .send(self.api.request(Method::GET, &self.indexes_url()))
            .await?;
        let list: IndexList = read_json(response, control_error).await?;
        Ok(list.indexes.into_iter().map(|i| i.name).collect())
    }

    #[instrument(skip(self, spec), fields(index = %spec.name))]
    async fn create_index(&self, spec: &IndexSpec) -> AppResult<()> {
        let body = CreateIndexBody::from_spec(spec);
        let response = self
            .api
            .send(self.api.request(Method::POST, &self.indexes_url()).json(&body))
            .await?;

        expect_success(response, create_error).await?;
        debug!("Index creation accepted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn describe_index(&self, name: &str) -> AppResult<IndexDescription> {
        self.fetch_index(name)
            .await?
            .map(IndexModel::into_description)
            .ok_or_else(|| AppError::Index(format!("Index '{}' not found", name)))
    }

    #[instrument(skip(self))]
    async fn index(&self, name: &str) -> AppResult<Arc<dyn IndexHandle>> {
        let model = self.fetch_index(name).await?.ok_or_else(|| {
            AppError::IndexUnavailable(format!("Index '{}' does not exist", name))
        })?;

        let host = model
            .host
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                AppError::IndexUnavailable(format!("Index '{}' has no data-plane host yet", name))
            })?;

        Ok(Arc::new(PineconeIndex {
            api: self.api.clone(),
            name: name.to_string(),
            base_url: data_plane_url(&host),
        }))
    }
}

/// Handle bound to one Pinecone index.
#[derive(Debug)]
pub struct PineconeIndex {
    api: Api,
    name: String,
    base_url: String,
}

impl PineconeIndex {
    async fn send_post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> AppResult<Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);
        self.api
            .send(self.api.request(Method::POST, &url).json(body))
            .await
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> AppResult<Response> {
        let response = self.send_post(path, body).await?;
        expect_success(response, data_error).await
    }
}

#[async_trait]
impl IndexHandle for PineconeIndex {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, records), fields(index = %self.name, count = records.len()))]
    async fn upsert(&self, records: &[VectorRecord]) -> AppResult<usize> {
        let response = self.post("/vectors/upsert", &UpsertBody { vectors: records }).await?;
        let body: UpsertResponse = parse_json(response).await?;
        Ok(body.upserted_count)
    }

    #[instrument(skip(self), fields(index = %self.name))]
    async fn delete_all(&self) -> AppResult<()> {
        let response = self
            .send_post("/vectors/delete", &DeleteBody { delete_all: true })
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        delete_outcome(status, &body)
    }

    #[instrument(skip(self), fields(index = %self.name))]
    async fn describe_stats(&self) -> AppResult<IndexStats> {
        let response = self
            .post("/describe_index_stats", &serde_json::json!({}))
            .await?;
        let stats: StatsResponse = parse_json(response).await?;
        Ok(IndexStats {
            total_vector_count: stats.total_vector_count,
            dimension: stats.dimension,
        })
    }

    #[instrument(skip(self, request), fields(index = %self.name, top_k = request.top_k))]
    async fn query(&self, request: &QueryRequest) -> AppResult<Vec<ScoredVector>> {
        let response = self.post("/query", &QueryBody::from(request)).await?;
        let body: QueryResponse = parse_json(response).await?;
        Ok(body.into_scored(request.include_values))
    }
}

/// Data-plane hosts come back without a scheme.
fn data_plane_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

async fn expect_success(
    response: Response,
    map_error: fn(StatusCode, &str) -> AppError,
) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(map_error(status, &body))
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> AppResult<T> {
    response
        .json()
        .await
        .map_err(|e| AppError::Index(format!("Failed to parse Pinecone response: {}", e)))
}

async fn read_json<T: DeserializeOwned>(
    response: Response,
    map_error: fn(StatusCode, &str) -> AppError,
) -> AppResult<T> {
    parse_json(expect_success(response, map_error).await?).await
}

/// Pull the message out of `{"error":{"message":..}}` or `{"message":..}`.
fn error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| v.pointer("/error/message").or_else(|| v.get("message")))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

fn create_error(status: StatusCode, body: &str) -> AppError {
    let message = format!("Pinecone rejected index ({}): {}", status, error_message(body));
    match status.as_u16() {
        400 | 409 | 422 => AppError::IndexCreation(message),
        _ => AppError::Index(message),
    }
}

fn control_error(status: StatusCode, body: &str) -> AppError {
    let message = format!("Pinecone control plane error ({}): {}", status, error_message(body));
    match status.as_u16() {
        401 | 403 => AppError::IndexUnavailable(message),
        _ => AppError::Index(message),
    }
}

/// Serverless indexes answer `deleteAll` on an empty namespace with 404.
fn delete_outcome(status: StatusCode, body: &str) -> AppResult<()> {
    if status == StatusCode::NOT_FOUND {
        debug!("Namespace already empty: {}", error_message(body));
        return Ok(());
    }
    Err(data_error(status, body))
}

fn data_error(status: StatusCode, body: &str) -> AppError {
    let message = format!("Pinecone data plane error ({}): {}", status, error_message(body));
    match status.as_u16() {
        401 | 403 | 404 => AppError::IndexUnavailable(message),
        _ => AppError::Index(message),
    }
}

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexModel>,
}

#[derive(Debug, Deserialize)]
struct IndexModel {
    name: String,
    dimension: usize,
    metric: Metric,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    status: IndexStatus,
}

#[derive(Debug, Default, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

impl IndexModel {
    fn into_description(self) -> IndexDescription {
        IndexDescription {
            name: self.name,
            dimension: self.dimension,
            metric: self.metric,
            ready: self.status.ready,
            host: self.host,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateIndexBody<'a> {
    name: &'a str,
    dimension: usize,
    metric: Metric,
    spec: ServerlessSpec<'a>,
}

#[derive(Debug, Serialize)]
struct ServerlessSpec<'a> {
    serverless: Serverless<'a>,
}

#[derive(Debug, Serialize)]
struct Serverless<'a> {
    cloud: &'a str,
    region: &'a str,
}

impl<'a> CreateIndexBody<'a> {
    fn from_spec(spec: &'a IndexSpec) -> Self {
        Self {
            name: &spec.name,
            dimension: spec.dimension,
            metric: spec.metric,
            spec: ServerlessSpec {
                serverless: Serverless {
                    cloud: &spec.placement.cloud,
                    region: &spec.placement.region,
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct UpsertBody<'a> {
    vectors: &'a [VectorRecord],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteBody {
    delete_all: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    total_vector_count: u64,
    #[serde(default)]
    dimension: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

impl<'a> From<&'a QueryRequest> for QueryBody<'a> {
    fn from(request: &'a QueryRequest) -> Self {
        Self {
            vector: &request.vector,
            top_k: request.top_k,
            include_metadata: request.include_metadata,
            include_values: request.include_values,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryHit>,
}

#[derive(Debug, Deserialize)]
struct QueryHit {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    values: Vec<f32>,
    #[serde(default)]
    metadata: Option<Metadata>,
}

impl QueryResponse {
    /// Pinecone sends `values: []` when values were not requested.
    fn into_scored(self, include_values: bool) -> Vec<ScoredVector> {
        self.matches
            .into_iter()
            .map(|hit| ScoredVector {
                id: hit.id,
                score: hit.score,
                values: include_values.then_some(hit.values),
                metadata: hit.metadata,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_index::Placement;
    use serde_json::json;

    #[test]
    fn test_create_body_wire_format() {
        let spec = IndexSpec {
            name: "product-recommend".to_string(),
            dimension: 384,
            metric: Metric::Cosine,
            placement: Placement::default(),
        };

        let body = serde_json::to_value(CreateIndexBody::from_spec(&spec)).unwrap();
        assert_eq!(
            body,
            json!({
                "name": "product-recommend",
                "dimension": 384,
                "metric": "cosine",
                "spec": {"serverless": {"cloud": "aws", "region": "us-east-1"}}
            })
        );
    }

    #[test]
    fn test_query_body_wire_format() {
        let request = QueryRequest::with_metadata(vec![0.5, 0.25], 3);
        let body = serde_json::to_value(QueryBody::from(&request)).unwrap();
        assert_eq!(
            body,
            json!({"vector": [0.5, 0.25], "topK": 3, "includeMetadata": true, "includeValues": false})
        );

        let delete = serde_json::to_value(DeleteBody { delete_all: true }).unwrap();
        assert_eq!(delete, json!({"deleteAll": true}));
    }

    #[test]
    fn test_upsert_body_wire_format() {
        let mut metadata = Metadata::new();
        metadata.insert("unitprice".into(), json!(49.99));
        let records = vec![
            VectorRecord {
                id: "P1".to_string(),
                values: vec![1.0, 0.0],
                metadata: Some(metadata),
            },
            VectorRecord {
                id: "P2".to_string(),
                values: vec![0.0, 1.0],
                metadata: None,
            },
        ];

        let body = serde_json::to_value(UpsertBody { vectors: &records }).unwrap();
        assert_eq!(
            body,
            json!({"vectors": [
                {"id": "P1", "values": [1.0, 0.0], "metadata": {"unitprice": 49.99}},
                {"id": "P2", "values": [0.0, 1.0]}
            ]})
        );
    }

    #[test]
    fn test_parse_index_list_and_description() {
        let list: IndexList = serde_json::from_value(json!({
            "indexes": [{
                "name": "product-recommend",
                "dimension": 384,
                "metric": "cosine",
                "host": "product-recommend-abc123.svc.aped-4627-b74a.pinecone.io",
                "spec": {"serverless": {"cloud": "aws", "region": "us-east-1"}},
                "status": {"ready": false, "state": "Initializing"}
            }]
        }))
        .unwrap();

        let description = list.indexes.into_iter().next().unwrap().into_description();
        assert_eq!(description.name, "product-recommend");
        assert!(!description.ready);
        assert_eq!(
            data_plane_url(description.host.as_deref().unwrap()),
            "https://product-recommend-abc123.svc.aped-4627-b74a.pinecone.io"
        );

        let empty: IndexList = serde_json::from_value(json!({})).unwrap();
        assert!(empty.indexes.is_empty());
    }

    #[test]
    fn test_parse_stats_and_query_response() {
        let stats: StatsResponse = serde_json::from_value(json!({
            "namespaces": {"": {"vectorCount": 3}},
            "dimension": 384,
            "indexFullness": 0.0,
            "totalVectorCount": 3
        }))
        .unwrap();
        assert_eq!(stats.total_vector_count, 3);
        assert_eq!(stats.dimension, Some(384));

        let response: QueryResponse = serde_json::from_value(json!({
            "matches": [
                {"id": "P2", "score": 0.91, "values": [], "metadata": {"category": "Fitness"}},
                {"id": "P1", "score": 0.12, "values": []}
            ],
            "namespace": ""
        }))
        .unwrap();
        let scored = response.into_scored(false);
        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].id, "P2");
        assert!(scored[0].values.is_none());
        assert_eq!(scored[0].metadata.as_ref().unwrap()["category"], "Fitness");
        assert!(scored[1].metadata.is_none());
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            create_error(StatusCode::CONFLICT, r#"{"error":{"code":"ALREADY_EXISTS","message":"Resource already exists"}}"#),
            AppError::IndexCreation(msg) if msg.ends_with("Resource already exists")
        ));
        assert!(matches!(
            create_error(StatusCode::UNPROCESSABLE_ENTITY, "bad dimension"),
            AppError::IndexCreation(_)
        ));
        assert!(matches!(
            create_error(StatusCode::INTERNAL_SERVER_ERROR, ""),
            AppError::Index(_)
        ));
        assert!(matches!(
            data_error(StatusCode::NOT_FOUND, r#"{"code":5,"message":"Not Found"}"#),
            AppError::IndexUnavailable(msg) if msg.ends_with("Not Found")
        ));
        assert!(matches!(
            data_error(StatusCode::BAD_REQUEST, "Vector dimension 8 does not match"),
            AppError::Index(_)
        ));
        assert!(matches!(
            control_error(StatusCode::UNAUTHORIZED, "Invalid API Key"),
            AppError::IndexUnavailable(_)
        ));
    }

    #[test]
    fn test_delete_all_on_empty_namespace_succeeds() {
        assert!(delete_outcome(
            StatusCode::NOT_FOUND,
            r#"{"code":5,"message":"Namespace not found","details":[]}"#
        )
        .is_ok());
        assert!(matches!(
            delete_outcome(StatusCode::FORBIDDEN, "Forbidden"),
            Err(AppError::IndexUnavailable(_))
        ));
        assert!(matches!(
            delete_outcome(StatusCode::SERVICE_UNAVAILABLE, "try again"),
            Err(AppError::Index(_))
        ));
    }

    #[test]
    fn test_new_requires_key_and_trims_url() {
        assert!(matches!(
            PineconeService::new("  ", None),
            Err(AppError::Config(_))
        ));

        let service = PineconeService::new("pc-test", Some("http://localhost:5080/")).unwrap();
        assert_eq!(service.indexes_url(), "http://localhost:5080/indexes");
        assert_eq!(data_plane_url("http://localhost:5081/"), "http://localhost:5081");
    }
}
