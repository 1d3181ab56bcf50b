use std::collections::BTreeMap;
use std::sync::Mutex;

use reqwest::{Client, Method, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;

pub type Fields = Map<String, Value>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("request to the records service failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("records service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode records service response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("record {id} not found in {table}")]
    NotFound { table: String, id: String },

    #[error("invalid records service URL: {0}")]
    InvalidUrl(String),

    #[error("unsupported filter formula: {0}")]
    UnsupportedFilter(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub fields: Fields,
}

impl Record {
    pub fn str_field(&self, name: &str) -> Option<String> {
        match self.fields.get(name) {
            Some(Value::String(value)) if !value.trim().is_empty() => Some(value.clone()),
            Some(Value::Number(value)) => Some(value.to_string()),
            _ => None,
        }
    }

    pub fn bool_field(&self, name: &str) -> bool {
        matches!(self.fields.get(name), Some(Value::Bool(true)))
    }

    /// Linked-record ids or multi-select options.
    pub fn list_field(&self, name: &str) -> Vec<String> {
        match self.fields.get(name) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub filter_formula: Option<String>,
    pub sort: Vec<SortSpec>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    /// `{field} = 'value'`
    pub fn field_equals(field: &str, value: &str) -> Self {
        let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
        Self {
            filter_formula: Some(format!("{{{field}}} = '{escaped}'")),
            sort: Vec::new(),
        }
    }

    pub fn sorted(mut self, field: &str, direction: SortDirection) -> Self {
        self.sort.push(SortSpec {
            field: field.to_string(),
            direction,
        });
        self
    }

    fn params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(formula) = &self.filter_formula {
            params.push(("filterByFormula".to_string(), formula.clone()));
        }
        for (i, spec) in self.sort.iter().enumerate() {
            params.push((format!("sort[{i}][field]"), spec.field.clone()));
            params.push((
                format!("sort[{i}][direction]"),
                spec.direction.as_str().to_string(),
            ));
        }
        params
    }
}

/// No retries: a failed call surfaces to the caller once.
pub trait RecordsStore {
    async fn fetch(&self, table: &str, query: &Query) -> Result<Vec<Record>, StoreError>;

    async fn fetch_by_id(&self, table: &str, id: &str) -> Result<Record, StoreError>;

    async fn create(&self, table: &str, fields: Fields) -> Result<Record, StoreError>;

    async fn update(&self, table: &str, id: &str, fields: Fields) -> Result<Record, StoreError>;

    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError>;

    // Formulas can't match link ids, so filter after fetching.
    async fn fetch_linked(
        &self,
        table: &str,
        link_field: &str,
        id: &str,
        query: &Query,
    ) -> Result<Vec<Record>, StoreError> {
        let records = self.fetch(table, query).await?;
        Ok(records
            .into_iter()
            .filter(|record| record.list_field(link_field).iter().any(|linked| linked == id))
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<Record>,
    offset: Option<String>,
}

pub struct AirtableStore {
    api_url: String,
    api_key: String,
    base_id: String,
    http_client: Client,
}

impl AirtableStore {
    pub fn new(config: &Config) -> Self {
        Self {
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            base_id: config.base_id.clone(),
            http_client: Client::new(),
        }
    }

    fn table_url(&self, table: &str, id: Option<&str>) -> Result<Url, StoreError> {
        let mut url =
            Url::parse(&self.api_url).map_err(|err| StoreError::InvalidUrl(err.to_string()))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StoreError::InvalidUrl(self.api_url.clone()))?;
            segments.pop_if_empty().push(&self.base_id).push(table);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        params: &[(String, String)],
        body: Option<Value>,
    ) -> Result<Value, StoreError> {
        let mut request = self
            .http_client
            .request(method.clone(), url.clone())
            .bearer_auth(&self.api_key)
            .query(params);
        if let Some(body) = body {
            request = request.json(&body);
        }

        debug!(%method, path = url.path(), "records service request");
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

impl RecordsStore for AirtableStore {
    async fn fetch(&self, table: &str, query: &Query) -> Result<Vec<Record>, StoreError> {
        let url = self.table_url(table, None)?;
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut params = query.params();
            if let Some(token) = &offset {
                params.push(("offset".to_string(), token.clone()));
            }
            let page: ListResponse =
                serde_json::from_value(self.send(Method::GET, url.clone(), &params, None).await?)?;
            records.extend(page.records);
            offset = page.offset;
            if offset.is_none() {
                break;
            }
        }

        debug!(table, count = records.len(), "fetched records");
        Ok(records)
    }

    async fn fetch_by_id(&self, table: &str, id: &str) -> Result<Record, StoreError> {
        let url = self.table_url(table, Some(id))?;
        match self.send(Method::GET, url, &[], None).await {
            Ok(value) => Ok(serde_json::from_value(value)?),
            Err(StoreError::Status { status: 404, .. }) => Err(StoreError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            }),
            Err(err) => Err(err),
        }
    }

    async fn create(&self, table: &str, fields: Fields) -> Result<Record, StoreError> {
        let url = self.table_url(table, None)?;
        let value = self
            .send(Method::POST, url, &[], Some(json!({ "fields": fields })))
            .await?;
        let record: Record = serde_json::from_value(value)?;
        info!(table, id = %record.id, "created record");
        Ok(record)
    }

    async fn update(&self, table: &str, id: &str, fields: Fields) -> Result<Record, StoreError> {
        let url = self.table_url(table, Some(id))?;
        let value = self
            .send(Method::PATCH, url, &[], Some(json!({ "fields": fields })))
            .await?;
        info!(table, id, "updated record");
        Ok(serde_json::from_value(value)?)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError> {
        let url = self.table_url(table, Some(id))?;
        self.send(Method::DELETE, url, &[], None).await?;
        info!(table, id, "deleted record");
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<BTreeMap<String, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_table<T>(&self, table: &str, f: impl FnOnce(&mut Vec<Record>) -> T) -> T {
        let mut tables = self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(tables.entry(table.to_string()).or_default())
    }

    fn not_found(table: &str, id: &str) -> StoreError {
        StoreError::NotFound {
            table: table.to_string(),
            id: id.to_string(),
        }
    }
}

fn parse_equality(formula: &str) -> Option<(String, String)> {
    let rest = formula.trim().strip_prefix('{')?;
    let (field, value) = rest.split_once("} = '")?;
    let value = value.strip_suffix('\'')?;
    let value = value.replace("\\'", "'").replace("\\\\", "\\");
    Some((field.to_string(), value))
}

fn sort_key(record: &Record, field: &str) -> String {
    match record.fields.get(field) {
        Some(Value::String(value)) => value.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

impl RecordsStore for MemoryStore {
    async fn fetch(&self, table: &str, query: &Query) -> Result<Vec<Record>, StoreError> {
        let equality = match &query.filter_formula {
            Some(formula) => Some(
                parse_equality(formula)
                    .ok_or_else(|| StoreError::UnsupportedFilter(formula.clone()))?,
            ),
            None => None,
        };

        let mut records: Vec<Record> = self.with_table(table, |rows| {
            rows.iter()
                .filter(|record| match &equality {
                    Some((field, value)) => sort_key(record, field) == *value,
                    None => true,
                })
                .cloned()
                .collect()
        });

        for spec in query.sort.iter().rev() {
            records.sort_by(|a, b| {
                let ordering = sort_key(a, &spec.field).cmp(&sort_key(b, &spec.field));
                match spec.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }
        Ok(records)
    }

    async fn fetch_by_id(&self, table: &str, id: &str) -> Result<Record, StoreError> {
        self.with_table(table, |rows| rows.iter().find(|record| record.id == id).cloned())
            .ok_or_else(|| Self::not_found(table, id))
    }

    async fn create(&self, table: &str, fields: Fields) -> Result<Record, StoreError> {
        let record = Record {
            id: format!("rec{}", uuid::Uuid::new_v4().simple()),
            fields,
        };
        self.with_table(table, |rows| rows.push(record.clone()));
        Ok(record)
    }

    async fn update(&self, table: &str, id: &str, fields: Fields) -> Result<Record, StoreError> {
        self.with_table(table, |rows| {
            let record = rows.iter_mut().find(|record| record.id == id)?;
            record.fields.extend(fields);
            Some(record.clone())
        })
        .ok_or_else(|| Self::not_found(table, id))
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError> {
        let removed = self.with_table(table, |rows| {
            let before = rows.len();
            rows.retain(|record| record.id != id);
            before != rows.len()
        });
        if removed {
            Ok(())
        } else {
            Err(Self::not_found(table, id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn airtable(api_url: &str) -> AirtableStore {
        AirtableStore::new(&Config {
            api_key: "key".to_string(),
            base_id: "appBase".to_string(),
            fellows_table: "Fellows".to_string(),
            api_url: api_url.to_string(),
        })
    }

    #[test]
    fn query_params_follow_service_conventions() {
        let query = Query::field_equals("Email", "o'neil@example.com")
            .sorted("Month", SortDirection::Asc)
            .sorted("Date", SortDirection::Desc);
        let params = query.params();
        assert_eq!(
            params[0],
            (
                "filterByFormula".to_string(),
                "{Email} = 'o\\'neil@example.com'".to_string()
            )
        );
        assert_eq!(params[1], ("sort[0][field]".to_string(), "Month".to_string()));
        assert_eq!(params[2], ("sort[0][direction]".to_string(), "asc".to_string()));
        assert_eq!(params[4], ("sort[1][direction]".to_string(), "desc".to_string()));
    }

    #[test]
    fn table_urls_escape_table_names() {
        let store = airtable("https://api.airtable.com/v0/");
        let url = store.table_url("Status Reports", Some("rec1")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.airtable.com/v0/appBase/Status%20Reports/rec1"
        );
        let url = airtable("https://api.airtable.com/v0").table_url("Check-ins", None).unwrap();
        assert_eq!(url.as_str(), "https://api.airtable.com/v0/appBase/Check-ins");
    }

    #[test]
    fn list_response_decodes_pages() {
        let page: ListResponse = serde_json::from_value(json!({
            "records": [
                {"id": "rec1", "createdTime": "2026-01-01T00:00:00.000Z", "fields": {"Name": "Ada"}},
                {"id": "rec2"}
            ],
            "offset": "itrNext"
        }))
        .unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].str_field("Name").as_deref(), Some("Ada"));
        assert!(page.records[1].fields.is_empty());
        assert_eq!(page.offset.as_deref(), Some("itrNext"));
    }

    #[test]
    fn record_accessors_treat_blank_as_missing() {
        let record = Record {
            id: "rec1".to_string(),
            fields: fields(json!({
                "Name": "  ",
                "Submitted": true,
                "Fellow": ["recA", "recB"],
                "Cohort": 2025
            })),
        };
        assert_eq!(record.str_field("Name"), None);
        assert_eq!(record.str_field("Cohort").as_deref(), Some("2025"));
        assert!(record.bool_field("Submitted"));
        assert!(!record.bool_field("Missing"));
        assert_eq!(record.list_field("Fellow"), ["recA", "recB"]);
        assert!(record.list_field("Name").is_empty());
    }

    #[tokio::test]
    async fn memory_store_round_trips_records() {
        let store = MemoryStore::new();
        let created = store
            .create("Fellows", fields(json!({"Name": "Ada", "Status": "Active"})))
            .await
            .unwrap();
        assert!(created.id.starts_with("rec"));

        let updated = store
            .update("Fellows", &created.id, fields(json!({"Status": "Flagged"})))
            .await
            .unwrap();
        assert_eq!(updated.str_field("Name").as_deref(), Some("Ada"));
        assert_eq!(updated.str_field("Status").as_deref(), Some("Flagged"));

        store.delete("Fellows", &created.id).await.unwrap();
        assert!(matches!(
            store.fetch_by_id("Fellows", &created.id).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete("Fellows", &created.id).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn memory_store_filters_and_sorts() {
        let store = MemoryStore::new();
        for (name, email) in [("Bo", "bo@x.org"), ("Al", "al@x.org"), ("Cy", "o'c@x.org")] {
            store
                .create("Fellows", fields(json!({"Name": name, "Email": email})))
                .await
                .unwrap();
        }

        let sorted = store
            .fetch("Fellows", &Query::all().sorted("Name", SortDirection::Desc))
            .await
            .unwrap();
        let names: Vec<String> = sorted.iter().filter_map(|r| r.str_field("Name")).collect();
        assert_eq!(names, ["Cy", "Bo", "Al"]);

        let found = store
            .fetch("Fellows", &Query::field_equals("Email", "o'c@x.org"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].str_field("Name").as_deref(), Some("Cy"));

        let unsupported = Query {
            filter_formula: Some("AND({A}, {B})".to_string()),
            sort: Vec::new(),
        };
        assert!(matches!(
            store.fetch("Fellows", &unsupported).await,
            Err(StoreError::UnsupportedFilter(_))
        ));
    }

    #[tokio::test]
    async fn fetch_linked_matches_link_ids() {
        let store = MemoryStore::new();
        store
            .create("Check-ins", fields(json!({"Fellow": ["recA"], "Notes": "one"})))
            .await
            .unwrap();
        store
            .create("Check-ins", fields(json!({"Fellow": ["recB"], "Notes": "two"})))
            .await
            .unwrap();
        store
            .create("Check-ins", fields(json!({"Fellow": ["recB", "recA"], "Notes": "both"})))
            .await
            .unwrap();

        let linked = store
            .fetch_linked("Check-ins", "Fellow", "recA", &Query::all())
            .await
            .unwrap();
        let notes: Vec<String> = linked.iter().filter_map(|r| r.str_field("Notes")).collect();
        assert_eq!(notes, ["one", "both"]);
    }

    fn json_response(mock: mockito::Mock, status: usize, body: Value) -> mockito::Mock {
        mock.with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
    }

    #[tokio::test]
    async fn airtable_fetch_follows_offset_pages() {
        let mut server = mockito::Server::new_async().await;
        let first = json_response(
            server
                .mock("GET", "/v0/appBase/Fellows")
                .match_header("authorization", "Bearer key")
                .match_query(mockito::Matcher::Regex("=asc$".to_string())),
            200,
            json!({
                "records": [{"id": "rec1", "fields": {"Name": "Ada"}}],
                "offset": "itr2"
            }),
        )
        .expect(1)
        .create_async()
        .await;
        let second = json_response(
            server.mock("GET", "/v0/appBase/Fellows").match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("offset".to_string(), "itr2".to_string()),
                mockito::Matcher::UrlEncoded("sort[0][field]".to_string(), "Name".to_string()),
            ])),
            200,
            json!({
                "records": [
                    {"id": "rec2", "fields": {"Name": "Bo"}},
                    {"id": "rec3", "fields": {"Name": "Cy"}}
                ]
            }),
        )
        .expect(1)
        .create_async()
        .await;

        let store = airtable(&format!("{}/v0", server.url()));
        let records = store
            .fetch("Fellows", &Query::all().sorted("Name", SortDirection::Asc))
            .await
            .unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["rec1", "rec2", "rec3"]);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn airtable_rejections_keep_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        let _rejected = json_response(
            server.mock("POST", "/v0/appBase/Fellows"),
            422,
            json!({"error": {"type": "INVALID_VALUE_FOR_COLUMN"}}),
        )
        .create_async()
        .await;

        let store = airtable(&format!("{}/v0", server.url()));
        match store.create("Fellows", fields(json!({"Name": 7}))).await {
            Err(StoreError::Status { status, body }) => {
                assert_eq!(status, 422);
                assert!(body.contains("INVALID_VALUE_FOR_COLUMN"));
            }
            other => panic!("expected a status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn airtable_missing_record_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _missing = json_response(
            server.mock("GET", "/v0/appBase/Fellows/recMissing"),
            404,
            json!({"error": "NOT_FOUND"}),
        )
        .create_async()
        .await;
        let _delete = json_response(
            server.mock("DELETE", "/v0/appBase/Fellows/recMissing"),
            404,
            json!({"error": "NOT_FOUND"}),
        )
        .create_async()
        .await;

        let store = airtable(&format!("{}/v0", server.url()));
        match store.fetch_by_id("Fellows", "recMissing").await {
            Err(StoreError::NotFound { table, id }) => {
                assert_eq!(table, "Fellows");
                assert_eq!(id, "recMissing");
            }
            other => panic!("expected not found, got {other:?}"),
        }
        assert!(matches!(
            store.delete("Fellows", "recMissing").await,
            Err(StoreError::Status { status: 404, .. })
        ));
    }
}
