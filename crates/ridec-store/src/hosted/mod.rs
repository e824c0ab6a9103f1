//! Hosted table backend
//!
//! Thin REST client for a PostgREST-style backend-as-a-service. Every CRUD
//! call maps to one or a few HTTP requests; there is no caching, batching or
//! retry. Authentication uses the `apikey` header plus a bearer token.

pub mod chain;
pub mod rows;

use crate::backend::{BackendStatus, RecordBackend};
use crate::error::{Result, StoreError};
use crate::session::SessionUser;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, RequestBuilder, Response};
use ridec_config::BackendSettings;
use ridec_core::{ProcessRecord, RecordKind};
use rows::{AreaRow, OccurrenceRow, TemplateRow, UserRow};
use serde::Deserialize;
use serde::de::DeserializeOwned;

const TEMPLATE_TABLE: &str = "process_template";
const STAGE_TABLE: &str = "process_template_stage";
const OCCURRENCE_TABLE: &str = "process_occurrence";
const AREA_TABLE: &str = "area";
const USER_TABLE: &str = "user";

const TEMPLATE_SELECT: &str = "*,area(*),process_template_stage(*)";
const OCCURRENCE_SELECT: &str = "*,process_template(*,area(*),process_template_stage(*))";
const USER_SELECT: &str = "*,company(*),user_type(*)";

/// Configuration for the hosted backend
#[derive(Debug, Clone)]
pub struct HostedConfig {
    pub url: String,
    pub api_key: String,
    pub company_id: Option<String>,
    pub user_id: Option<String>,
    pub soft_delete: bool,
}

impl HostedConfig {
    pub fn from_settings(settings: &BackendSettings) -> Result<Self> {
        let url = settings
            .url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| StoreError::NotConfigured("backend.url is not set".to_string()))?;
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| StoreError::NotConfigured("backend.api_key is not set".to_string()))?;
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            api_key,
            company_id: settings.company_id.clone(),
            user_id: settings.user_id.clone(),
            soft_delete: settings.soft_delete,
        })
    }
}

/// PostgREST error body
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

/// Convert fetched rows, skipping the ones that cannot become a record
fn readable<R>(
    rows: Vec<R>,
    id_of: impl Fn(&R) -> String,
    convert: impl Fn(R) -> Result<ProcessRecord>,
) -> Vec<ProcessRecord> {
    rows.into_iter()
        .filter_map(|row| {
            let id = id_of(&row);
            convert(row)
                .map_err(|e| tracing::warn!("Skipping unreadable row {}: {}", id, e))
                .ok()
        })
        .collect()
}

/// Hosted backend client
pub struct HostedBackend {
    client: reqwest::Client,
    config: HostedConfig,
}

impl HostedBackend {
    pub fn new(config: HostedConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &HostedConfig {
        &self.config
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.config.url, table);
        self.client
            .request(method, &url)
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorBody>(&text) {
            Ok(body) => [body.message, body.details, body.hint]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" / "),
            Err(_) => text,
        };
        let message = if message.is_empty() {
            status.canonical_reason().unwrap_or("Unknown error").to_string()
        } else {
            message
        };
        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<Vec<T>> {
        let response = Self::check(builder.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<()> {
        Self::check(builder.send().await?).await?;
        Ok(())
    }

    fn company_filter(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.company_id {
            Some(company) => builder.query(&[("company_id", format!("eq.{}", company))]),
            None => builder,
        }
    }

    #[tracing::instrument(skip(self))]
    async fn list_templates(&self) -> Result<Vec<ProcessRecord>> {
        let builder = self
            .request(Method::GET, TEMPLATE_TABLE)
            .query(&[("select", TEMPLATE_SELECT), ("is_active", "eq.true")]);
        let rows: Vec<TemplateRow> = self.fetch(self.company_filter(builder)).await?;
        tracing::debug!("Fetched {} templates", rows.len());
        Ok(readable(rows, |row: &TemplateRow| row.id.clone(), TemplateRow::into_record))
    }

    #[tracing::instrument(skip(self))]
    async fn list_occurrences(&self) -> Result<Vec<ProcessRecord>> {
        let builder = self
            .request(Method::GET, OCCURRENCE_TABLE)
            .query(&[("select", OCCURRENCE_SELECT)]);
        let rows: Vec<OccurrenceRow> = self.fetch(self.company_filter(builder)).await?;
        tracing::debug!("Fetched {} occurrences", rows.len());
        Ok(readable(rows, |row: &OccurrenceRow| row.id.clone(), OccurrenceRow::into_record))
    }

    /// Resolve an area name to its id, creating the area on demand
    async fn resolve_area(&self, name: &str) -> Result<Option<String>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        let filter = format!("eq.{}", name);
        let builder = self
            .request(Method::GET, AREA_TABLE)
            .query(&[("select", "*"), ("name", filter.as_str())]);
        let existing: Vec<AreaRow> = self.fetch(self.company_filter(builder)).await?;
        if let Some(area) = existing.into_iter().next() {
            return Ok(Some(area.id));
        }

        let area = AreaRow {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            company_id: self.config.company_id.clone(),
        };
        let created: Vec<AreaRow> = self
            .fetch(
                self.request(Method::POST, AREA_TABLE)
                    .header("Prefer", "return=representation")
                    .json(&area),
            )
            .await?;
        tracing::info!(area = %name, "Area created");
        Ok(created.into_iter().next().map(|a| a.id).or(Some(area.id)))
    }

    async fn template_row(&self, record: &ProcessRecord) -> Result<TemplateRow> {
        let mut row = TemplateRow::from_record(record)?;
        row.area_id = self.resolve_area(&record.area).await?;
        row.company_id = self.config.company_id.clone();
        Ok(row)
    }

    async fn replace_stages(&self, record: &ProcessRecord) -> Result<()> {
        self.send(
            self.request(Method::DELETE, STAGE_TABLE)
                .query(&[("process_template_id", format!("eq.{}", record.id))]),
        )
        .await?;
        let stages = chain::build_stage_rows(record);
        if !stages.is_empty() {
            self.send(self.request(Method::POST, STAGE_TABLE).json(&stages))
                .await?;
        }
        Ok(())
    }

    fn occurrence_row(&self, record: &ProcessRecord) -> Result<OccurrenceRow> {
        let mut row = OccurrenceRow::from_record(record)?;
        row.company_id = self.config.company_id.clone();
        row.user_id = self.config.user_id.clone();
        Ok(row)
    }
}

#[async_trait]
impl RecordBackend for HostedBackend {
    fn name(&self) -> &str {
        "hosted"
    }

    async fn status(&self) -> Result<BackendStatus> {
        let builder = self
            .request(Method::GET, TEMPLATE_TABLE)
            .query(&[("select", "id"), ("limit", "1")]);
        match self.fetch::<serde_json::Value>(builder).await {
            Ok(_) => Ok(BackendStatus::ok(self.name(), self.config.url.clone())),
            Err(e) => Ok(BackendStatus::failed(self.name(), e.to_string())),
        }
    }

    async fn list_records(&self) -> Result<Vec<ProcessRecord>> {
        let mut records = self.list_templates().await?;
        records.extend(self.list_occurrences().await?);
        Ok(records)
    }

    async fn get_record(&self, id: &str) -> Result<Option<ProcessRecord>> {
        let filter = format!("eq.{}", id);
        let templates: Vec<TemplateRow> = self
            .fetch(
                self.request(Method::GET, TEMPLATE_TABLE)
                    .query(&[("select", TEMPLATE_SELECT), ("id", filter.as_str())]),
            )
            .await?;
        if let Some(row) = templates.into_iter().find(|r| r.is_active) {
            return row.into_record().map(Some);
        }
        let occurrences: Vec<OccurrenceRow> = self
            .fetch(
                self.request(Method::GET, OCCURRENCE_TABLE)
                    .query(&[("select", OCCURRENCE_SELECT), ("id", filter.as_str())]),
            )
            .await?;
        occurrences
            .into_iter()
            .next()
            .map(OccurrenceRow::into_record)
            .transpose()
    }

    #[tracing::instrument(skip(self, record), fields(id = %record.id))]
    async fn create_record(&self, record: &ProcessRecord) -> Result<()> {
        if record.is_occurrence {
            let row = self.occurrence_row(record)?;
            return self
                .send(self.request(Method::POST, OCCURRENCE_TABLE).json(&row))
                .await;
        }
        let mut row = self.template_row(record).await?;
        row.created_by = self.config.user_id.clone();
        self.send(self.request(Method::POST, TEMPLATE_TABLE).json(&row))
            .await?;
        self.replace_stages(record).await
    }

    #[tracing::instrument(skip(self, record), fields(id = %record.id))]
    async fn update_record(&self, record: &ProcessRecord) -> Result<()> {
        let filter = [("id", format!("eq.{}", record.id))];
        if record.is_occurrence {
            let mut row = self.occurrence_row(record)?;
            row.updated_at = Some(record.updated_at.unwrap_or_else(Utc::now));
            return self
                .send(
                    self.request(Method::PATCH, OCCURRENCE_TABLE)
                        .query(&filter)
                        .json(&row),
                )
                .await;
        }
        let mut row = self.template_row(record).await?;
        row.updated_at = Some(record.updated_at.unwrap_or_else(Utc::now));
        row.updated_by = self.config.user_id.clone();
        self.send(
            self.request(Method::PATCH, TEMPLATE_TABLE)
                .query(&filter)
                .json(&row),
        )
        .await?;
        self.replace_stages(record).await
    }

    #[tracing::instrument(skip(self))]
    async fn delete_record(&self, id: &str, kind: RecordKind) -> Result<()> {
        let filter = [("id", format!("eq.{}", id))];
        match kind {
            RecordKind::Occurrence => {
                self.send(self.request(Method::DELETE, OCCURRENCE_TABLE).query(&filter))
                    .await
            }
            RecordKind::Template if self.config.soft_delete => {
                let body = serde_json::json!({
                    "is_active": false,
                    "deleted_at": Utc::now(),
                    "deleted_by": self.config.user_id,
                });
                self.send(
                    self.request(Method::PATCH, TEMPLATE_TABLE)
                        .query(&filter)
                        .json(&body),
                )
                .await
            }
            RecordKind::Template => {
                self.send(
                    self.request(Method::DELETE, STAGE_TABLE)
                        .query(&[("process_template_id", format!("eq.{}", id))]),
                )
                .await?;
                self.send(self.request(Method::DELETE, TEMPLATE_TABLE).query(&filter))
                    .await
            }
        }
    }

    async fn lookup_user(&self, email: &str, _name: Option<&str>) -> Result<SessionUser> {
        let builder = self.request(Method::GET, USER_TABLE).query(&[
            ("select", USER_SELECT.to_string()),
            ("email", format!("eq.{}", email.trim())),
            ("limit", "1".to_string()),
        ]);
        let users: Vec<UserRow> = self.fetch(builder).await?;
        let user = users
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::AuthenticationFailed(format!("unknown user '{}'", email)))?;
        if !user.is_active {
            return Err(StoreError::AuthenticationFailed(format!(
                "user '{}' is inactive",
                email
            )));
        }
        Ok(SessionUser {
            id: Some(user.id),
            name: user.name,
            email: user.email,
            company: user.company.map(|c| c.name),
            role: user.user_type.map(|t| t.name),
        })
    }
}
