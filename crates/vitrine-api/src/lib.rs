// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::time::Duration;
use url::Url;
use vitrine_app::{Entity, FacetVocabulary, ListingRequest, Page, PartialUpdate, TableBackend};

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    timeout: Duration,
    http: HttpClient,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("api.base_url must not be empty");
        }
        let parsed = Url::parse(&base_url)
            .with_context(|| format!("api.base_url {base_url:?} is not a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "api.base_url must use http or https, got {}://",
                parsed.scheme()
            );
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Backend for one resource, e.g. `artworks`.
    pub fn resource<T: Entity>(&self, name: &str) -> Result<ResourceClient<T>> {
        let name = name.trim().trim_matches('/');
        if name.is_empty() || name.contains('/') {
            bail!("resource name {name:?} must be a single path segment");
        }
        Ok(ResourceClient {
            client: self.clone(),
            resource: name.to_owned(),
            _entity: PhantomData,
        })
    }

    fn endpoint(&self, resource: &str, action: &str) -> String {
        format!("{}/{resource}/{action}", self.base_url)
    }

    fn send(&self, request: RequestBuilder, action: &str) -> Result<String> {
        let response = request
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;
        let status = response.status();
        let body = response
            .text()
            .with_context(|| format!("read {action} response"))?;
        if !status.is_success() {
            return Err(clean_error_response(status, &body));
        }
        tracing::debug!(action, status = status.as_u16(), bytes = body.len(), "api call");
        Ok(body)
    }

    fn post<B: Serialize + ?Sized>(&self, resource: &str, action: &str, body: &B) -> Result<String> {
        let request = self.http.post(self.endpoint(resource, action)).json(body);
        self.send(request, action)
    }

    fn get(&self, resource: &str, action: &str) -> Result<String> {
        let request = self.http.get(self.endpoint(resource, action));
        self.send(request, action)
    }
}

/// [`TableBackend`] over the HTTP endpoints of one resource.
#[derive(Debug, Clone)]
pub struct ResourceClient<T> {
    client: ApiClient,
    resource: String,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> ResourceClient<T> {
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn list(&self, request: &ListingRequest) -> Result<Page<T>> {
        let body = self.client.post(&self.resource, "list", request)?;
        decode(&body, "listing")
    }

    pub fn facet_vocabulary(&self) -> Result<FacetVocabulary> {
        let body = self.client.get(&self.resource, "facets")?;
        decode(&body, "facet vocabulary")
    }

    /// Sends `{id, <path>: value}`; an empty reply body means the server
    /// accepted the write without echoing the row.
    pub fn update(&self, update: &PartialUpdate) -> Result<Option<T>> {
        let payload = update.body()?;
        let body = self.client.post(&self.resource, "update", &payload)?;
        if body.trim().is_empty() || body.trim() == "null" {
            return Ok(None);
        }
        decode(&body, "updated row").map(Some)
    }

    pub fn bulk_delete(&self, id_list: &[i64]) -> Result<()> {
        self.client
            .post(&self.resource, "bulk-delete", &BulkDeleteBody { id_list })?;
        Ok(())
    }

    pub fn bulk_patch(&self, id_list: &[i64], properties: &Map<String, Value>) -> Result<()> {
        self.client.post(
            &self.resource,
            "bulk-patch",
            &BulkPatchBody {
                id_list,
                properties,
            },
        )?;
        Ok(())
    }
}

impl<T: Entity> TableBackend<T> for ResourceClient<T> {
    fn list(&mut self, request: &ListingRequest) -> Result<Page<T>> {
        ResourceClient::list(self, request)
    }

    fn facet_vocabulary(&mut self) -> Result<FacetVocabulary> {
        ResourceClient::facet_vocabulary(self)
    }

    fn update(&mut self, update: &PartialUpdate) -> Result<Option<T>> {
        ResourceClient::update(self, update)
    }

    fn bulk_delete(&mut self, id_list: &[i64]) -> Result<()> {
        ResourceClient::bulk_delete(self, id_list)
    }

    fn bulk_patch(&mut self, id_list: &[i64], properties: &Map<String, Value>) -> Result<()> {
        ResourceClient::bulk_patch(self, id_list, properties)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BulkDeleteBody<'a> {
    id_list: &'a [i64],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BulkPatchBody<'a> {
    id_list: &'a [i64],
    properties: &'a Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct NestedErrorEnvelope {
    error: Option<NestedError>,
}

#[derive(Debug, Deserialize)]
struct NestedError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct FlatErrorEnvelope {
    message: Option<String>,
}

fn decode<D: DeserializeOwned>(body: &str, what: &str) -> Result<D> {
    serde_json::from_str(body).with_context(|| format!("decode {what}"))
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- check [api].base_url in the config ({})",
        base_url,
        error
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<NestedErrorEnvelope>(body)
        && let Some(error) = parsed.error
        && !error.message.is_empty()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), error.message);
    }

    if let Ok(parsed) = serde_json::from_str::<FlatErrorEnvelope>(body)
        && let Some(message) = parsed.message
        && !message.is_empty()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), message);
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{') {
        return anyhow!("server error ({}): {}", status.as_u16(), trimmed);
    }

    anyhow!("server returned {}", status.as_u16())
}
