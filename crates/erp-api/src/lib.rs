// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use erp_app::{
    BulkUpdateRequest, ChangeEvent, CompanyId, CustomColumn, Employee, EmployeeId, ItemId,
    ListQuery, Lookups, ModalAction, Page, Part, PartDetailsView, PartEditView, PartFormInput,
    PartSummary, Permissions, UpdateEndpoint, UpdateResponse, UserId,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Blocking client for the hosted ERP backend.
#[derive(Debug, Clone)]
pub struct Client {
    base: Url,
    service_key: String,
    timeout: Duration,
    http: HttpClient,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusUpdate<'a> {
    company_id: &'a str,
    employee_status_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PartUpsert<'a> {
    #[serde(flatten)]
    input: &'a PartFormInput,
    updated_by: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl Client {
    pub fn new(base_url: &str, service_key: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("backend.url must not be empty");
        }
        let base = Url::parse(trimmed)
            .with_context(|| format!("backend.url {trimmed:?} is not a valid URL"))?;
        if !matches!(base.scheme(), "http" | "https") {
            bail!(
                "backend.url must use http or https, got {}:// -- fix [backend] url",
                base.scheme()
            );
        }
        if base.cannot_be_a_base() {
            bail!("backend.url {trimmed:?} cannot carry a path");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base,
            service_key: service_key.to_owned(),
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn ping(&self) -> Result<()> {
        let response = self.send(self.http.get(self.endpoint(&["health"])?))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(())
    }

    pub fn list_parts(&self, query: &ListQuery) -> Result<Page<Part>> {
        let mut url = self.endpoint(&["items"])?;
        url.set_query(Some(&query.to_query_string()));
        self.get_json(url, "decode parts page")
    }

    pub fn list_employees(&self, query: &ListQuery) -> Result<Page<Employee>> {
        let mut url = self.endpoint(&["employees"])?;
        url.set_query(Some(&query.to_query_string()));
        self.get_json(url, "decode employees page")
    }

    pub fn lookups(&self) -> Result<Lookups> {
        self.get_json(self.endpoint(&["lookups"])?, "decode lookups")
    }

    pub fn custom_columns(&self, table: &str) -> Result<Vec<CustomColumn>> {
        self.get_json(
            self.endpoint(&["custom-columns", table])?,
            "decode custom columns",
        )
    }

    pub fn get_part(&self, item_id: &ItemId) -> Result<Part> {
        self.get_json(self.endpoint(&["items", item_id.as_str()])?, "decode part")
    }

    pub fn part_summary(&self, item_id: &ItemId) -> Result<PartSummary> {
        self.get_json(
            self.endpoint(&["items", item_id.as_str(), "summary"])?,
            "decode part summary",
        )
    }

    /// The part merged with its barcode serial and upload file names.
    pub fn part_edit_view(&self, item_id: &ItemId) -> Result<PartEditView> {
        self.get_json(
            self.endpoint(&["items", item_id.as_str(), "edit"])?,
            "decode part edit view",
        )
    }

    pub fn part_details_view(&self, item_id: &ItemId) -> Result<PartDetailsView> {
        self.get_json(
            self.endpoint(&["items", item_id.as_str(), "details"])?,
            "decode part details",
        )
    }

    pub fn upsert_part(
        &self,
        item_id: &ItemId,
        input: &PartFormInput,
        updated_by: &UserId,
    ) -> Result<Part> {
        let body = PartUpsert {
            input,
            updated_by: updated_by.as_str(),
        };
        let response = self.send(
            self.http
                .put(self.endpoint(&["items", item_id.as_str()])?)
                .json(&body),
        )?;
        decode(response, "decode updated part")
    }

    /// Submits a batched field update. A rejection carrying an error payload
    /// is returned as `Ok`, not `Err`.
    pub fn bulk_update_items(&self, request: &BulkUpdateRequest) -> Result<UpdateResponse> {
        let response = self.send(
            self.http
                .post(self.endpoint(&["items", "update"])?)
                .json(request),
        )?;
        update_response(response)
    }

    pub fn delete_item(&self, item_id: &ItemId) -> Result<()> {
        let response = self.send(self.http.delete(self.endpoint(&["items", item_id.as_str()])?))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            bail!("item {item_id} not found or already deleted");
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(())
    }

    pub fn update_employee_status(
        &self,
        employee_id: &EmployeeId,
        company_id: &CompanyId,
        status: &str,
    ) -> Result<()> {
        let body = StatusUpdate {
            company_id: company_id.as_str(),
            employee_status_id: status,
        };
        let response = self.send(
            self.http
                .patch(self.endpoint(&["employees", employee_id.as_str(), "status"])?)
                .json(&body),
        )?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(())
    }

    /// Capabilities of the caller the service key acts for.
    pub fn session_permissions(&self) -> Result<Permissions> {
        self.get_json(self.endpoint(&["session", "permissions"])?, "decode session permissions")
    }

    pub fn user_permissions(&self, employee_id: &EmployeeId) -> Result<Permissions> {
        self.get_json(
            self.endpoint(&["employees", employee_id.as_str(), "permissions"])?,
            "decode user permissions",
        )
    }

    pub fn modal_action(&self, action: &ModalAction) -> Result<UpdateResponse> {
        let response = self.send(
            self.http
                .post(self.endpoint(&["employees", "actions"])?)
                .json(action),
        )?;
        update_response(response)
    }

    pub fn changes_since(&self, revision: u64) -> Result<Vec<ChangeEvent>> {
        let mut url = self.endpoint(&["changes"])?;
        url.query_pairs_mut()
            .append_pair("since", &revision.to_string());
        self.get_json(url, "decode change events")
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("backend.url {} cannot carry a path", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request = if self.service_key.is_empty() {
            request
        } else {
            request.bearer_auth(&self.service_key)
        };
        let response = request
            .send()
            .map_err(|error| connection_error(self.base_url(), error))?;
        debug!(url = %response.url(), status = response.status().as_u16(), "backend call");
        Ok(response)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url, what: &'static str) -> Result<T> {
        let response = self.send(self.http.get(url))?;
        decode(response, what)
    }
}

impl UpdateEndpoint for Client {
    fn bulk_update(&self, request: &BulkUpdateRequest) -> Result<UpdateResponse> {
        self.bulk_update_items(request)
    }
}

fn decode<T: DeserializeOwned>(response: Response, what: &'static str) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(clean_error_response(status, &body));
    }
    response.json().context(what)
}

fn update_response(response: Response) -> Result<UpdateResponse> {
    let status = response.status();
    let body = response.text().context("read update response")?;
    if status.is_success() {
        if body.trim().is_empty() {
            return Ok(UpdateResponse::ok());
        }
        return serde_json::from_str(&body).context("decode update response");
    }
    if status.is_client_error()
        && let Some(message) = error_message(&body)
    {
        return Ok(UpdateResponse::failed(message));
    }
    Err(clean_error_response(status, &body))
}

fn error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok()?;
    parsed
        .error
        .map(|error| error.message)
        .or(parsed.message)
        .filter(|message| !message.is_empty())
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach ERP backend at {} -- check [backend] url or set backend.mode = \"local\" ({})",
        base_url,
        error
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return anyhow!(
            "backend rejected credentials ({}) -- check ERP_SERVICE_ROLE_KEY",
            status.as_u16()
        );
    }

    if let Some(message) = error_message(body) {
        return anyhow!("backend error ({}): {}", status.as_u16(), message);
    }

    if body.len() < 100 && !body.contains('{') && !body.trim().is_empty() {
        return anyhow!("backend error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("backend returned {}", status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::{Client, clean_error_response, error_message};
    use reqwest::StatusCode;
    use std::time::Duration;

    #[test]
    fn rejects_unusable_base_urls() {
        assert!(Client::new("", "key", Duration::from_secs(1)).is_err());
        assert!(Client::new("ftp://example.com", "key", Duration::from_secs(1)).is_err());
        assert!(Client::new("not a url", "key", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn endpoints_escape_segments_and_keep_base_path() -> anyhow::Result<()> {
        let client = Client::new("http://example.com/api/v1/", "", Duration::from_secs(1))?;
        assert_eq!(client.base_url(), "http://example.com/api/v1");
        let url = client.endpoint(&["items", "a/b c"])?;
        assert_eq!(url.as_str(), "http://example.com/api/v1/items/a%2Fb%20c");
        Ok(())
    }

    #[test]
    fn error_messages_prefer_envelope() {
        assert_eq!(
            error_message(r#"{"error":{"message":"conflict"}}"#).as_deref(),
            Some("conflict")
        );
        assert_eq!(error_message(r#"{"message":"nope"}"#).as_deref(), Some("nope"));
        assert_eq!(error_message(r#"{"error":{"message":""}}"#), None);

        let err = clean_error_response(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(err.to_string(), "backend error (502): upstream down");
        let err = clean_error_response(StatusCode::UNAUTHORIZED, "");
        assert!(err.to_string().contains("ERP_SERVICE_ROLE_KEY"));
    }
}
