use anyhow::{Context, Result};
use handsight_contracts::config::ClientConfig;
use handsight_contracts::results::{parse_result, AnalysisResult};
use handsight_contracts::uploads::SelectedFile;
use reqwest::blocking::multipart::{Form as MultipartForm, Part as MultipartPart};
use reqwest::blocking::Client as HttpClient;
use serde_json::Value;

use crate::errors::{truncate_text, RequestError, RequestErrorKind};

pub const FILE_FIELD: &str = "file";

/// One attempt at analyzing a file. Implementations block until the
/// service answers or the transport gives up; they never retry.
pub trait AnalysisTransport: Send + Sync {
    fn name(&self) -> &str;
    fn analyze(&self, file: &SelectedFile) -> Result<AnalysisResult, RequestError>;
}

/// Multipart `POST {base}/analyze` over reqwest.
pub struct HttpTransport {
    http: HttpClient,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        // reqwest's blocking client defaults to a 30s timeout; only apply
        // one when configured.
        let http = HttpClient::builder()
            .timeout(config.request_timeout())
            .build()
            .context("failed to build analysis HTTP client")?;
        Ok(Self {
            http,
            endpoint: config.endpoint(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl AnalysisTransport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    fn analyze(&self, file: &SelectedFile) -> Result<AnalysisResult, RequestError> {
        let part = MultipartPart::bytes(file.bytes().to_vec())
            .file_name(file.upload_name())
            .mime_str(file.mime_type())
            .map_err(|err| {
                RequestError::new(
                    RequestErrorKind::ClientError,
                    None,
                    format!("invalid mime '{}' for upload: {err}", file.mime_type()),
                )
            })?;
        let form = MultipartForm::new().part(FILE_FIELD, part);

        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .map_err(|err| {
                RequestError::network(format!(
                    "analysis request failed ({}): {err}",
                    self.endpoint
                ))
            })?;
        let status = response.status();
        let body = response.text().map_err(|err| {
            RequestError::network(format!("analysis response body read failed: {err}"))
        })?;
        if !status.is_success() {
            return Err(RequestError::from_status(status.as_u16(), &body));
        }

        let payload: Value = serde_json::from_str(&body).map_err(|err| {
            RequestError::decode(format!(
                "analysis service returned invalid JSON ({err}): {}",
                truncate_text(&body, 256)
            ))
        })?;
        parse_result(&payload).map_err(RequestError::from)
    }
}
