//! Strava upload client.
//!
//! Uploads a run's GPX document via the v3 uploads endpoint, then polls the
//! upload until Strava finishes processing and hands back an activity id.
//! Authentication is a pre-provisioned access token from the settings file.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::multipart;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::data::Run;

const API_BASE: &str = "https://www.strava.com/api/v3";
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const POLL_ATTEMPTS: u32 = 30;

#[derive(Debug, Deserialize)]
struct UploadStatus {
    id: i64,
    error: Option<String>,
    activity_id: Option<i64>,
}

/// Client for the Strava v3 API.
pub struct StravaClient {
    http: Client,
    base_url: String,
    access_token: String,
}

impl StravaClient {
    pub fn new(access_token: String) -> Result<Self> {
        Self::with_base_url(access_token, API_BASE.to_string())
    }

    fn with_base_url(access_token: String, base_url: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(StravaClient {
            http,
            base_url,
            access_token,
        })
    }

    /// Upload a run and return the resulting Strava activity id.
    ///
    /// Blocks while Strava processes the upload, up to about 30 seconds.
    pub fn upload_run(&self, run: &Run, gpx: String) -> Result<String> {
        let name = "Treadmill Walk".to_string();
        let description = format!(
            "{:.2} km in {} on the walking pad",
            run.total_km(),
            run.duration_string()
        );

        let file_part = multipart::Part::text(gpx)
            .file_name("walk.gpx")
            .mime_str("application/gpx+xml")
            .context("Failed to build GPX upload part")?;
        let form = multipart::Form::new()
            .text("data_type", "gpx")
            .text("trainer", "1")
            .text("name", name)
            .text("description", description)
            .part("file", file_part);

        tracing::info!(run_id = ?run.id, "uploading run to Strava");
        let response = self
            .http
            .post(format!("{}/uploads", self.base_url))
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .context("Upload request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            bail!("Strava rejected the upload ({status}): {body}");
        }

        let status: UploadStatus = response
            .json()
            .context("Failed to parse upload response")?;
        self.wait_for_activity(status)
    }

    /// Poll the upload until Strava reports an activity id or an error.
    fn wait_for_activity(&self, mut status: UploadStatus) -> Result<String> {
        for attempt in 0..POLL_ATTEMPTS {
            if let Some(error) = status.error.filter(|e| !e.is_empty()) {
                bail!("Strava failed to process the upload: {error}");
            }
            if let Some(activity_id) = status.activity_id {
                tracing::info!(activity_id, "upload processed");
                return Ok(activity_id.to_string());
            }

            tracing::debug!(upload_id = status.id, attempt, "upload still processing");
            std::thread::sleep(POLL_INTERVAL);

            let response = self
                .http
                .get(format!("{}/uploads/{}", self.base_url, status.id))
                .bearer_auth(&self.access_token)
                .send()
                .context("Upload status request failed")?;
            if !response.status().is_success() {
                bail!("Strava upload status check failed: {}", response.status());
            }
            status = response
                .json()
                .context("Failed to parse upload status response")?;
        }
        bail!("Strava did not finish processing the upload in time")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_status_parsing() {
        let pending: UploadStatus = serde_json::from_str(
            r#"{"id": 123, "external_id": "walk.gpx", "error": null, "status": "Your activity is still being processed.", "activity_id": null}"#,
        )
        .unwrap();
        assert_eq!(pending.id, 123);
        assert!(pending.activity_id.is_none());
        assert!(pending.error.is_none());

        let done: UploadStatus = serde_json::from_str(
            r#"{"id": 123, "error": null, "activity_id": 987654}"#,
        )
        .unwrap();
        assert_eq!(done.activity_id, Some(987654));
    }

    #[test]
    fn test_error_status_short_circuits() {
        let client = StravaClient::with_base_url(
            "token".to_string(),
            "http://127.0.0.1:0".to_string(),
        )
        .unwrap();
        let status = UploadStatus {
            id: 1,
            error: Some("duplicate of activity 42".to_string()),
            activity_id: None,
        };
        let err = client.wait_for_activity(status).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_ready_status_returns_activity_id() {
        let client = StravaClient::with_base_url(
            "token".to_string(),
            "http://127.0.0.1:0".to_string(),
        )
        .unwrap();
        let status = UploadStatus {
            id: 1,
            error: None,
            activity_id: Some(42),
        };
        assert_eq!(client.wait_for_activity(status).unwrap(), "42");
    }
}
