use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::error::RecorderError;
use crate::normalize::TimeSeriesPoint;
use crate::settings::InfluxDbSettings;

/// Destination for normalized points.
///
/// Writes are not transactional: points written before a failure stay written.
#[async_trait(?Send)]
pub trait MetricsSink {
    async fn write_point(&self, point: &TimeSeriesPoint) -> Result<(), RecorderError>;
}

/// InfluxDB 1.x HTTP write endpoint, second precision.
pub struct InfluxDbSink {
    http_client: Client,
    write_url: String,
    database: String,
    credentials: Option<(String, String)>,
}

impl InfluxDbSink {
    pub fn new(settings: &InfluxDbSettings, timeout: Duration) -> Result<Self, RecorderError> {
        let http_client = Client::builder().timeout(timeout).build().map_err(|e| {
            RecorderError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        let credentials = match (&settings.username, &settings.password) {
            (Some(username), password) => {
                Some((username.clone(), password.clone().unwrap_or_default()))
            }
            _ => None,
        };

        Ok(Self {
            http_client,
            write_url: format!("{}/write", settings.url.trim_end_matches('/')),
            database: settings.database.clone(),
            credentials,
        })
    }
}

#[async_trait(?Send)]
impl MetricsSink for InfluxDbSink {
    async fn write_point(&self, point: &TimeSeriesPoint) -> Result<(), RecorderError> {
        let mut request = self
            .http_client
            .post(&self.write_url)
            .query(&[("db", self.database.as_str()), ("precision", "s")])
            .body(point.to_line_protocol());

        if let Some((username, password)) = &self.credentials {
            request = request.basic_auth(username, Some(password));
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                RecorderError::TransientNetwork(format!(
                    "InfluxDB write of {} at {}: {}",
                    point.series, point.timestamp, e
                ))
            } else {
                write_error(point, e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let body_snippet: String = body.chars().take(256).collect();
            return Err(write_error(point, format!("{} {}", status, body_snippet)));
        }

        tracing::debug!(series = %point.series, value = point.value, timestamp = point.timestamp, "point written");
        Ok(())
    }
}

fn write_error(point: &TimeSeriesPoint, message: String) -> RecorderError {
    RecorderError::Write {
        series: point.series.to_string(),
        timestamp: point.timestamp,
        message,
    }
}
