// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Fit API client for fetching step counts.
//!
//! Handles:
//! - Daily step aggregation via dataset:aggregate
//! - Token refresh when expired
//! - Distinguishable errors so callers can offer manual entry

use crate::error::AppError;
use chrono::{NaiveDate, TimeZone, Utc};
use serde::Deserialize;

const STEP_DATA_TYPE: &str = "com.google.step_count.delta";
const STEP_DATA_SOURCE: &str =
    "derived:com.google.step_count.delta:com.google.android.gms:estimated_steps";

/// Google Fit API client.
#[derive(Clone)]
pub struct GoogleFitClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl GoogleFitClient {
    /// Create a new Google Fit client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://www.googleapis.com/fitness/v1".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            client_id,
            client_secret,
        }
    }

    /// Fetch the total step count for a calendar day (UTC).
    pub async fn fetch_steps_for_day(
        &self,
        access_token: &str,
        day: NaiveDate,
    ) -> Result<f64, AppError> {
        let start = Utc
            .from_utc_datetime(&day.and_hms_opt(0, 0, 0).ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("Invalid day for step query: {}", day))
            })?)
            .timestamp_millis();
        let end = start + 24 * 60 * 60 * 1000;

        let url = format!("{}/users/me/dataset:aggregate", self.base_url);
        let body = serde_json::json!({
            "aggregateBy": [{
                "dataTypeName": STEP_DATA_TYPE,
                "dataSourceId": STEP_DATA_SOURCE,
            }],
            "bucketByTime": { "durationMillis": end - start },
            "startTimeMillis": start,
            "endTimeMillis": end,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalSource {
                message: format!("Google Fit request failed: {}", e),
                allow_manual: true,
            })?;

        if response.status().as_u16() == 401 {
            return Err(AppError::ExternalSource {
                message: "Google Fit token expired. Please reconnect Google Fit.".to_string(),
                allow_manual: true,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %text, "Google Fit aggregate query failed");
            return Err(AppError::ExternalSource {
                message: format!("Google Fit returned {}", status),
                allow_manual: true,
            });
        }

        let aggregate: AggregateResponse =
            response.json().await.map_err(|e| AppError::ExternalSource {
                message: format!("Unreadable Google Fit response: {}", e),
                allow_manual: true,
            })?;

        Ok(sum_steps(&aggregate))
    }

    /// Refresh an expired access token via the OAuth refresh grant.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<String, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::ExternalSource {
                message: format!("Token refresh request failed: {}", e),
                allow_manual: true,
            })?;

        if !response.status().is_success() {
            return Err(AppError::ExternalSource {
                message: "Google Fit token refresh was rejected".to_string(),
                allow_manual: true,
            });
        }

        let token: TokenRefreshResponse =
            response.json().await.map_err(|e| AppError::ExternalSource {
                message: format!("Unreadable token refresh response: {}", e),
                allow_manual: true,
            })?;

        Ok(token.access_token)
    }
}

/// Total the step deltas across every bucket in an aggregate response.
fn sum_steps(aggregate: &AggregateResponse) -> f64 {
    aggregate
        .bucket
        .iter()
        .flat_map(|b| &b.dataset)
        .flat_map(|d| &d.point)
        .flat_map(|p| &p.value)
        .filter_map(|v| v.int_val)
        .sum::<i64>() as f64
}

#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    bucket: Vec<AggregateBucket>,
}

#[derive(Debug, Deserialize)]
struct AggregateBucket {
    #[serde(default)]
    dataset: Vec<AggregateDataset>,
}

#[derive(Debug, Deserialize)]
struct AggregateDataset {
    #[serde(default)]
    point: Vec<AggregatePoint>,
}

#[derive(Debug, Deserialize)]
struct AggregatePoint {
    #[serde(default)]
    value: Vec<AggregateValue>,
}

#[derive(Debug, Deserialize)]
struct AggregateValue {
    #[serde(rename = "intVal")]
    int_val: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenRefreshResponse {
    access_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_steps_across_buckets() {
        let response: AggregateResponse = serde_json::from_str(
            r#"{
                "bucket": [
                    {"dataset": [{"point": [{"value": [{"intVal": 4200}]}]}]},
                    {"dataset": [{"point": [{"value": [{"intVal": 1800}, {"intVal": 500}]}]}]}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(sum_steps(&response), 6500.0);
    }

    #[test]
    fn test_sum_steps_empty_response() {
        let response: AggregateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(sum_steps(&response), 0.0);
    }

    #[test]
    fn test_sum_steps_ignores_missing_int_values() {
        let response: AggregateResponse = serde_json::from_str(
            r#"{"bucket": [{"dataset": [{"point": [{"value": [{"fpVal": 1.5}]}]}]}]}"#,
        )
        .unwrap();
        assert_eq!(sum_steps(&response), 0.0);
    }
}
