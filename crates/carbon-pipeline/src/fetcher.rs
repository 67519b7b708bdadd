// crates/carbon-pipeline/src/fetcher.rs
//
// Reading Fetcher: HTTP client for the Carbon API.
//
// GET {base_url}/carbon/{system_identifier}/units?period={day|week|month}
//
// {
//   "system_identifier": "AC:XX0001",
//   "system_name": "System Alpha",
//   "period_type": "day",
//   "calculation_start_time": "2025-03-15T00:00:00+00:00",
//   "calculation_end_time": "2025-03-15T12:34:56.789012+00:00",
//   "simulated_carbon_units": 678.924
// }

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use carbon_core::measurement::{Measurement, PeriodType};
use carbon_core::traits::MeasurementSource;
use carbon_core::CarbonError;

use crate::retry::RetryPolicy;

/// Wire shape of a Carbon API reading.
///
/// Fields are optional so that a missing value surfaces as
/// `InvalidResponse` naming the field, not as a generic decode error.
#[derive(Debug, Deserialize)]
struct UnitsResponse {
    #[serde(default)]
    system_identifier: Option<String>,
    #[serde(default)]
    system_name: Option<String>,
    #[serde(default)]
    period_type: Option<String>,
    #[serde(default)]
    calculation_start_time: Option<String>,
    #[serde(default)]
    calculation_end_time: Option<String>,
    #[serde(default)]
    simulated_carbon_units: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

fn parse_time(field: &str, value: &str) -> Result<DateTime<Utc>, CarbonError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CarbonError::InvalidResponse(format!("{} {:?}: {}", field, value, e)))
}

/// Turn a Carbon API body into a `Measurement` for the requested system and period.
fn parse_measurement(
    body: &str,
    system_identifier: &str,
    period: PeriodType,
) -> Result<Measurement, CarbonError> {
    let wire: UnitsResponse = serde_json::from_str(body)
        .map_err(|e| CarbonError::InvalidResponse(format!("Carbon API body is not valid JSON: {}", e)))?;

    let simulated_units = wire
        .simulated_carbon_units
        .as_ref()
        .and_then(serde_json::Value::as_f64)
        .ok_or_else(|| {
            CarbonError::InvalidResponse("missing or non-numeric simulated_carbon_units".to_string())
        })?;
    if !simulated_units.is_finite() {
        return Err(CarbonError::InvalidResponse(format!(
            "simulated_carbon_units is not finite: {}",
            simulated_units
        )));
    }

    if let Some(returned) = wire.system_identifier.as_deref() {
        if returned != system_identifier {
            return Err(CarbonError::InvalidResponse(format!(
                "asked for {} but the Carbon API answered for {}",
                system_identifier, returned
            )));
        }
    }

    let period_type = match wire.period_type.as_deref() {
        Some(returned) => {
            let returned: PeriodType = returned.parse()?;
            if returned != period {
                return Err(CarbonError::InvalidResponse(format!(
                    "asked for period {} but the Carbon API answered for {}",
                    period, returned
                )));
            }
            returned
        }
        None => period,
    };

    let end = wire.calculation_end_time.as_deref().ok_or_else(|| {
        CarbonError::InvalidResponse("missing calculation_end_time".to_string())
    })?;
    let observed_at_end_time = parse_time("calculation_end_time", end)?;
    let calculation_start_time = wire
        .calculation_start_time
        .as_deref()
        .map(|s| parse_time("calculation_start_time", s))
        .transpose()?;

    Ok(Measurement {
        system_identifier: system_identifier.to_string(),
        period_type,
        simulated_units,
        observed_at_end_time,
        system_name: wire.system_name,
        calculation_start_time,
    })
}

/// Carbon API client with bounded retries on transport errors and 5xx.
#[derive(Debug, Clone)]
pub struct HttpMeasurementSource {
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpMeasurementSource {
    /// Create a client for the Carbon API at `base_url` (e.g. "http://127.0.0.1:5001").
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self, CarbonError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CarbonError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One GET without retries.
    async fn fetch_once(
        &self,
        system_identifier: &str,
        period: PeriodType,
    ) -> Result<Measurement, CarbonError> {
        let url = format!("{}/carbon/{}/units", self.base_url, system_identifier);
        let response = self
            .client
            .get(&url)
            .query(&[("period", period.as_str())])
            .send()
            .await
            .map_err(|e| CarbonError::SourceUnavailable(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CarbonError::SourceUnavailable(format!("Reading {} failed: {}", url, e)))?;

        if status.is_server_error() {
            return Err(CarbonError::SourceUnavailable(format!(
                "Carbon API returned {}: {}",
                status, body
            )));
        }
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            return Err(CarbonError::SourceRejected {
                status: status.as_u16(),
                message,
            });
        }

        parse_measurement(&body, system_identifier, period)
    }
}

#[async_trait]
impl MeasurementSource for HttpMeasurementSource {
    async fn fetch_measurement(
        &self,
        system_identifier: &str,
        period: PeriodType,
    ) -> Result<Measurement, CarbonError> {
        let label = format!("Carbon API fetch for {} ({})", system_identifier, period);
        let measurement = self
            .retry
            .run(&label, || self.fetch_once(system_identifier, period))
            .await?;

        tracing::info!(
            "Fetched {} units for {} over {} ending {}",
            measurement.simulated_units,
            measurement.system_identifier,
            measurement.period_type,
            measurement.observed_at_end_time
        );
        Ok(measurement)
    }
}
