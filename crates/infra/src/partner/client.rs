//! HTTP partner client
//!
//! Implements the [`PartnerClient`] port over reqwest with per-request
//! timeouts and bearer-token authentication. Batch data pushes are chunked
//! to the configured maximum batch size; chunk failures degrade to per-item
//! failures so one bad chunk never poisons a whole batch.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use roamsync_core::error::{PartnerError, PartnerResult};
use roamsync_core::PartnerClient;
use roamsync_domain::{
    BatchOutcome, ChargeRecord, DataPushMode, EvseAvailability, EvseBusyStatus, EvseId,
    ItemOutcome, PartnerConfig, PartnerOutcome, Result, RoamsyncError,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use super::wire::{
    AvailabilityStatusRequest, BusyStatusRequest, ChargeRecordRequest, HeartbeatRequest,
    PartnerResponse, PushDataRequest, PushDataResponse, wire_evse_id,
};

/// Partner client over HTTP/JSON.
pub struct HttpPartnerClient {
    http: reqwest::Client,
    base_url: String,
    config: PartnerConfig,
}

impl HttpPartnerClient {
    /// Build a client from validated partner settings.
    pub fn new(config: PartnerConfig) -> Result<Self> {
        let parsed = Url::parse(&config.base_url)
            .map_err(|e| RoamsyncError::Config(format!("invalid partner base URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RoamsyncError::Config(format!(
                "partner base URL must be http(s): {}",
                config.base_url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| RoamsyncError::Config(format!("failed to build HTTP client: {e}")))?;

        let base_url = config.base_url.trim_end_matches('/').to_owned();
        Ok(Self {
            http,
            base_url,
            config,
        })
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> PartnerResult<R> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "partner POST");

        let mut request = self.http.post(&url).json(body);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                PartnerError::Timeout(self.config.request_timeout())
            } else {
                PartnerError::Network(err.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            warn!(url = %url, status = %status, "partner returned non-success status");
            return Err(Self::map_status_error(status, path, body_text));
        }

        response
            .json()
            .await
            .map_err(|e| PartnerError::Network(format!("invalid response body from {path}: {e}")))
    }

    fn map_status_error(status: StatusCode, path: &str, body: String) -> PartnerError {
        let message = if body.is_empty() {
            format!("{path} returned status {status}")
        } else {
            format!("{path} returned status {status}: {body}")
        };
        if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
            PartnerError::Network(message)
        } else {
            // The request completed and the partner refused it.
            PartnerError::Rejected(message)
        }
    }
}

#[async_trait]
impl PartnerClient for HttpPartnerClient {
    #[instrument(skip(self, status), fields(evse = %evse))]
    async fn set_availability_status(
        &self,
        evse: &EvseId,
        recorded_at: DateTime<Utc>,
        status: &EvseAvailability,
    ) -> PartnerResult<PartnerOutcome> {
        let request = AvailabilityStatusRequest {
            evse_id: wire_evse_id(evse)?,
            timestamp: recorded_at,
            status: status.clone(),
        };
        let response: PartnerResponse = self.post("/status/availability", &request).await?;
        Ok(response.into_outcome())
    }

    #[instrument(skip(self, status), fields(evse = %evse))]
    async fn set_busy_status(
        &self,
        evse: &EvseId,
        recorded_at: DateTime<Utc>,
        status: &EvseBusyStatus,
    ) -> PartnerResult<PartnerOutcome> {
        let request = BusyStatusRequest {
            evse_id: wire_evse_id(evse)?,
            timestamp: recorded_at,
            status: status.clone(),
        };
        let response: PartnerResponse = self.post("/status/busy", &request).await?;
        Ok(response.into_outcome())
    }

    #[instrument(skip(self))]
    async fn send_heartbeat(
        &self,
        partner_id: &str,
        correlation_id: Uuid,
    ) -> PartnerResult<PartnerOutcome> {
        let request = HeartbeatRequest {
            partner_id: partner_id.to_owned(),
            correlation_id,
            sent_at: Utc::now(),
        };
        let response: PartnerResponse = self.post("/heartbeat", &request).await?;
        Ok(response.into_outcome())
    }

    #[instrument(skip(self, record), fields(session = %record.session_id))]
    async fn send_charge_record(&self, record: &ChargeRecord) -> PartnerResult<PartnerOutcome> {
        let request = ChargeRecordRequest::try_from(record)?;
        let response: PartnerResponse = self.post("/charge-records", &request).await?;
        Ok(response.into_outcome())
    }

    #[instrument(skip(self, entities), fields(count = entities.len(), mode = %mode))]
    async fn push_evse_data(
        &self,
        entities: &[EvseId],
        mode: DataPushMode,
    ) -> PartnerResult<BatchOutcome> {
        let mut slots: Vec<Option<ItemOutcome>> = vec![None; entities.len()];
        let mut valid: Vec<(usize, String)> = Vec::with_capacity(entities.len());

        for (idx, evse) in entities.iter().enumerate() {
            match wire_evse_id(evse) {
                Ok(wire_id) => valid.push((idx, wire_id)),
                Err(err) => {
                    slots[idx] = Some(ItemOutcome::invalid(evse.to_string(), err.to_string()));
                }
            }
        }

        for chunk in valid.chunks(self.config.max_batch_size.max(1)) {
            let request = PushDataRequest {
                operator_id: self.config.operator_id.clone(),
                action: mode,
                evse_ids: chunk.iter().map(|(_, id)| id.clone()).collect(),
            };
            match self.post::<_, PushDataResponse>("/evse-data", &request).await {
                Ok(response) => {
                    let mut reported: HashMap<&str, &PartnerResponse> = HashMap::new();
                    for result in &response.results {
                        reported.insert(result.evse_id.as_str(), &result.response);
                    }
                    for (idx, wire_id) in chunk {
                        let outcome = match reported.get(wire_id.as_str()) {
                            Some(envelope) => {
                                let partner = (*envelope).clone().into_outcome();
                                roamsync_core::item_from_partner(wire_id.clone(), &partner)
                            }
                            // Entities the partner does not echo back were
                            // accepted.
                            None => ItemOutcome::accepted(wire_id.clone()),
                        };
                        slots[*idx] = Some(outcome);
                    }
                }
                Err(err) => {
                    let message = err.to_string();
                    for (idx, wire_id) in chunk {
                        slots[*idx] = Some(ItemOutcome::failed(wire_id.clone(), &message));
                    }
                }
            }
        }

        let items = slots
            .into_iter()
            .zip(entities)
            .map(|(slot, evse)| {
                slot.unwrap_or_else(|| {
                    ItemOutcome::failed(evse.to_string(), "no outcome recorded for entity")
                })
            })
            .collect();
        Ok(BatchOutcome::new(items))
    }
}
