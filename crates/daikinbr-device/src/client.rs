//! HTTP client for a unit's local API

use async_trait::async_trait;
use daikinbr_core::{ClimateCommand, ClimateState};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::cipher::PayloadCipher;
use crate::error::{DeviceError, DeviceResult};
use crate::wire::{Envelope, PortPayload, PortState};

/// Path of the status resource (GET reads, POST changes)
pub const STATUS_PATH: &str = "acstatus";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// An air conditioner that can be read and controlled
#[async_trait]
pub trait AcDevice: Send + Sync {
    /// Read the current state
    async fn state(&self) -> DeviceResult<ClimateState>;

    /// Apply a command and return the resulting state
    async fn apply(&self, command: &ClimateCommand) -> DeviceResult<ClimateState>;
}

/// Client of one unit
#[derive(Debug, Clone)]
pub struct DaikinClient {
    http: Client,
    base_url: Url,
    cipher: PayloadCipher,
}

impl DaikinClient {
    /// Create a client for the unit at `base_url` paired with `secret_key`
    pub fn new(base_url: Url, secret_key: &[u8]) -> DeviceResult<Self> {
        let cipher = PayloadCipher::new(secret_key)?;
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url,
            cipher,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn status_url(&self) -> DeviceResult<Url> {
        Ok(self.base_url.join(STATUS_PATH)?)
    }

    fn seal<T: serde::Serialize>(&self, payload: &T) -> DeviceResult<Envelope> {
        let plaintext =
            serde_json::to_vec(payload).map_err(|e| DeviceError::Malformed(e.to_string()))?;
        Ok(Envelope {
            enc_data: self.cipher.seal(&plaintext)?,
        })
    }

    fn open<T: DeserializeOwned>(&self, envelope: &Envelope) -> DeviceResult<T> {
        let plaintext = self.cipher.open(&envelope.enc_data)?;
        serde_json::from_slice(&plaintext).map_err(|e| DeviceError::Malformed(e.to_string()))
    }

    async fn read_envelope(response: reqwest::Response) -> DeviceResult<Envelope> {
        let status = response.status();
        if !status.is_success() {
            return Err(DeviceError::Status {
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| DeviceError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl AcDevice for DaikinClient {
    #[instrument(skip(self), fields(url = %self.base_url))]
    async fn state(&self) -> DeviceResult<ClimateState> {
        let response = self.http.get(self.status_url()?).send().await?;
        let envelope = Self::read_envelope(response).await?;
        let payload: PortPayload = self.open(&envelope)?;
        let state = payload.port1.to_state()?;
        debug!(?state, "Read unit state");
        Ok(state)
    }

    #[instrument(skip(self), fields(url = %self.base_url))]
    async fn apply(&self, command: &ClimateCommand) -> DeviceResult<ClimateState> {
        let request = self.seal(&PortPayload {
            port1: PortState::from_command(command),
        })?;
        let response = self
            .http
            .post(self.status_url()?)
            .json(&request)
            .send()
            .await?;
        let envelope = Self::read_envelope(response).await?;
        let payload: PortPayload = self.open(&envelope)?;
        payload.port1.to_state()
    }
}
