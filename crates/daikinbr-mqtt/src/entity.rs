//! One air conditioner exposed as a Home Assistant climate entity

use daikinbr_core::{ClimateCommand, ClimateState, FanMode, HvacMode, ModeParseError};
use daikinbr_device::AcDevice;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::bus::{BusResult, Message, MessageBus};
use crate::discovery::ClimateDiscovery;
use crate::topics::{Topics, PAYLOAD_AVAILABLE, PAYLOAD_NOT_AVAILABLE};

/// Lowest accepted target temperature, °C
pub const MIN_TEMPERATURE: f64 = 16.0;

/// Highest accepted target temperature, °C
pub const MAX_TEMPERATURE: f64 = 32.0;

const TEMPERATURE_STEP: f64 = 1.0;

/// What the entity advertises about its unit
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInfo {
    pub name: String,
    pub mqtt_id: String,
    pub operation_modes: Vec<HvacMode>,
    pub fan_modes: Vec<FanMode>,
}

#[derive(Debug, Error)]
enum CommandError {
    #[error(transparent)]
    Parse(#[from] ModeParseError),

    #[error("mode '{0}' is not enabled for this unit")]
    UnsupportedMode(HvacMode),

    #[error("fan mode '{0}' is not enabled for this unit")]
    UnsupportedFanMode(FanMode),

    #[error("invalid temperature '{0}'")]
    InvalidTemperature(String),

    #[error("temperature {0} is outside the accepted range")]
    TemperatureOutOfRange(f64),

    #[error("unexpected topic '{0}'")]
    UnknownTopic(String),
}

/// Payload published on the state topic
#[derive(Debug, Serialize)]
struct StatePayload {
    mode: HvacMode,
    fan_mode: FanMode,
    target_temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_temperature: Option<f64>,
}

impl From<&ClimateState> for StatePayload {
    fn from(state: &ClimateState) -> Self {
        Self {
            mode: state.hvac_mode(),
            fan_mode: state.fan_mode,
            target_temperature: state.target_temperature,
            current_temperature: state.current_temperature,
        }
    }
}

/// Bridges one unit to the message bus
pub struct ClimateEntity {
    device: Arc<dyn AcDevice>,
    bus: Arc<dyn MessageBus>,
    info: EntityInfo,
    topics: Topics,
    available: AtomicBool,
}

impl ClimateEntity {
    pub fn new(
        device: Arc<dyn AcDevice>,
        bus: Arc<dyn MessageBus>,
        info: EntityInfo,
        topics: Topics,
    ) -> Self {
        Self {
            device,
            bus,
            info,
            topics,
            available: AtomicBool::new(false),
        }
    }

    pub fn info(&self) -> &EntityInfo {
        &self.info
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Whether the last availability published was `online`
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Read the unit's current state
    pub async fn fetch_state(&self) -> daikinbr_device::DeviceResult<ClimateState> {
        self.device.state().await
    }

    /// Announce the entity to Home Assistant
    pub async fn publish_discovery(&self) -> BusResult<()> {
        let discovery = ClimateDiscovery::new(
            &self.info.name,
            &self.info.mqtt_id,
            &self.topics,
            &self.info.operation_modes,
            &self.info.fan_modes,
            MIN_TEMPERATURE,
            MAX_TEMPERATURE,
            TEMPERATURE_STEP,
        );
        let payload = serde_json::to_vec(&discovery)?;
        debug!(topic = %self.topics.discovery, "Publishing discovery config");
        self.bus
            .publish(&self.topics.discovery, payload, true)
            .await
    }

    pub async fn publish_available(&self) -> BusResult<()> {
        self.bus
            .publish(
                &self.topics.availability,
                PAYLOAD_AVAILABLE.as_bytes().to_vec(),
                true,
            )
            .await?;
        self.available.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub async fn publish_unavailable(&self) -> BusResult<()> {
        self.available.store(false, Ordering::SeqCst);
        self.bus
            .publish(
                &self.topics.availability,
                PAYLOAD_NOT_AVAILABLE.as_bytes().to_vec(),
                true,
            )
            .await
    }

    pub async fn publish_state(&self, state: &ClimateState) -> BusResult<()> {
        let payload = serde_json::to_vec(&StatePayload::from(state))?;
        self.bus.publish(&self.topics.state, payload, true).await
    }

    /// Read the unit once and publish the outcome
    ///
    /// A failed read marks the entity unavailable; the next good read marks
    /// it available again.
    pub async fn sync_state(&self) {
        match self.device.state().await {
            Ok(state) => {
                if !self.is_available() {
                    info!(mqtt_id = %self.info.mqtt_id, "Device reachable again");
                    if let Err(e) = self.publish_available().await {
                        warn!(mqtt_id = %self.info.mqtt_id, error = %e, "Failed to publish availability");
                    }
                }
                if let Err(e) = self.publish_state(&state).await {
                    warn!(mqtt_id = %self.info.mqtt_id, error = %e, "Failed to publish state");
                }
            }
            Err(e) => {
                warn!(mqtt_id = %self.info.mqtt_id, error = %e, "Failed to read device state");
                if self.is_available() {
                    if let Err(e) = self.publish_unavailable().await {
                        warn!(mqtt_id = %self.info.mqtt_id, error = %e, "Failed to publish availability");
                    }
                }
            }
        }
    }

    /// Poll the unit every `interval`, forever
    pub async fn state_update(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.sync_state().await;
        }
    }

    /// Apply commands received on the command topics until the bus closes
    pub async fn command_subscriptions(&self) -> BusResult<()> {
        let mut modes = self.bus.subscribe(&self.topics.mode_command).await?;
        let mut fan_modes = self.bus.subscribe(&self.topics.fan_mode_command).await?;
        let mut temperatures = self.bus.subscribe(&self.topics.temperature_command).await?;
        debug!(mqtt_id = %self.info.mqtt_id, "Listening for commands");

        loop {
            let message = tokio::select! {
                m = modes.recv() => m,
                m = fan_modes.recv() => m,
                m = temperatures.recv() => m,
            };
            let Some(message) = message else {
                debug!(mqtt_id = %self.info.mqtt_id, "Command subscriptions closed");
                return Ok(());
            };
            self.handle_command(&message).await;
        }
    }

    /// Run the poll loop and the command subscriptions together
    pub async fn run(&self, interval: Duration) -> BusResult<()> {
        tokio::select! {
            _ = self.state_update(interval) => Ok(()),
            result = self.command_subscriptions() => result,
        }
    }

    async fn handle_command(&self, message: &Message) {
        let command = match self.parse_command(message) {
            Ok(command) => command,
            Err(e) => {
                warn!(
                    mqtt_id = %self.info.mqtt_id,
                    topic = %message.topic,
                    payload = %message.payload_str(),
                    error = %e,
                    "Ignoring command"
                );
                return;
            }
        };

        info!(mqtt_id = %self.info.mqtt_id, ?command, "Applying command");
        match self.device.apply(&command).await {
            Ok(state) => {
                if !self.is_available() {
                    if let Err(e) = self.publish_available().await {
                        warn!(mqtt_id = %self.info.mqtt_id, error = %e, "Failed to publish availability");
                    }
                }
                if let Err(e) = self.publish_state(&state).await {
                    warn!(mqtt_id = %self.info.mqtt_id, error = %e, "Failed to publish state");
                }
            }
            Err(e) => {
                warn!(mqtt_id = %self.info.mqtt_id, ?command, error = %e, "Failed to apply command");
            }
        }
    }

    fn parse_command(&self, message: &Message) -> Result<ClimateCommand, CommandError> {
        let payload = message.payload_str();

        if message.topic == self.topics.mode_command {
            let mode: HvacMode = payload.parse()?;
            if !self.info.operation_modes.contains(&mode) {
                return Err(CommandError::UnsupportedMode(mode));
            }
            Ok(ClimateCommand::SetMode(mode))
        } else if message.topic == self.topics.fan_mode_command {
            let fan_mode: FanMode = payload.parse()?;
            if !self.info.fan_modes.contains(&fan_mode) {
                return Err(CommandError::UnsupportedFanMode(fan_mode));
            }
            Ok(ClimateCommand::SetFanMode(fan_mode))
        } else if message.topic == self.topics.temperature_command {
            let temperature: f64 = payload
                .trim()
                .parse()
                .map_err(|_| CommandError::InvalidTemperature(payload.to_string()))?;
            if !temperature.is_finite()
                || !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature)
            {
                return Err(CommandError::TemperatureOutOfRange(temperature));
            }
            Ok(ClimateCommand::SetTargetTemperature(temperature))
        } else {
            Err(CommandError::UnknownTopic(message.topic.clone()))
        }
    }
}
