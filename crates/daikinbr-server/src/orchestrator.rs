//! Per-device startup and shutdown

use daikinbr_config::{Config, DeviceConfig};
use daikinbr_core::{device_url, mqtt_id_for_apn, DEFAULT_FAN_MODES, DEFAULT_OPERATION_MODES};
use daikinbr_device::{decode_secret_key, AcDevice, DaikinClient, DeviceResult};
use daikinbr_mqtt::{ClimateEntity, EntityInfo, MessageBus, Topics};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const OFFLINE_TIMEOUT: Duration = Duration::from_secs(1);

/// Builds the client of one unit
pub trait DeviceFactory: Send + Sync {
    fn connect(&self, url: Url, secret_key: &[u8]) -> DeviceResult<Arc<dyn AcDevice>>;
}

/// Talks to units over their local HTTP API
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpDeviceFactory;

impl DeviceFactory for HttpDeviceFactory {
    fn connect(&self, url: Url, secret_key: &[u8]) -> DeviceResult<Arc<dyn AcDevice>> {
        Ok(Arc::new(DaikinClient::new(url, secret_key)?))
    }
}

/// Owns the entities of every configured device and their tasks
pub struct Orchestrator {
    bus: Arc<dyn MessageBus>,
    factory: Arc<dyn DeviceFactory>,
    topic_prefix: String,
    discovery_prefix: String,
    poll_interval: Duration,
    entities: Vec<Arc<ClimateEntity>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Orchestrator {
    pub fn new(bus: Arc<dyn MessageBus>, factory: Arc<dyn DeviceFactory>, config: &Config) -> Self {
        Self {
            bus,
            factory,
            topic_prefix: config.mqtt.topic_prefix.clone(),
            discovery_prefix: config.mqtt.discovery_prefix.clone(),
            poll_interval: Duration::from_secs(config.sync.poll_interval_secs.max(1)),
            entities: Vec::new(),
            tasks: Vec::new(),
        }
    }

    /// Entities initialised so far
    pub fn entities(&self) -> &[Arc<ClimateEntity>] {
        &self.entities
    }

    /// Initialise every device in turn
    ///
    /// A device that cannot be set up is logged and skipped.
    pub async fn start(&mut self, devices: &[DeviceConfig]) {
        for device in devices {
            self.start_device(device).await;
        }
        info!(
            configured = devices.len(),
            initialized = self.entities.len(),
            running = self.tasks.len(),
            "Devices started"
        );
    }

    async fn start_device(&mut self, device: &DeviceConfig) {
        if device.address.trim().is_empty() {
            warn!(thing_id = %device.thing_id, apn = %device.apn, "Device has no address, using its mDNS name");
        }

        let url = match device_url(&device.address, &device.apn) {
            Ok(url) => url,
            Err(e) => {
                error!(thing_id = %device.thing_id, error = %e, "Invalid device address");
                return;
            }
        };

        let secret_key = match decode_secret_key(&device.secret_key) {
            Ok(key) => key,
            Err(e) => {
                error!(thing_id = %device.thing_id, error = %e, "Invalid device secret key");
                return;
            }
        };

        let mqtt_id = if device.mqtt_id.is_empty() {
            mqtt_id_for_apn(&device.apn)
        } else {
            device.mqtt_id.clone()
        };

        info!(
            thing_id = %device.thing_id,
            mqtt_id = %mqtt_id,
            url = %url,
            name = %device.name,
            apn = %device.apn,
            "Initializing device"
        );

        let client = match self.factory.connect(url, &secret_key) {
            Ok(client) => client,
            Err(e) => {
                error!(thing_id = %device.thing_id, error = %e, "Failed to create device client");
                return;
            }
        };

        let info = EntityInfo {
            name: device.name.clone(),
            mqtt_id,
            operation_modes: or_default(&device.operation_modes, &DEFAULT_OPERATION_MODES),
            fan_modes: or_default(&device.fan_modes, &DEFAULT_FAN_MODES),
        };
        let topics = Topics::new(&self.topic_prefix, &self.discovery_prefix, &info.mqtt_id);
        let entity = Arc::new(ClimateEntity::new(client, self.bus.clone(), info, topics));

        if let Err(e) = entity.publish_discovery().await {
            error!(thing_id = %device.thing_id, error = %e, "Failed to publish discovery config");
        }

        match entity.fetch_state().await {
            Ok(state) => {
                debug!(thing_id = %device.thing_id, ?state, "Device reachable");
                let task_entity = entity.clone();
                let interval = self.poll_interval;
                self.tasks.push(tokio::spawn(async move {
                    if let Err(e) = task_entity.publish_available().await {
                        warn!(error = %e, "Failed to publish availability");
                    }
                    if let Err(e) = task_entity.publish_state(&state).await {
                        warn!(error = %e, "Failed to publish state");
                    }
                    if let Err(e) = task_entity.run(interval).await {
                        error!(mqtt_id = %task_entity.info().mqtt_id, error = %e, "Device loop stopped");
                    }
                }));
            }
            Err(e) => {
                error!(thing_id = %device.thing_id, error = %e, "Error getting device state");
                if let Err(e) = entity.publish_unavailable().await {
                    warn!(thing_id = %device.thing_id, error = %e, "Failed to publish availability");
                }
            }
        }

        self.entities.push(entity);
    }

    /// Stop the device tasks, mark every entity unavailable and disconnect
    ///
    /// The offline announcements and the disconnect are each bounded to one
    /// second, so a stalled bus cannot hold the process.
    pub async fn shutdown(self) {
        // Stopped first so no poll can flip availability back
        for task in &self.tasks {
            task.abort();
        }

        let offline = join_all(self.entities.iter().map(|e| e.publish_unavailable()));
        match tokio::time::timeout(OFFLINE_TIMEOUT, offline).await {
            Ok(results) => {
                for (entity, result) in self.entities.iter().zip(results) {
                    if let Err(e) = result {
                        warn!(mqtt_id = %entity.info().mqtt_id, error = %e, "Failed to publish availability");
                    }
                }
            }
            Err(_) => warn!("Timed out marking devices unavailable"),
        }

        match tokio::time::timeout(DISCONNECT_TIMEOUT, self.bus.disconnect()).await {
            Ok(Ok(())) => debug!("Disconnected from the message bus"),
            Ok(Err(e)) => warn!(error = %e, "Error disconnecting from the message bus"),
            Err(_) => warn!("Timed out disconnecting from the message bus"),
        }
    }
}

fn or_default<T: Copy>(configured: &[T], default: &[T]) -> Vec<T> {
    if configured.is_empty() {
        default.to_vec()
    } else {
        configured.to_vec()
    }
}
