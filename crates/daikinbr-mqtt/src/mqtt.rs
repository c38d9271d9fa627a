//! MQTT broker connection

use async_trait::async_trait;
use daikinbr_config::MqttConfig;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing,
    Packet, QoS,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bus::{BusError, BusResult, Message, MessageBus, Subscription};
use crate::router::TopicRouter;

/// Port used when the broker address has none
pub const DEFAULT_MQTT_PORT: u16 = 1883;

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const REQUEST_CAPACITY: usize = 64;

/// Split a broker address into host and port
///
/// Accepts `tcp://host:port`, `mqtt://host:port` and bare `host[:port]`.
pub fn parse_broker_address(address: &str) -> BusResult<(String, u16)> {
    let invalid = |reason: &str| BusError::InvalidAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = address.trim().trim_end_matches('/');
    let rest = match trimmed.split_once("://") {
        Some(("tcp" | "mqtt", rest)) => rest,
        Some((scheme, _)) => {
            return Err(invalid(&format!("unsupported scheme '{}'", scheme)));
        }
        None => trimmed,
    };

    let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
        let (host, tail) = bracketed
            .split_once(']')
            .ok_or_else(|| invalid("unterminated IPv6 literal"))?;
        (host, tail.strip_prefix(':'))
    } else {
        match rest.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (rest, None),
        }
    };

    if host.is_empty() {
        return Err(invalid("missing host"));
    }

    let port = match port {
        Some(port) => port.parse().map_err(|_| invalid("invalid port"))?,
        None => DEFAULT_MQTT_PORT,
    };

    Ok((host.to_string(), port))
}

/// Message bus backed by an MQTT broker
pub struct MqttBus {
    client: AsyncClient,
    router: Arc<TopicRouter>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl MqttBus {
    /// Connect to the broker and wait until it accepts the session
    pub async fn connect(config: &MqttConfig) -> BusResult<Self> {
        let (host, port) = parse_broker_address(&config.address)?;
        let client_id = format!("daikinbr-{}", Uuid::new_v4().simple());

        let mut options = MqttOptions::new(client_id, host.clone(), port);
        options.set_keep_alive(KEEP_ALIVE);
        if !config.username.is_empty() {
            options.set_credentials(config.username.clone(), config.password.clone());
        }

        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);

        timeout(CONNECT_TIMEOUT, wait_for_connack(&mut event_loop))
            .await
            .map_err(|_| BusError::Connect(format!("no answer from {}:{}", host, port)))??;
        info!(host = %host, port, "Connected to MQTT broker");

        let router = Arc::new(TopicRouter::new());
        let handle = tokio::spawn(drive(event_loop, client.clone(), router.clone()));

        Ok(Self {
            client,
            router,
            event_loop: Mutex::new(Some(handle)),
        })
    }
}

async fn wait_for_connack(event_loop: &mut EventLoop) -> BusResult<()> {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return if ack.code == ConnectReturnCode::Success {
                    Ok(())
                } else {
                    Err(BusError::Connect(format!("broker refused: {:?}", ack.code)))
                };
            }
            Ok(_) => {}
            Err(ConnectionError::ConnectionRefused(code)) => {
                return Err(BusError::Connect(format!("broker refused: {:?}", code)));
            }
            Err(e) => return Err(BusError::Connect(e.to_string())),
        }
    }
}

/// Poll the event loop, dispatching incoming publishes until disconnected
async fn drive(mut event_loop: EventLoop, client: AsyncClient, router: Arc<TopicRouter>) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                router.dispatch(Message {
                    topic: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                });
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Reconnected to MQTT broker");
                // The broker forgets subscriptions of clean sessions
                for topic in router.topics() {
                    if let Err(e) = client.try_subscribe(topic.clone(), QoS::AtLeastOnce) {
                        warn!(topic = %topic, error = %e, "Failed to resubscribe");
                    }
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("MQTT disconnect sent");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "MQTT connection error, retrying");
                sleep(RECONNECT_DELAY).await;
            }
        }
    }
    router.close();
}

#[async_trait]
impl MessageBus for MqttBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> BusResult<()> {
        self.client
            .publish(topic, QoS::AtLeastOnce, retain, payload)
            .await?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> BusResult<Subscription> {
        let subscription = self.router.subscribe(topic);
        self.client.subscribe(topic, QoS::AtLeastOnce).await?;
        Ok(subscription)
    }

    async fn disconnect(&self) -> BusResult<()> {
        let result = self.client.disconnect().await;

        let handle = self.event_loop.lock().ok().and_then(|mut h| h.take());
        if let Some(mut handle) = handle {
            if timeout(DISCONNECT_TIMEOUT, &mut handle).await.is_err() {
                warn!("MQTT event loop did not stop in time");
                handle.abort();
            }
        }

        self.router.close();
        result.map_err(BusError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const TOPIC: &str = "daikinbr/lounge/mode/set";

    /// Minimal MQTT 3.1.1 broker answering a single client
    ///
    /// Publishes are echoed back to the publishing connection when it
    /// subscribed to the topic. A connection after the first one is sent
    /// `resubscribed` on every topic it subscribes to.
    struct ScriptedBroker {
        port: u16,
        subscriptions: Arc<Mutex<Vec<(usize, String)>>>,
    }

    impl ScriptedBroker {
        /// With `drop_first_session`, the first connection is closed right
        /// after its first SUBACK.
        async fn start(drop_first_session: bool) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();
            let subscriptions = Arc::new(Mutex::new(Vec::new()));

            let seen = subscriptions.clone();
            tokio::spawn(async move {
                let mut conn = 0;
                while let Ok((stream, _)) = listener.accept().await {
                    let close_after_subscribe = drop_first_session && conn == 0;
                    let seen = seen.clone();
                    tokio::spawn(async move {
                        let _ = serve(stream, conn, close_after_subscribe, seen).await;
                    });
                    conn += 1;
                }
            });

            Self {
                port,
                subscriptions,
            }
        }

        fn config(&self) -> MqttConfig {
            MqttConfig {
                address: format!("tcp://127.0.0.1:{}", self.port),
                ..Default::default()
            }
        }

        fn subscriptions(&self) -> Vec<(usize, String)> {
            self.subscriptions.lock().unwrap().clone()
        }
    }

    async fn serve(
        mut stream: TcpStream,
        conn: usize,
        close_after_subscribe: bool,
        seen: Arc<Mutex<Vec<(usize, String)>>>,
    ) -> std::io::Result<()> {
        let mut subscribed: Vec<String> = Vec::new();
        while let Some((header, body)) = read_packet(&mut stream).await? {
            match header >> 4 {
                // CONNECT
                1 => stream.write_all(&[0x20, 0x02, 0x00, 0x00]).await?,
                // PUBLISH
                3 => {
                    let qos = (header >> 1) & 0x03;
                    let topic_len = u16::from_be_bytes([body[0], body[1]]) as usize;
                    let topic = String::from_utf8_lossy(&body[2..2 + topic_len]).into_owned();
                    let mut offset = 2 + topic_len;
                    if qos > 0 {
                        stream
                            .write_all(&[0x40, 0x02, body[offset], body[offset + 1]])
                            .await?;
                        offset += 2;
                    }
                    if subscribed.contains(&topic) {
                        stream.write_all(&publish_packet(&topic, &body[offset..])).await?;
                    }
                }
                // SUBSCRIBE
                8 => {
                    let topics = subscribe_topics(&body[2..]);
                    let mut ack = vec![0x90, 2 + topics.len() as u8, body[0], body[1]];
                    ack.extend(topics.iter().map(|_| 0x01));
                    stream.write_all(&ack).await?;
                    seen.lock()
                        .unwrap()
                        .extend(topics.iter().map(|topic| (conn, topic.clone())));

                    if close_after_subscribe {
                        return Ok(());
                    }
                    if conn > 0 {
                        for topic in &topics {
                            stream.write_all(&publish_packet(topic, b"resubscribed")).await?;
                        }
                    }
                    subscribed.extend(topics);
                }
                // PINGREQ
                12 => stream.write_all(&[0xD0, 0x00]).await?,
                // DISCONNECT
                14 => return Ok(()),
                _ => {}
            }
        }
        Ok(())
    }

    async fn read_packet(stream: &mut TcpStream) -> std::io::Result<Option<(u8, Vec<u8>)>> {
        let mut header = [0u8; 1];
        if stream.read(&mut header).await? == 0 {
            return Ok(None);
        }

        let mut length = 0usize;
        let mut shift = 0;
        loop {
            let byte = stream.read_u8().await?;
            length |= ((byte & 0x7F) as usize) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }

        let mut body = vec![0u8; length];
        stream.read_exact(&mut body).await?;
        Ok(Some((header[0], body)))
    }

    fn subscribe_topics(mut filters: &[u8]) -> Vec<String> {
        let mut topics = Vec::new();
        while filters.len() >= 2 {
            let len = u16::from_be_bytes([filters[0], filters[1]]) as usize;
            topics.push(String::from_utf8_lossy(&filters[2..2 + len]).into_owned());
            // Skip the requested QoS
            filters = &filters[2 + len + 1..];
        }
        topics
    }

    /// QoS 0 PUBLISH packet
    fn publish_packet(topic: &str, payload: &[u8]) -> Vec<u8> {
        let mut body = (topic.len() as u16).to_be_bytes().to_vec();
        body.extend_from_slice(topic.as_bytes());
        body.extend_from_slice(payload);

        let mut packet = vec![0x30];
        let mut length = body.len();
        loop {
            let mut byte = (length % 128) as u8;
            length /= 128;
            if length > 0 {
                byte |= 0x80;
            }
            packet.push(byte);
            if length == 0 {
                break;
            }
        }
        packet.extend(body);
        packet
    }

    #[test]
    fn test_parse_tcp_address() {
        assert_eq!(
            parse_broker_address("tcp://core-mosquitto:1883").unwrap(),
            ("core-mosquitto".to_string(), 1883)
        );
        assert_eq!(
            parse_broker_address("mqtt://10.0.0.2:1884/").unwrap(),
            ("10.0.0.2".to_string(), 1884)
        );
    }

    #[test]
    fn test_parse_bare_address() {
        assert_eq!(
            parse_broker_address("broker").unwrap(),
            ("broker".to_string(), DEFAULT_MQTT_PORT)
        );
        assert_eq!(
            parse_broker_address("[::1]:1885").unwrap(),
            ("::1".to_string(), 1885)
        );
        assert_eq!(
            parse_broker_address("[::1]").unwrap(),
            ("::1".to_string(), DEFAULT_MQTT_PORT)
        );
    }

    #[test]
    fn test_parse_invalid_addresses() {
        assert!(matches!(
            parse_broker_address(""),
            Err(BusError::InvalidAddress { .. })
        ));
        assert!(matches!(
            parse_broker_address("ssl://broker:8883"),
            Err(BusError::InvalidAddress { .. })
        ));
        assert!(matches!(
            parse_broker_address("broker:http"),
            Err(BusError::InvalidAddress { .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = MqttConfig {
            address: format!("tcp://127.0.0.1:{}", port),
            ..Default::default()
        };
        assert!(matches!(
            MqttBus::connect(&config).await,
            Err(BusError::Connect(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_reaches_subscription() {
        let broker = ScriptedBroker::start(false).await;
        let bus = MqttBus::connect(&broker.config()).await.unwrap();

        let mut subscription = bus.subscribe(TOPIC).await.unwrap();
        bus.publish(TOPIC, b"cool".to_vec(), false).await.unwrap();

        let message = timeout(Duration::from_secs(5), subscription.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.topic, TOPIC);
        assert_eq!(message.payload_str(), "cool");
        assert_eq!(broker.subscriptions(), vec![(0, TOPIC.to_string())]);

        bus.disconnect().await.unwrap();
        assert!(subscription.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_resubscribes_after_reconnect() {
        let broker = ScriptedBroker::start(true).await;
        let bus = MqttBus::connect(&broker.config()).await.unwrap();

        let mut subscription = bus.subscribe(TOPIC).await.unwrap();

        // Only delivered once the topic is subscribed again on a new session
        let message = timeout(Duration::from_secs(10), subscription.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.payload_str(), "resubscribed");

        let subscriptions = broker.subscriptions();
        assert_eq!(subscriptions[0], (0, TOPIC.to_string()));
        assert!(subscriptions
            .iter()
            .any(|(conn, topic)| *conn > 0 && topic == TOPIC));

        bus.disconnect().await.unwrap();
    }
}
