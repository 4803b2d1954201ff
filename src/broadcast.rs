use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    DashboardOnline,
    SensorGauge,
    DashboardSensors,
    DashboardUptime,
    DashboardPowerUsage,
    DashboardWaterFlow,
    PowerUsageWaterFlow,
    Environment,
    UpdateWeather,
    DoorIndicator,
    PowerSwitches,
    WebcamData,
    HistoryGraph,
}

/// A typed push message, `{"type": ..., "data": ...}` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub data: Value,
}

impl Message {
    pub fn new(kind: MessageType, data: impl Serialize) -> Self {
        let data = serde_json::to_value(data).unwrap_or_else(|e| {
            warn!("Failed to serialize {kind:?} payload: {e}");
            Value::Null
        });
        Self { kind, data }
    }

    pub fn online() -> Self {
        Self {
            kind: MessageType::DashboardOnline,
            data: Value::Bool(true),
        }
    }
}

/// Fan-out of push messages to every live dashboard connection.
///
/// Sends never block: a full channel misses the message, a closed one is
/// dropped from the registry on the next publish.
#[derive(Default)]
pub struct BroadcastHub {
    subscribers: Mutex<Vec<Sender<Message>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `channel` and greets it with the online notice.
    pub fn subscribe(&self, channel: Sender<Message>) {
        // Greeting under the lock, so no publish can overtake it
        let mut subscribers = self.subscribers.lock();
        if let Err(e) = channel.try_send(Message::online()) {
            debug!("New subscriber did not take the online notice: {e}");
        }
        subscribers.push(channel);
        debug!("Subscriber registered, {} live", subscribers.len());
    }

    /// Creates a bounded channel, registers it and hands back the receiving end.
    ///
    /// A `capacity` of zero is raised to one.
    pub fn subscribe_channel(&self, capacity: usize) -> Receiver<Message> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.subscribe(tx);
        rx
    }

    pub fn publish(&self, message: Message) {
        let snapshot = self.subscribers.lock().clone();
        let mut saw_closed = false;

        for channel in &snapshot {
            match channel.try_send(message.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!("Subscriber queue full, dropping {:?}", message.kind);
                }
                Err(TrySendError::Closed(_)) => saw_closed = true,
            }
        }

        if saw_closed {
            let mut subscribers = self.subscribers.lock();
            subscribers.retain(|channel| !channel.is_closed());
            debug!("Pruned closed subscribers, {} live", subscribers.len());
        }
    }

    pub fn send(&self, kind: MessageType, data: impl Serialize) {
        self.publish(Message::new(kind, data));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
