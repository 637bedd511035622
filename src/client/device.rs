//! Conveniences for device firmware publishing sensor readings and status
//! updates under the `sensors/<name>` and `status/<name>` topics.

use chrono::Utc;
use serde_json::{Value, json};

use crate::client::BusClient;
use crate::message::QoS;
use crate::network::NetworkMonitor;
use crate::subscription::Handler;
use crate::topic::{sensor_topic, status_topic};
use crate::transport::Transport;
use crate::utils::error::Result;

impl<T: Transport, N: NetworkMonitor> BusClient<T, N> {
    /// Publish `{"sensor", "data", "timestamp"}` to `sensors/<sensor>`.
    /// The timestamp is in milliseconds since the UNIX epoch.
    pub async fn publish_sensor_data(
        &mut self,
        sensor: &str,
        data: impl Into<Value>,
        retain: bool,
        qos: QoS,
    ) -> Result<()> {
        let data: Value = data.into();
        let payload = json!({
            "sensor": sensor,
            "data": data,
            "timestamp": Utc::now().timestamp_millis(),
        });
        self.publish(&sensor_topic(Some(sensor)), payload, retain, qos)
            .await
    }

    /// Publish `{"device", "status", "timestamp"}` to `status/<device>`.
    ///
    /// Status is usually published retained so late subscribers see the
    /// current state.
    pub async fn publish_status(
        &mut self,
        device: &str,
        status: impl Into<Value>,
        retain: bool,
        qos: QoS,
    ) -> Result<()> {
        let status: Value = status.into();
        let payload = json!({
            "device": device,
            "status": status,
            "timestamp": Utc::now().timestamp_millis(),
        });
        self.publish(&status_topic(Some(device)), payload, retain, qos)
            .await
    }

    /// Subscribe to one sensor, or to all of them with `None`.
    pub async fn subscribe_to_sensor(
        &mut self,
        sensor: Option<&str>,
        handler: Handler,
        qos: QoS,
    ) -> Result<()> {
        self.subscribe(&sensor_topic(sensor), handler, qos).await
    }

    /// Subscribe to one device's status, or to all of them with `None`.
    pub async fn subscribe_to_status(
        &mut self,
        device: Option<&str>,
        handler: Handler,
        qos: QoS,
    ) -> Result<()> {
        self.subscribe(&status_topic(device), handler, qos).await
    }
}
