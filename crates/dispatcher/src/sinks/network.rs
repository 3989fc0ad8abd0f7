//! NetworkSink - forwards events as JSON datagrams over UDP

use contracts::{ContractError, EventSink, TaskEvent};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, instrument};

/// Largest UDP payload over IPv4
pub const MAX_UDP_PAYLOAD: usize = 65_507;

/// Configuration for NetworkSink
#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    /// Target address
    pub addr: SocketAddr,
    /// Max datagram size; larger events are rejected
    pub max_packet_size: usize,
}

impl NetworkSinkConfig {
    /// Create config from params map (`addr`, optional `max_packet_size`)
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let max_packet_size = match params.get("max_packet_size") {
            Some(s) => s
                .parse::<usize>()
                .map_err(|e| format!("invalid max_packet_size '{}': {}", s, e))?
                .min(MAX_UDP_PAYLOAD),
            None => MAX_UDP_PAYLOAD,
        };

        Ok(Self {
            addr,
            max_packet_size,
        })
    }
}

/// Sink that sends events to a UDP collector
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    socket: Option<UdpSocket>,
}

impl NetworkSink {
    #[instrument(name = "network_sink_new", skip(name, config), fields(target = %config.addr))]
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let bind_addr = if config.addr.is_ipv6() {
            "[::]:0"
        } else {
            "0.0.0.0:0"
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(&config.addr).await?;

        debug!(sink = %name, target = %config.addr, "NetworkSink connected");

        Ok(Self {
            name,
            config,
            socket: Some(socket),
        })
    }

    /// Create from params (for factory)
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = NetworkSinkConfig::from_params(params)
            .map_err(|e| ContractError::sink_connection(&name, e))?;

        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))
    }

    fn socket(&self) -> Result<&UdpSocket, ContractError> {
        self.socket
            .as_ref()
            .ok_or_else(|| ContractError::sink_write(&self.name, "socket not connected"))
    }

    fn encode(&self, event: &TaskEvent) -> Result<Vec<u8>, ContractError> {
        let data = serde_json::to_vec(event).map_err(|e| ContractError::EventEncode {
            task_id: event.task_id.clone(),
            message: e.to_string(),
        })?;

        if data.len() > self.config.max_packet_size {
            return Err(ContractError::EventEncode {
                task_id: event.task_id.clone(),
                message: format!(
                    "{} bytes exceeds max packet size {}",
                    data.len(),
                    self.config.max_packet_size
                ),
            });
        }

        Ok(data)
    }
}

impl EventSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_sink_write",
        skip(self, event),
        fields(sink = %self.name, task_id = %event.task_id)
    )]
    async fn write(&mut self, event: &TaskEvent) -> Result<(), ContractError> {
        let data = self.encode(event)?;
        let sent = self
            .socket()?
            .send(&data)
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;

        debug!(sink = %self.name, bytes = sent, "Sent");
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "network_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.socket = None;
        debug!(sink = %self.name, "NetworkSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::sample_event;
    use contracts::TaskEventKind;

    #[test]
    fn test_config_parsing() {
        let mut params = HashMap::new();
        params.insert("addr".to_string(), "127.0.0.1:9999".to_string());

        let config = NetworkSinkConfig::from_params(&params).unwrap();
        assert_eq!(config.addr.port(), 9999);
        assert_eq!(config.max_packet_size, MAX_UDP_PAYLOAD);

        params.insert("max_packet_size".to_string(), "1200".to_string());
        let config = NetworkSinkConfig::from_params(&params).unwrap();
        assert_eq!(config.max_packet_size, 1200);
    }

    #[test]
    fn test_config_errors() {
        assert!(NetworkSinkConfig::from_params(&HashMap::new()).is_err());

        let params = HashMap::from([("addr".to_string(), "not-an-addr".to_string())]);
        let err = NetworkSinkConfig::from_params(&params).unwrap_err();
        assert!(err.contains("invalid address"));
    }

    #[tokio::test]
    async fn test_network_sink_delivers_json() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = NetworkSinkConfig {
            addr: receiver.local_addr().unwrap(),
            max_packet_size: MAX_UDP_PAYLOAD,
        };

        let mut sink = NetworkSink::new("test_net", config).await.unwrap();
        sink.write(&sample_event(TaskEventKind::Failure)).await.unwrap();

        let mut buf = vec![0u8; MAX_UDP_PAYLOAD];
        let len = receiver.recv(&mut buf).await.unwrap();
        let event: TaskEvent = serde_json::from_slice(&buf[..len]).unwrap();
        assert_eq!(event.kind, TaskEventKind::Failure);
    }

    #[tokio::test]
    async fn test_oversized_event_rejected() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = NetworkSinkConfig {
            addr: receiver.local_addr().unwrap(),
            max_packet_size: 16,
        };

        let mut sink = NetworkSink::new("tiny", config).await.unwrap();
        let err = sink
            .write(&sample_event(TaskEventKind::Failure))
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::EventEncode { .. }));
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = NetworkSinkConfig {
            addr: receiver.local_addr().unwrap(),
            max_packet_size: MAX_UDP_PAYLOAD,
        };

        let mut sink = NetworkSink::new("closed", config).await.unwrap();
        sink.close().await.unwrap();
        assert!(sink.write(&sample_event(TaskEventKind::Success)).await.is_err());
    }
}
