//! HubBlueprint - Config Loader 输出
//!
//! 描述完整的 hub 配置：UDP 监听、任务事件队列、指标导出、输出路由。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use crate::QueueSettings;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的 hub 配置蓝图
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct HubBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// UDP 监听设置
    #[serde(default)]
    #[validate(nested)]
    pub udp: UdpConfig,

    /// 任务事件队列设置
    #[serde(default)]
    #[validate(nested)]
    pub task_events: QueueSettings,

    /// 指标导出设置
    #[serde(default)]
    #[validate(nested)]
    pub metrics: MetricsConfig,

    /// 输出路由配置
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// UDP 监听配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UdpConfig {
    /// 监听地址
    #[serde(default = "default_udp_host")]
    #[validate(length(min = 1, message = "host cannot be empty"))]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_udp_port")]
    pub port: u16,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            host: default_udp_host(),
            port: default_udp_port(),
        }
    }
}

fn default_udp_host() -> String {
    "0.0.0.0".to_string()
}

fn default_udp_port() -> u16 {
    9998
}

/// 指标导出配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MetricsConfig {
    /// 是否周期性导出队列指标
    #[serde(default = "default_true")]
    pub enable: bool,

    /// 导出周期 (毫秒)
    #[serde(default = "default_write_frequency_ms")]
    #[validate(range(min = 1, message = "write_frequency_ms must be > 0"))]
    pub write_frequency_ms: u64,

    /// Prometheus 端口 (None = 禁用)
    #[serde(default)]
    pub prometheus_port: Option<u16>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enable: true,
            write_frequency_ms: default_write_frequency_ms(),
            prometheus_port: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_write_frequency_ms() -> u64 {
    20_000
}

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink 名称
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// 只转发告警事件 (failure / aborted)
    #[serde(default)]
    pub alerts_only: bool,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 日志输出
    Log,
    /// 文件输出 (JSON lines)
    File,
    /// 网络输出 (UDP)
    Network,
}

impl HubBlueprint {
    /// UDP 监听地址 `host:port`
    pub fn udp_bind_addr(&self) -> String {
        format!("{}:{}", self.udp.host, self.udp.port)
    }
}
