//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON 格式。

use contracts::{ContractError, HubBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<HubBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<HubBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<HubBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SinkType;

    #[test]
    fn test_parse_toml_sections() {
        let content = r#"
[udp]
host = "127.0.0.1"
port = 9100

[task_events.message_queue]
max_concurrent = 5
max_size = 50
backpressure_threshold = 75.0

[task_events.rate_limit]
enable = true
max_messages_per_minute = 600

[metrics]
write_frequency_ms = 5000

[[sinks]]
name = "alerts"
sink_type = "file"
alerts_only = true
params = { path = "/var/log/ops-hub/alerts.jsonl" }
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.udp_bind_addr(), "127.0.0.1:9100");
        assert_eq!(bp.task_events.message_queue.max_concurrent, 5);
        assert_eq!(bp.task_events.message_queue.max_size, 50);
        assert_eq!(bp.task_events.rate_limit.max_messages_per_minute, Some(600));
        // Omitted fields fall back to defaults
        assert_eq!(bp.task_events.max_message_size, 65_507);
        assert_eq!(bp.metrics.write_frequency_ms, 5000);
        assert_eq!(bp.sinks[0].sink_type, SinkType::File);
        assert_eq!(bp.sinks[0].params["path"], "/var/log/ops-hub/alerts.jsonl");
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "task_events": { "message_queue": { "max_concurrent": 2 } },
            "sinks": [{ "name": "log", "sink_type": "log" }]
        }"#;
        let bp = parse_json(content).unwrap();
        assert_eq!(bp.task_events.message_queue.max_concurrent, 2);
        assert_eq!(bp.task_events.message_queue.max_size, 200);
        assert_eq!(bp.sinks.len(), 1);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let result = parse_toml("invalid toml [[[");
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_parse_unknown_sink_type() {
        let content = r#"
[[sinks]]
name = "mail"
sink_type = "smtp"
"#;
        assert!(parse_toml(content).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
