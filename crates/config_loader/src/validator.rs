//! 配置校验模块
//!
//! 两层校验：
//! - 字段范围：由 `validator` derive 定义在 contracts 中
//! - 跨字段规则：
//!   - rate_limit.enable 时必须提供 max_messages_per_minute
//!   - sink name 非空且唯一
//!   - network sink 必须提供合法的 `addr`

use std::collections::HashSet;
use std::net::SocketAddr;

use contracts::{ContractError, HubBlueprint, SinkType};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// 校验 HubBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &HubBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| to_contract_error(&errors))?;
    validate_rate_limit(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// 把 derive 校验错误转为第一个字段错误 (按字段名排序，结果稳定)
fn to_contract_error(errors: &ValidationErrors) -> ContractError {
    match first_field_error(errors, String::new()) {
        Some((field, message)) => ContractError::config_validation(field, message),
        None => ContractError::config_validation("<root>", errors.to_string()),
    }
}

fn first_field_error(errors: &ValidationErrors, prefix: String) -> Option<(String, String)> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (name, kind) in fields {
        let path = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        };

        let found = match kind {
            ValidationErrorsKind::Field(list) => list.first().map(|e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                (path.clone(), message)
            }),
            ValidationErrorsKind::Struct(inner) => first_field_error(inner, path),
            ValidationErrorsKind::List(items) => items
                .iter()
                .find_map(|(idx, inner)| first_field_error(inner, format!("{path}[{idx}]"))),
        };

        if found.is_some() {
            return found;
        }
    }
    None
}

/// 校验限流配置
fn validate_rate_limit(blueprint: &HubBlueprint) -> Result<(), ContractError> {
    let rate_limit = &blueprint.task_events.rate_limit;
    if rate_limit.enable && rate_limit.max_messages_per_minute.is_none() {
        return Err(ContractError::config_validation(
            "task_events.rate_limit.max_messages_per_minute",
            "required when rate limiting is enabled",
        ));
    }
    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(blueprint: &HubBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();

    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }

        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }

        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{}].queue_capacity", sink.name),
                "queue_capacity must be > 0",
            ));
        }

        if sink.sink_type == SinkType::Network {
            let addr = sink.params.get("addr").ok_or_else(|| {
                ContractError::config_validation(
                    format!("sinks[{}].params.addr", sink.name),
                    "network sink requires 'addr'",
                )
            })?;
            addr.parse::<SocketAddr>().map_err(|e| {
                ContractError::config_validation(
                    format!("sinks[{}].params.addr", sink.name),
                    format!("invalid address '{addr}': {e}"),
                )
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SinkConfig;
    use std::collections::HashMap;

    fn sink(name: &str, sink_type: SinkType) -> SinkConfig {
        SinkConfig {
            name: name.into(),
            sink_type,
            queue_capacity: 100,
            alerts_only: false,
            params: HashMap::new(),
        }
    }

    fn minimal_blueprint() -> HubBlueprint {
        HubBlueprint {
            sinks: vec![sink("log", SinkType::Log)],
            ..Default::default()
        }
    }

    fn field_of(err: ContractError) -> String {
        match err {
            ContractError::ConfigValidation { field, .. } => field,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&minimal_blueprint()).is_ok());
    }

    #[test]
    fn test_nested_range_error_has_path() {
        let mut bp = minimal_blueprint();
        bp.task_events.message_queue.max_concurrent = 0;

        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("max_concurrent must be > 0"));
        assert_eq!(field_of(err), "task_events.message_queue.max_concurrent");
    }

    #[test]
    fn test_threshold_out_of_range() {
        let mut bp = minimal_blueprint();
        bp.task_events.message_queue.backpressure_threshold = 120.0;
        assert_eq!(
            field_of(validate(&bp).unwrap_err()),
            "task_events.message_queue.backpressure_threshold"
        );
    }

    #[test]
    fn test_rate_limit_requires_max() {
        let mut bp = minimal_blueprint();
        bp.task_events.rate_limit.enable = true;
        assert_eq!(
            field_of(validate(&bp).unwrap_err()),
            "task_events.rate_limit.max_messages_per_minute"
        );

        bp.task_events.rate_limit.max_messages_per_minute = Some(100);
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_zero_metrics_interval() {
        let mut bp = minimal_blueprint();
        bp.metrics.write_frequency_ms = 0;
        assert_eq!(
            field_of(validate(&bp).unwrap_err()),
            "metrics.write_frequency_ms"
        );
    }

    #[test]
    fn test_duplicate_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks.push(sink("log", SinkType::File));
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_empty_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks.push(sink("  ", SinkType::Log));
        assert_eq!(field_of(validate(&bp).unwrap_err()), "sinks[1].name");
    }

    #[test]
    fn test_network_sink_addr() {
        let mut bp = minimal_blueprint();
        bp.sinks.push(sink("forward", SinkType::Network));
        assert!(validate(&bp).is_err());

        bp.sinks[1]
            .params
            .insert("addr".into(), "collector:9000".into());
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("invalid address"));

        bp.sinks[1]
            .params
            .insert("addr".into(), "10.0.0.5:9000".into());
        assert!(validate(&bp).is_ok());
    }
}
