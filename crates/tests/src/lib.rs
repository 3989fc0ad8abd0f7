//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置 → 队列 → 分发 的 e2e 测试
//! - 准入控制容量与计数不变量
//! - 告警路由 (alerts_only)

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use ingestion::QueueManager;

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }

    /// TOML 配置直接驱动 QueueManager
    #[test]
    fn test_queue_from_toml_settings() {
        let toml = r#"
            [task_events.message_queue]
            max_concurrent = 5
            max_size = 10
            backpressure_threshold = 80.0

            [task_events.rate_limit]
            enable = true
            max_messages_per_minute = 600
        "#;

        let blueprint = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();
        let queue = QueueManager::from_settings("task_events", &blueprint.task_events).unwrap();

        assert_eq!(queue.config().max_concurrent, 5);
        assert_eq!(queue.config().max_size, 10);
        assert_eq!(queue.config().max_messages_per_minute, Some(600));
    }

    /// 启用限流但未设置上限时配置加载失败
    #[test]
    fn test_rate_limit_without_max_rejected() {
        let toml = r#"
            [task_events.rate_limit]
            enable = true
        "#;

        assert!(ConfigLoader::load_from_str(toml, ConfigFormat::Toml).is_err());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;

    use contracts::{SinkConfig, SinkType, TaskEvent, TaskEventKind};
    use dispatcher::create_dispatcher;
    use ingestion::{parse_task_event, QueueManager, QueueManagerConfig};
    use tempfile::tempdir;

    fn datagram(topic: &str, task_id: &str) -> Vec<u8> {
        format!(
            "/scheduler-task-{topic}/;node1;Reload {task_id};Sales;INTERNAL\\sa_scheduler;{task_id};app-1;2024-05-01 10:00:00;INFO;exec-{task_id};Task finished"
        )
        .into_bytes()
    }

    fn file_sink(name: &str, path: &std::path::Path, alerts_only: bool) -> SinkConfig {
        SinkConfig {
            name: name.to_string(),
            sink_type: SinkType::File,
            queue_capacity: 50,
            alerts_only,
            params: HashMap::from([("path".to_string(), path.display().to_string())]),
        }
    }

    fn read_events(path: &std::path::Path) -> Vec<TaskEvent> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    /// End-to-end: datagram → parse → QueueManager → Dispatcher → file sink
    ///
    /// 验证完整的数据流：
    /// 1. 报文解析为 TaskEvent
    /// 2. QueueManager 准入并调度处理
    /// 3. Dispatcher 将事件写入 JSON lines 文件
    #[tokio::test]
    async fn test_e2e_datagrams_to_file_sink() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        let dispatcher = create_dispatcher(&[file_sink("file", &path, false)])
            .await
            .unwrap();
        let queue = QueueManager::new("task_events", QueueManagerConfig::default()).unwrap();

        let datagrams = [
            datagram("failed", "t-1"),
            datagram("success", "t-2"),
            datagram("aborted", "t-3"),
        ];

        for raw in &datagrams {
            assert!(queue.validate_message_size(raw));
            assert!(queue.check_rate_limit());
            let event = parse_task_event(raw).unwrap();
            let dispatcher = dispatcher.clone();
            assert!(
                queue
                    .add_to_queue(async move { dispatcher.dispatch(event).await })
                    .await
            );
        }

        queue.wait_idle().await;

        let metrics = queue.get_metrics().await;
        assert_eq!(metrics.messages_received, 3);
        assert_eq!(metrics.messages_queued, 3);
        assert_eq!(metrics.messages_processed, 3);
        assert_eq!(metrics.messages_processed_successful, 3);
        assert_eq!(metrics.messages_failed, 0);

        let sink_metrics = dispatcher.metrics();
        assert_eq!(sink_metrics[0].1.write_count, 3);
        dispatcher.shutdown().await;

        let mut ids: Vec<_> = read_events(&path)
            .into_iter()
            .map(|e| e.task_id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["t-1", "t-2", "t-3"]);
    }

    /// alerts_only sink 只接收 failure / aborted
    #[tokio::test]
    async fn test_alerts_only_routing() {
        let dir = tempdir().unwrap();
        let all_path = dir.path().join("all.jsonl");
        let alert_path = dir.path().join("alerts.jsonl");

        let dispatcher = create_dispatcher(&[
            file_sink("all", &all_path, false),
            file_sink("alerts", &alert_path, true),
        ])
        .await
        .unwrap();

        for raw in [
            datagram("success", "t-1"),
            datagram("failed", "t-2"),
            datagram("success", "t-3"),
            datagram("aborted", "t-4"),
        ] {
            dispatcher
                .dispatch(parse_task_event(&raw).unwrap())
                .await
                .unwrap();
        }

        let metrics: HashMap<_, _> = dispatcher.metrics().into_iter().collect();
        assert_eq!(metrics["all"].write_count, 4);
        assert_eq!(metrics["alerts"].write_count, 2);
        assert_eq!(metrics["alerts"].skipped_count, 2);
        dispatcher.shutdown().await;

        assert_eq!(read_events(&all_path).len(), 4);
        let alerts = read_events(&alert_path);
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|e| e.kind != TaskEventKind::Success));
    }
}

#[cfg(test)]
mod admission_tests {
    use contracts::QueueMetricsSnapshot;
    use ingestion::{QueueManager, QueueManagerConfig};
    use tokio::sync::watch;

    fn queue(max_concurrent: usize, max_size: usize) -> QueueManager {
        QueueManager::new(
            "task_events",
            QueueManagerConfig {
                max_concurrent,
                max_size,
                ..Default::default()
            },
        )
        .unwrap()
    }

    /// 在 gate 打开前一直挂起的处理任务
    fn slow_task(
        gate: &watch::Receiver<bool>,
    ) -> impl std::future::Future<Output = Result<(), String>> + Send + 'static {
        let mut gate = gate.clone();
        async move {
            let _ = gate.wait_for(|open| *open).await;
            Ok(())
        }
    }

    fn assert_invariants(m: &QueueMetricsSnapshot) {
        assert_eq!(
            m.messages_received,
            m.messages_queued + m.messages_dropped_total
        );
        assert_eq!(
            m.messages_dropped_total,
            m.messages_dropped_rate_limit + m.messages_dropped_queue_full + m.messages_dropped_size
        );
        assert!(m.messages_processed <= m.messages_queued);
        assert!(m.queue_size <= m.queue_max_size);
    }

    /// 5 个并发 + 10 个等待全部接受，第 16 个被拒绝
    #[tokio::test]
    async fn test_capacity_concurrent_plus_waiting() {
        let queue = queue(5, 10);
        let (gate_tx, gate_rx) = watch::channel(false);

        for _ in 0..15 {
            assert!(queue.add_to_queue(slow_task(&gate_rx)).await);
        }
        assert_eq!(queue.pending(), 5);
        assert_eq!(queue.queue_size(), 10);

        assert!(!queue.add_to_queue(slow_task(&gate_rx)).await);

        let m = queue.get_metrics().await;
        assert_eq!(m.messages_queued, 15);
        assert_eq!(m.messages_dropped_queue_full, 1);
        assert!((m.queue_utilization_pct - 100.0).abs() < 1e-9);
        assert_eq!(m.backpressure_active, 1);
        assert_invariants(&m);

        gate_tx.send(true).unwrap();
        queue.wait_idle().await;

        let m = queue.get_metrics().await;
        assert_eq!(m.messages_processed, 15);
        assert_eq!(m.queue_size, 0);
        assert_invariants(&m);
    }

    /// 所有丢弃路径下计数器保持一致
    #[tokio::test]
    async fn test_counter_invariants_across_paths() {
        let queue = QueueManager::new(
            "task_events",
            QueueManagerConfig {
                max_concurrent: 1,
                max_size: 1,
                max_messages_per_minute: Some(3),
                max_message_size: 8,
                ..Default::default()
            },
        )
        .unwrap();
        let (gate_tx, gate_rx) = watch::channel(false);

        for payload in [&b"ok"[..], b"ok", b"ok", b"ok", b"way too large"] {
            if !queue.validate_message_size(payload) {
                queue.handle_size_drop().await;
                continue;
            }
            if !queue.check_rate_limit() {
                queue.handle_rate_limit_drop().await;
                continue;
            }
            queue.add_to_queue(slow_task(&gate_rx)).await;
        }

        let m = queue.get_metrics().await;
        assert_eq!(m.messages_received, 5);
        assert_eq!(m.messages_queued, 2);
        assert_eq!(m.messages_dropped_queue_full, 1);
        assert_eq!(m.messages_dropped_rate_limit, 1);
        assert_eq!(m.messages_dropped_size, 1);
        assert_invariants(&m);

        gate_tx.send(true).unwrap();
        queue.wait_idle().await;
    }

    /// clear_metrics 只清零计数器，不影响队列内容
    #[tokio::test]
    async fn test_clear_metrics_preserves_queue() {
        let queue = queue(1, 5);
        let (gate_tx, gate_rx) = watch::channel(false);

        for _ in 0..4 {
            assert!(queue.add_to_queue(slow_task(&gate_rx)).await);
        }

        queue.clear_metrics().await;

        let m = queue.get_metrics().await;
        assert_eq!(m.messages_received, 0);
        assert_eq!(m.messages_queued, 0);
        assert_eq!(m.queue_size, 3);
        assert_eq!(m.queue_pending, 1);
        assert_eq!(m.messages_received_last_minute, 4);

        gate_tx.send(true).unwrap();
        queue.wait_idle().await;
        assert_eq!(queue.get_metrics().await.messages_processed, 4);
    }
}
