//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - Wire layouts shared between crates
//! - Batching timeline against a paused clock
//! - Full bridge runs against stub log services (TCP protocol and HTTP)

/// Minimal log services speaking just enough of each protocol
#[cfg(test)]
mod stubs {
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    use dispatcher::protocol::frame_codec;
    use dispatcher::{AppendRequest, AppendResponse};
    use futures::{SinkExt, StreamExt};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio_util::codec::Framed;

    /// Log-append server acking every request with a running offset
    pub async fn log_service() -> (SocketAddr, Arc<Mutex<Vec<AppendRequest>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&received);
        tokio::spawn(async move {
            let mut next_offset = 0u64;
            while let Ok((stream, _)) = listener.accept().await {
                let mut framed = Framed::new(stream, frame_codec());
                while let Some(Ok(frame)) = framed.next().await {
                    let request = AppendRequest::decode(frame.freeze()).unwrap();
                    let base_offset = next_offset;
                    next_offset += request.records.len() as u64;
                    log.lock().unwrap().push(request);
                    let ack = AppendResponse::Ack { base_offset }.encode();
                    if framed.send(ack).await.is_err() {
                        break;
                    }
                }
            }
        });

        (addr, received)
    }

    /// HTTP server answering requests with `statuses` in turn, then 200
    ///
    /// Returns the raw request heads.
    pub async fn http_service(statuses: Vec<u16>) -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            let mut statuses = statuses.into_iter();
            while let Ok((mut stream, _)) = listener.accept().await {
                let Some(head) = read_request(&mut stream).await else {
                    continue;
                };
                log.lock().unwrap().push(head);

                let status = statuses.next().unwrap_or(200);
                let body = if status == 200 { r#"{"offsets":[{"partition":0,"offset":7}]}"# } else { r#"{"error_code":50001}"# };
                let response = format!(
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });

        (addr, requests)
    }

    async fn read_request(stream: &mut tokio::net::TcpStream) -> Option<String> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).into_owned();
                let len = head
                    .to_ascii_lowercase()
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:").map(|v| v.trim().to_string()))
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + len {
                    return Some(head);
                }
            }
        }
    }
}

#[cfg(test)]
mod contract_tests {
    use codec::Packet;
    use contracts::{SensorRecord, DEFAULT_TAG};
    use ingestion::{encode_record, RecordDecoder};

    #[test]
    fn test_record_packet_layout() {
        let record = SensorRecord::new(42.5, 1_700_000_000_000, "mic-1");
        let frame = encode_record(DEFAULT_TAG, &record).unwrap();

        // Node header carries the subscribed tag
        assert_eq!(frame[0], DEFAULT_TAG | codec::NODE_FLAG);

        let packet = Packet::decode(&frame).unwrap();
        let tags: Vec<u8> = packet.children().unwrap().iter().map(|c| c.tag()).collect();
        assert_eq!(tags, vec![ingestion::NOISE_TAG, ingestion::TIME_TAG, ingestion::FROM_TAG]);

        let decoded = RecordDecoder::new(DEFAULT_TAG).decode_frame(&frame).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_default_config_is_valid() {
        let mut config = contracts::BridgeConfig::default();
        config_loader::ConfigLoader::validate(&mut config).unwrap();
        assert_eq!(config.subscription.tag, DEFAULT_TAG);
    }
}

#[cfg(test)]
mod timeline_tests {
    use std::time::Duration;

    use batcher::Batcher;
    use contracts::{BatchConfig, FlushReason, SensorRecord, WindowAnchor};
    use tokio::sync::mpsc;
    use tokio::time::{advance, Instant};

    /// Timer deadlines round up to the next millisecond tick
    fn assert_at(start: Instant, expected_ms: u64) {
        let elapsed = start.elapsed();
        let expected = Duration::from_millis(expected_ms);
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(2),
            "expected ~{expected_ms}ms, got {elapsed:?}"
        );
    }

    /// size 2, window 1000ms: R1@0, R2@50, R3@900 -> [R1,R2]@50, [R3]@1000
    #[tokio::test(start_paused = true)]
    async fn test_count_then_window_timeline() {
        let config = BatchConfig {
            max_batch_size: 2,
            max_window_ms: 1000,
            window_anchor: WindowAnchor::Cadence,
            ..Default::default()
        };
        let (record_tx, record_rx) = async_channel::bounded(16);
        let (batch_tx, mut batch_rx) = mpsc::channel(4);

        let start = Instant::now();
        let handle = Batcher::new(config).spawn(record_rx, batch_tx);

        let feeder = tokio::spawn(async move {
            record_tx.send(SensorRecord::new(1.0, 0, "r1")).await.unwrap();
            advance(Duration::from_millis(50)).await;
            record_tx.send(SensorRecord::new(2.0, 50, "r2")).await.unwrap();
            tokio::time::sleep_until(start + Duration::from_millis(900)).await;
            record_tx.send(SensorRecord::new(3.0, 900, "r3")).await.unwrap();
            // Keep the input open past the window end
            tokio::time::sleep_until(start + Duration::from_millis(1500)).await;
        });

        let first = batch_rx.recv().await.unwrap();
        assert_at(start, 50);
        assert_eq!(first.reason, FlushReason::Count);
        assert_eq!(first.sequence, 1);
        let sources: Vec<_> = first.records.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(sources, vec!["r1", "r2"]);

        let second = batch_rx.recv().await.unwrap();
        assert_at(start, 1000);
        assert_eq!(second.reason, FlushReason::Timer);
        assert_eq!(second.sequence, 2);
        assert_eq!(second.records.len(), 1);
        assert_eq!(second.records[0].source, "r3");

        feeder.await.unwrap();
        let snapshot = handle.await.unwrap();
        assert_eq!(snapshot.records, 3);
        assert_eq!(snapshot.count_flushes, 1);
        assert_eq!(snapshot.timer_flushes, 1);
        assert_eq!(snapshot.shutdown_flushes, 0);
        assert!(batch_rx.recv().await.is_none());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::time::Duration;

    use codec::PacketCodec;
    use contracts::{BridgeConfig, RawPacket, SensorRecord, TransportKind, DEFAULT_TAG};
    use dispatcher::AnyAppender;
    use futures::{SinkExt, StreamExt};
    use ingestion::{encode_record, ChannelSink, ChannelSource, StopReason, TcpPacketServer};
    use orchestrator::{decode_outcome, Pipeline, PipelineError};
    use tokio::net::TcpStream;
    use tokio::time::timeout;
    use tokio_util::codec::Framed;
    use tokio_util::sync::CancellationToken;

    use crate::stubs;

    fn base_config(transport: TransportKind, endpoint: String) -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.destination.transport = transport;
        config.destination.endpoint = endpoint;
        config.destination.topic = "noise".into();
        config.destination.request_timeout_ms = 2_000;
        config.batch.max_batch_size = 3;
        config.batch.max_window_ms = 200;
        config.retry.initial_backoff_ms = 10;
        config.retry.max_backoff_ms = 20;
        config
    }

    fn reading(i: i64) -> RawPacket {
        let record = SensorRecord::new(40.0 + i as f32, 1_000 + i, format!("mic-{i}"));
        RawPacket::new(DEFAULT_TAG, encode_record(DEFAULT_TAG, &record).unwrap())
    }

    /// Producer -> packet server -> pipeline -> TCP log service, outcomes back to the producer
    #[tokio::test]
    async fn test_tcp_bridge_roundtrip() {
        let (log_addr, appended) = stubs::log_service().await;
        let mut config = base_config(TransportKind::Tcp, log_addr.to_string());
        config.subscription.listen_addr = "127.0.0.1:0".into();
        // Only the count trigger may close windows here
        config.batch.max_window_ms = 10_000;

        let mut server = TcpPacketServer::bind("127.0.0.1:0", 64).await.unwrap();
        let server_addr = server.local_addr();
        let source = server.take_source().unwrap();
        let sink = server.sink();
        let appender = AnyAppender::from_config(&config.destination).unwrap();

        let shutdown = CancellationToken::new();
        let pipeline = Pipeline::new(config);
        let token = shutdown.clone();
        let run = tokio::spawn(async move { pipeline.run(source, sink, appender, token).await });

        let stream = TcpStream::connect(server_addr).await.unwrap();
        let mut producer = Framed::new(stream, PacketCodec::default());

        // A foreign tag in the middle is skipped
        for i in 0..3 {
            producer.send(reading(i)).await.unwrap();
        }
        let foreign = encode_record(0x20, &SensorRecord::new(0.0, 0, "other")).unwrap();
        producer.send(RawPacket::new(0x20, foreign)).await.unwrap();
        for i in 3..6 {
            producer.send(reading(i)).await.unwrap();
        }

        let mut outcomes = Vec::new();
        while outcomes.len() < 2 {
            let packet = timeout(Duration::from_secs(5), producer.next())
                .await
                .expect("outcome not received")
                .unwrap()
                .unwrap();
            assert_eq!(packet.tag, DEFAULT_TAG);
            outcomes.push(decode_outcome(&packet).unwrap());
        }

        assert_eq!(outcomes[0].outcome.batch_sequence, 1);
        assert_eq!(outcomes[1].outcome.batch_sequence, 2);
        for message in &outcomes {
            assert!(message.outcome.success);
            assert_eq!(message.outcome.item_count, 3);
            assert_eq!(message.outcome.attempts, 1);
            assert_eq!(message.message, "write 3 items to log successfully");
        }
        assert_eq!(outcomes[1].outcome.detail, "base_offset=3");

        shutdown.cancel();
        let stats = timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(stats.stop_reason, Some(StopReason::Cancelled));
        assert_eq!(stats.ingestion.records_decoded, 6);
        assert_eq!(stats.ingestion.packets_ignored, 1);
        assert_eq!(stats.dispatcher.succeeded, 2);
        assert_eq!(stats.outcomes_published, 2);

        let appended = appended.lock().unwrap();
        assert_eq!(appended.len(), 2);
        assert!(appended.iter().all(|r| r.topic == "noise" && r.records.len() == 3));
        let first: serde_json::Value = serde_json::from_slice(&appended[0].records[0]).unwrap();
        assert_eq!(first["from"], "mic-0");
        assert_eq!(first["time"], 1_000);
    }

    /// A partial window flushed at shutdown still reaches the producer
    #[tokio::test]
    async fn test_shutdown_outcome_reaches_producer() {
        let (log_addr, appended) = stubs::log_service().await;
        let mut config = base_config(TransportKind::Tcp, log_addr.to_string());
        config.batch.max_batch_size = 10;
        config.batch.max_window_ms = 60_000;

        let mut server = TcpPacketServer::bind("127.0.0.1:0", 64).await.unwrap();
        let server_addr = server.local_addr();
        let source = server.take_source().unwrap();
        let sink = server.sink();
        let appender = AnyAppender::from_config(&config.destination).unwrap();

        let shutdown = CancellationToken::new();
        let pipeline = Pipeline::new(config);
        let token = shutdown.clone();
        let run = tokio::spawn(async move { pipeline.run(source, sink, appender, token).await });

        let stream = TcpStream::connect(server_addr).await.unwrap();
        let mut producer = Framed::new(stream, PacketCodec::default());
        producer.send(reading(0)).await.unwrap();
        producer.send(reading(1)).await.unwrap();

        // Both readings must be decoded before shutdown fires
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.cancel();

        let packet = timeout(Duration::from_secs(5), producer.next())
            .await
            .expect("shutdown outcome not received")
            .unwrap()
            .unwrap();
        let message = decode_outcome(&packet).unwrap();
        assert!(message.outcome.success);
        assert_eq!(message.outcome.item_count, 2);
        assert_eq!(message.outcome.batch_sequence, 1);

        let stats = timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(stats.batcher.shutdown_flushes, 1);
        assert_eq!(stats.outcomes_published, 1);
        assert_eq!(stats.publish_errors, 0);
        assert_eq!(appended.lock().unwrap().len(), 1);

        server.shutdown();
        let closed = timeout(Duration::from_secs(5), producer.next()).await.unwrap();
        assert!(closed.is_none());
    }

    /// A 500 is retried; the batch succeeds on the second attempt
    #[tokio::test]
    async fn test_http_bridge_retries_server_error() {
        let (http_addr, requests) = stubs::http_service(vec![500]).await;
        let mut config = base_config(TransportKind::Http, format!("http://{http_addr}"));
        config.destination.probe_on_startup = false;
        config.batch.max_batch_size = 2;

        let (packet_tx, source) = ChannelSource::pair("producer", 16);
        let (sink, mut outcome_rx) = ChannelSink::pair("outcomes", 16);
        let appender = AnyAppender::from_config(&config.destination).unwrap();

        let pipeline = Pipeline::new(config);
        let run = tokio::spawn(async move {
            pipeline
                .run(source, sink, appender, CancellationToken::new())
                .await
        });

        packet_tx.send(reading(1)).await.unwrap();
        packet_tx.send(reading(2)).await.unwrap();
        drop(packet_tx);

        let stats = timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(stats.stop_reason, Some(StopReason::SourceClosed));
        assert_eq!(stats.dispatcher.succeeded, 1);
        assert_eq!(stats.dispatcher.retries, 1);

        let packet = outcome_rx.recv().await.unwrap();
        let message = decode_outcome(&packet).unwrap();
        assert!(message.outcome.success);
        assert_eq!(message.outcome.attempts, 2);
        assert_eq!(message.outcome.item_count, 2);
        assert!(outcome_rx.recv().await.is_none());

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|head| head.starts_with("POST /topics/noise ")));
    }

    /// Startup probe against a closed port fails before anything is consumed
    #[tokio::test]
    async fn test_unreachable_destination_fails_startup() {
        let closed = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let mut config = base_config(TransportKind::Tcp, closed.to_string());
        config.destination.probe_on_startup = true;

        let (packet_tx, source) = ChannelSource::pair("producer", 4);
        let (sink, _outcome_rx) = ChannelSink::pair("outcomes", 4);
        let appender = AnyAppender::from_config(&config.destination).unwrap();

        packet_tx.send(reading(1)).await.unwrap();
        let result = Pipeline::new(config)
            .run(source, sink, appender, CancellationToken::new())
            .await;

        assert!(matches!(result, Err(PipelineError::Startup(_))));
    }
}
