#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use anyhow::Result;
    use futures::future::join_all;
    use url_sifter::offload::{ChannelState, OffloadChannel, WorkerResponse};
    use url_sifter::{
        ExecutionMode, Operation, OperationRequest, ProcessOptions, ProcessingError, ProcessorConfig, UrlProcessor,
    };

    fn numbered(count: usize) -> Vec<String> {
        (0..count)
            .map(|i| format!("https://host{}.example.com/path/{}?page={}", i % 97, i, i % 3))
            .collect()
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_channel() -> Result<()> {
        let channel = OffloadChannel::initialize(ProcessorConfig::default()).await?;
        let remove = OperationRequest::new(Operation::RemoveParams);
        let dedup = OperationRequest::new(Operation::DeduplicateDomain);
        let sort = OperationRequest::new(Operation::SortByLength);

        let calls = vec![
            channel.process(numbered(300), &remove, None, None),
            channel.process(numbered(300), &dedup, None, None),
            channel.process(numbered(300), &sort, None, None),
        ];
        let outcomes = join_all(calls).await;

        assert_eq!(outcomes.len(), 3);
        let results = outcomes.into_iter().collect::<Result<Vec<_>, ProcessingError>>()?;
        assert!(results[0].results.iter().all(|u| !u.contains('?')));
        assert_eq!(results[1].output_count, 97);
        assert_eq!(results[2].output_count, 300);
        assert_eq!(channel.pending_count(), 0);
        assert_eq!(channel.state(), ChannelState::Ready);
        Ok(())
    }

    #[tokio::test]
    async fn test_progress_is_forwarded_from_worker() -> Result<()> {
        let channel = OffloadChannel::initialize(ProcessorConfig::default()).await?;
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();

        let result = channel
            .process(
                numbered(2000),
                &OperationRequest::new(Operation::ExtractTld),
                Some(Arc::new(move |event| sink.lock().unwrap().push(event))),
                Some(100),
            )
            .await?;

        let events = events.lock().unwrap();
        // The first progress message always passes the throttle
        assert!(!events.is_empty());
        assert!(events.windows(2).all(|w| w[0].processed_count <= w[1].processed_count));
        assert!(events.iter().all(|e| e.total_count == result.input_count));
        Ok(())
    }

    #[tokio::test]
    async fn test_channel_fault_rejects_every_pending_request() -> Result<()> {
        let channel = OffloadChannel::initialize_with(Duration::from_secs(5), |mut endpoint| {
            endpoint
                .responses
                .send(serde_json::to_string(&WorkerResponse::ready()).unwrap())
                .unwrap();
            // Take two requests, then crash without answering either
            let _ = endpoint.requests.blocking_recv();
            let _ = endpoint.requests.blocking_recv();
        })
        .await?;

        let request = OperationRequest::new(Operation::KeepTld);
        let outcomes = join_all(vec![
            channel.process(numbered(10), &request, None, None),
            channel.process(numbered(10), &request, None, None),
        ])
        .await;

        for outcome in outcomes {
            assert!(matches!(outcome, Err(ProcessingError::ChannelFault(_))));
        }
        assert_eq!(channel.state(), ChannelState::Terminated);
        Ok(())
    }

    #[tokio::test]
    async fn test_offload_timeout_terminates_and_recovers() -> Result<()> {
        let processor = UrlProcessor::new(ProcessorConfig::default(), ExecutionMode::Offload);
        let request = OperationRequest::new(Operation::SortByDomain);

        let outcome = processor
            .process_operation(
                numbered(300_000),
                &request,
                ProcessOptions::default().with_timeout(Duration::from_millis(10)),
            )
            .await;
        assert_eq!(outcome, Err(ProcessingError::Timeout { budget_ms: 10 }));
        assert_eq!(processor.offload_state().await, ChannelState::Uninitialized);

        // The next offloaded call starts a fresh channel
        let result = processor
            .process_operation(numbered(5), &request, ProcessOptions::default())
            .await?;
        assert_eq!(result.output_count, 5);
        assert_eq!(processor.offload_state().await, ChannelState::Ready);
        processor.shutdown().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_auto_mode_offloads_above_threshold() -> Result<()> {
        let config = ProcessorConfig { offload_threshold: 500, ..Default::default() };
        let processor = UrlProcessor::new(config, ExecutionMode::Auto);
        let request = OperationRequest::new(Operation::TrimLastPath);

        let small = processor.process_operation(numbered(499), &request, ProcessOptions::default()).await?;
        assert_eq!(processor.offload_state().await, ChannelState::Uninitialized);

        let large = processor.process_operation(numbered(500), &request, ProcessOptions::default()).await?;
        assert_eq!(processor.offload_state().await, ChannelState::Ready);

        assert_eq!(small.results[..], large.results[..499]);
        processor.shutdown().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_validation_errors_cross_the_wire_intact() -> Result<()> {
        let channel = OffloadChannel::initialize(ProcessorConfig::default()).await?;
        let outcome = channel
            .process(numbered(3), &OperationRequest::new(Operation::FilterKeep), None, None)
            .await;

        assert!(matches!(outcome, Err(ProcessingError::Validation(_))));
        assert_eq!(channel.state(), ChannelState::Ready);
        Ok(())
    }
}
