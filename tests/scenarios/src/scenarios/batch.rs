//! Batch push scenarios.

#[cfg(test)]
mod tests {
    use crate::harness::{entity_id, entity_type, folder_engine, memory_engine, service};
    use std::time::{Duration, Instant};
    use sync_client::{MemoryAdapter, OutgoingRecord};
    use sync_core::BatchConfig;
    use sync_types::{BatchItemStatus, Version};

    fn records(count: usize) -> Vec<OutgoingRecord> {
        (0..count)
            .map(|n| OutgoingRecord {
                entity_type: entity_type("habits"),
                entity_id: entity_id(&format!("h{n}")),
                plaintext: format!("habit {n}").into_bytes(),
                expected_version: Version::zero(),
            })
            .collect()
    }

    /// N items where M fail and C conflict report N-M-C successes, with one
    /// result per input.
    #[tokio::test]
    async fn batch_counts_partial_failures_and_conflicts() {
        let backend = MemoryAdapter::new().with_batch_config(BatchConfig::new(3, Duration::ZERO));
        let engine = memory_engine(backend.clone(), service()).await;
        let habits = entity_type("habits");

        // Two conflicts: these already exist at v1
        for id in ["h1", "h4"] {
            engine
                .push_bytes(&habits, &entity_id(id), b"existing", Version::zero())
                .await
                .unwrap();
        }
        // Three failures
        for id in ["h0", "h5", "h9"] {
            backend.fail_pushes_for(&entity_id(id));
        }

        let result = engine.push_batch(records(10)).await.unwrap();

        assert_eq!(result.results.len(), 10);
        assert_eq!(result.failed, 3);
        assert_eq!(result.conflicts, 2);
        assert_eq!(result.succeeded, 10 - 3 - 2);

        for item in &result.results {
            match item.entity_id.as_str() {
                "h0" | "h5" | "h9" => {
                    assert!(matches!(item.status, BatchItemStatus::Failed { .. }))
                }
                "h1" | "h4" => assert!(matches!(item.status, BatchItemStatus::Conflict(_))),
                _ => assert!(matches!(
                    item.status,
                    BatchItemStatus::Succeeded { version } if version == Version::new(1)
                )),
            }
        }
    }

    /// Failed items can be retried on their own once the fault clears.
    #[tokio::test]
    async fn failed_items_retry_cleanly() {
        let backend = MemoryAdapter::new().with_batch_config(BatchConfig::new(2, Duration::ZERO));
        let engine = memory_engine(backend.clone(), service()).await;
        backend.fail_pushes_for(&entity_id("h2"));

        let first = engine.push_batch(records(4)).await.unwrap();
        assert_eq!(first.failed, 1);

        backend.clear_failures();
        let retry: Vec<_> = records(4)
            .into_iter()
            .filter(|r| r.entity_id.as_str() == "h2")
            .collect();
        let second = engine.push_batch(retry).await.unwrap();
        assert_eq!(second.succeeded, 1);
        assert_eq!(backend.record_count(), 4);
    }

    /// Chunks are separated by the configured pause.
    #[tokio::test]
    async fn chunks_are_paced() {
        let backend =
            MemoryAdapter::new().with_batch_config(BatchConfig::new(2, Duration::from_millis(20)));
        let engine = memory_engine(backend, service()).await;

        let started = Instant::now();
        let result = engine.push_batch(records(6)).await.unwrap();

        // Three chunks, two pauses
        assert!(started.elapsed() >= Duration::from_millis(40));
        assert_eq!(result.succeeded, 6);
    }

    /// An empty batch is a no-op.
    #[tokio::test]
    async fn empty_batch_reports_nothing() {
        let engine = memory_engine(MemoryAdapter::new(), service()).await;
        let result = engine.push_batch(Vec::new()).await.unwrap();
        assert!(result.results.is_empty());
        assert_eq!(result.succeeded + result.failed + result.conflicts, 0);
    }

    /// The folder backend handles a concurrent chunk without losing writes.
    #[tokio::test]
    async fn folder_batch_writes_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let engine = folder_engine(dir.path(), service()).await;

        let result = engine.push_batch(records(12)).await.unwrap();
        assert_eq!(result.succeeded, 12);

        let items = engine.pull_since(&entity_type("habits"), 0).await.unwrap();
        assert_eq!(items.len(), 12);
    }
}
