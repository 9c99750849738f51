//! Export and restore scenarios.

#[cfg(test)]
mod tests {
    use crate::harness::{entity_id, entity_type, folder_engine, memory_engine, service};
    use std::sync::Arc;
    use sync_client::{AdapterError, EngineError, MemoryAdapter};
    use sync_core::ExportError;
    use sync_types::{ExportBundle, ImportStrategy, Version};

    /// A memory backend exported and restored into a folder backend keeps
    /// every record readable with its version.
    #[tokio::test]
    async fn memory_backup_restores_into_folder() {
        let crypto = service();
        let source = memory_engine(MemoryAdapter::new(), Arc::clone(&crypto)).await;
        let goals = entity_type("goals");
        let notes = entity_type("notes");

        source
            .push_bytes(&goals, &entity_id("g1"), b"goal", Version::zero())
            .await
            .unwrap();
        source
            .push_bytes(&goals, &entity_id("g1"), b"goal v2", Version::new(1))
            .await
            .unwrap();
        source
            .push_bytes(&notes, &entity_id("n1"), b"note", Version::zero())
            .await
            .unwrap();

        let bundle = source.export_backup().await.unwrap();
        assert_eq!(bundle.items.len(), 2);
        assert_eq!(bundle.metadata.item_count, 2);

        let dir = tempfile::tempdir().unwrap();
        let target = folder_engine(dir.path(), crypto).await;
        let report = target
            .restore_backup(&bundle, ImportStrategy::Skip)
            .await
            .unwrap();
        assert_eq!(report.imported, 2);

        let restored = target.pull_since(&goals, 0).await.unwrap();
        assert_eq!(restored[0].payload, b"goal v2");
        assert_eq!(restored[0].version, Version::new(2));
    }

    /// Bundles survive JSON serialization unchanged and still verify.
    #[tokio::test]
    async fn bundle_survives_json_file() {
        let engine = memory_engine(MemoryAdapter::new(), service()).await;
        engine
            .push_bytes(&entity_type("goals"), &entity_id("g1"), b"x", Version::zero())
            .await
            .unwrap();

        let bundle = engine.export_backup().await.unwrap();
        let json = serde_json::to_string_pretty(&bundle).unwrap();
        let parsed: ExportBundle = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, bundle);

        let fresh = memory_engine(MemoryAdapter::new(), service()).await;
        let report = fresh
            .restore_backup(&parsed, ImportStrategy::Overwrite)
            .await
            .unwrap();
        assert_eq!(report.imported, 1);
    }

    /// A bundle edited after export is refused and nothing is written.
    #[tokio::test]
    async fn tampered_bundle_is_refused() {
        let engine = memory_engine(MemoryAdapter::new(), service()).await;
        engine
            .push_bytes(&entity_type("goals"), &entity_id("g1"), b"x", Version::zero())
            .await
            .unwrap();
        let mut bundle = engine.export_backup().await.unwrap();
        bundle.items[0].version = Version::new(99);

        let target = MemoryAdapter::new();
        let fresh = memory_engine(target.clone(), service()).await;
        let result = fresh.restore_backup(&bundle, ImportStrategy::Skip).await;

        assert!(matches!(
            result,
            Err(EngineError::Adapter(AdapterError::Bundle(
                ExportError::ChecksumMismatch { .. }
            )))
        ));
        assert_eq!(target.record_count(), 0);
    }

    /// Skip keeps local records; overwrite replaces them at a higher version.
    #[tokio::test]
    async fn import_strategies_on_existing_records() {
        let crypto = service();
        let source = memory_engine(MemoryAdapter::new(), Arc::clone(&crypto)).await;
        let goals = entity_type("goals");
        source
            .push_bytes(&goals, &entity_id("g1"), b"from backup", Version::zero())
            .await
            .unwrap();
        let bundle = source.export_backup().await.unwrap();

        let target = memory_engine(MemoryAdapter::new(), crypto).await;
        for n in 0..3u64 {
            target
                .push_bytes(&goals, &entity_id("g1"), b"local", Version::new(n))
                .await
                .unwrap();
        }

        let skipped = target
            .restore_backup(&bundle, ImportStrategy::Skip)
            .await
            .unwrap();
        assert_eq!(skipped.skipped, 1);
        assert_eq!(target.pull_since(&goals, 0).await.unwrap()[0].payload, b"local");

        let overwritten = target
            .restore_backup(&bundle, ImportStrategy::Overwrite)
            .await
            .unwrap();
        assert_eq!(overwritten.overwritten, 1);
        let items = target.pull_since(&goals, 0).await.unwrap();
        assert_eq!(items[0].payload, b"from backup");
        assert_eq!(items[0].version, Version::new(4));
    }
}
