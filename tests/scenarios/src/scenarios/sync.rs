//! Concurrency, cursor and conflict scenarios.

#[cfg(test)]
mod tests {
    use crate::harness::{
        entity_id, entity_type, folder_engine, folder_engine_with_cursors, memory_engine, service,
        service_with_salt,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use sync_client::{AdapterError, EngineError, MemoryAdapter, SyncAdapter};
    use sync_core::RecordState;
    use sync_types::{ConflictResolution, Version};

    // ========================================================================
    // Optimistic concurrency
    // ========================================================================

    /// Two callers race to create the same record: exactly one wins v1.
    #[tokio::test]
    async fn racing_creates_yield_one_winner_and_one_conflict() {
        let backend = MemoryAdapter::new();
        let crypto = service();
        let salt = crypto.salt_for(1).unwrap().unwrap();
        let device_a = memory_engine(backend.clone(), crypto).await;
        let device_b = memory_engine(backend.clone(), service_with_salt(salt)).await;
        let goals = entity_type("goals");
        let id = entity_id("g1");

        let (a, b) = tokio::join!(
            device_a.push_bytes(&goals, &id, b"from a", Version::zero()),
            device_b.push_bytes(&goals, &id, b"from b", Version::zero()),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.success, b.success);
        let (winner, loser) = if a.success { (a, b) } else { (b, a) };
        assert_eq!(winner.version, Version::new(1));
        assert!(loser.conflict_detected());

        let conflict = loser.conflict.unwrap();
        assert_eq!(conflict.local_version, Version::zero());
        assert_eq!(conflict.remote_version, Version::new(1));
        assert!(conflict.remote_data.is_some());
        assert_eq!(backend.stored(&goals, &id).unwrap().version, Version::new(1));
    }

    /// Many concurrent creates of one record on the folder backend still
    /// produce a single winner.
    #[tokio::test]
    async fn folder_backend_serializes_racing_creates() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(folder_engine(dir.path(), service()).await);
        let goals = entity_type("goals");

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let engine = Arc::clone(&engine);
                let goals = goals.clone();
                tokio::spawn(async move {
                    engine
                        .push_bytes(
                            &goals,
                            &entity_id("g1"),
                            format!("writer {n}").as_bytes(),
                            Version::zero(),
                        )
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().success {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        let items = engine.pull_since(&goals, 0).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].version, Version::new(1));
    }

    // ========================================================================
    // Cursors
    // ========================================================================

    /// Each device's cursor only delivers what changed since its last pull.
    #[tokio::test]
    async fn cursor_pulls_are_incremental() {
        let backend = MemoryAdapter::new();
        let crypto = service();
        let salt = crypto.salt_for(1).unwrap().unwrap();
        let writer = memory_engine(backend.clone(), crypto).await;
        let reader = memory_engine(backend, service_with_salt(salt)).await;
        let tasks = entity_type("tasks");

        writer
            .push_bytes(&tasks, &entity_id("t1"), b"one", Version::zero())
            .await
            .unwrap();
        // Pulls are "at or after"; keep the write strictly before the pull
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(reader.pull_changes(&tasks).await.unwrap().len(), 1);
        assert!(reader.pull_changes(&tasks).await.unwrap().is_empty());

        writer
            .push_bytes(&tasks, &entity_id("t1"), b"one v2", Version::new(1))
            .await
            .unwrap();
        let next = reader.pull_changes(&tasks).await.unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].payload, b"one v2");
        assert_eq!(next[0].version, Version::new(2));
    }

    /// Folder cursors survive a restart when persisted to a cursor file.
    #[tokio::test]
    async fn folder_cursor_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let cursor_file = dir.path().join("cursors.json");
        let crypto = service();
        let tasks = entity_type("tasks");

        let writer = folder_engine(dir.path(), Arc::clone(&crypto)).await;
        writer
            .push_bytes(&tasks, &entity_id("t1"), b"one", Version::zero())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let first = folder_engine_with_cursors(dir.path(), &cursor_file, Arc::clone(&crypto)).await;
        assert_eq!(first.pull_changes(&tasks).await.unwrap().len(), 1);
        drop(first);
        assert!(cursor_file.exists());

        let second = folder_engine_with_cursors(dir.path(), &cursor_file, crypto).await;
        assert!(second.adapter().get_cursor(&tasks).await.unwrap().is_some());
        assert!(second.pull_changes(&tasks).await.unwrap().is_empty());
    }

    // ========================================================================
    // Conflict resolution
    // ========================================================================

    /// Local resolution overwrites the remote at the next version.
    #[tokio::test]
    async fn local_resolution_overwrites_remote() {
        let engine = memory_engine(MemoryAdapter::new(), service()).await;
        let goals = entity_type("goals");
        let id = entity_id("g1");

        engine
            .push_bytes(&goals, &id, b"remote", Version::zero())
            .await
            .unwrap();
        let conflict = engine
            .push_bytes(&goals, &id, b"local", Version::zero())
            .await
            .unwrap()
            .conflict
            .unwrap();
        assert!(engine.record_state(&goals, &id).is_conflicted());

        engine
            .resolve(conflict, ConflictResolution::Local)
            .await
            .unwrap();

        assert_eq!(engine.record_state(&goals, &id), RecordState::Resolved);
        let items = engine.pull_since(&goals, 0).await.unwrap();
        assert_eq!(items[0].payload, b"local");
        assert_eq!(items[0].version, Version::new(2));
    }

    /// Manual resolution writes caller-supplied data.
    #[tokio::test]
    async fn manual_resolution_writes_supplied_envelope() {
        let engine = memory_engine(MemoryAdapter::new(), service()).await;
        let goals = entity_type("goals");
        let id = entity_id("g1");

        engine
            .push_bytes(&goals, &id, b"remote", Version::zero())
            .await
            .unwrap();
        let conflict = engine
            .push_bytes(&goals, &id, b"local", Version::zero())
            .await
            .unwrap()
            .conflict
            .unwrap();

        let chosen = engine.encryption().encrypt(b"hand picked").unwrap();
        engine
            .resolve(conflict, ConflictResolution::Manual(chosen))
            .await
            .unwrap();
        let items = engine.pull_since(&goals, 0).await.unwrap();
        assert_eq!(items[0].payload, b"hand picked");
    }

    /// A resolution computed against an outdated remote is refused.
    #[tokio::test]
    async fn resolution_against_moved_remote_is_stale() {
        let engine = memory_engine(MemoryAdapter::new(), service()).await;
        let goals = entity_type("goals");
        let id = entity_id("g1");

        engine
            .push_bytes(&goals, &id, b"remote v1", Version::zero())
            .await
            .unwrap();
        let conflict = engine
            .push_bytes(&goals, &id, b"local", Version::zero())
            .await
            .unwrap()
            .conflict
            .unwrap();
        engine
            .push_bytes(&goals, &id, b"remote v2", Version::new(1))
            .await
            .unwrap();

        let result = engine.resolve(conflict, ConflictResolution::Local).await;
        assert!(matches!(
            result,
            Err(EngineError::Adapter(AdapterError::StaleResolution { .. }))
        ));
        let items = engine.pull_since(&goals, 0).await.unwrap();
        assert_eq!(items[0].payload, b"remote v2");
    }
}
