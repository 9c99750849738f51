//! Encryption scenarios across engines and devices.

#[cfg(test)]
mod tests {
    use crate::harness::{
        entity_id, entity_type, fast_kdf, memory_engine, service, service_with_salt, PASSPHRASE,
    };
    use std::sync::Arc;
    use sync_client::{CryptoError, EncryptionService, EngineError, KeySpec, MemoryAdapter};
    use sync_types::Version;

    // ========================================================================
    // Envelope round trips
    // ========================================================================

    /// A goal pushed with expected version 0 lands at v1 and pulls back intact.
    #[tokio::test]
    async fn goal_roundtrips_through_memory_backend() {
        let engine = memory_engine(MemoryAdapter::new(), service()).await;
        let goals = entity_type("goals");
        let goal = serde_json::json!({"id": "g1", "title": "Learn"});

        let result = engine
            .push_record(&goals, &entity_id("g1"), &goal, Version::zero())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.version, Version::new(1));

        let items = engine.pull_since(&goals, 0).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].json::<serde_json::Value>().unwrap(), goal);
    }

    /// A second device with the same passphrase and salt reads the first's data.
    #[tokio::test]
    async fn second_device_with_shared_salt_decrypts() {
        let backend = MemoryAdapter::new();
        let first = service();
        let salt = first.salt_for(1).unwrap().unwrap();

        let device_a = memory_engine(backend.clone(), first).await;
        let device_b = memory_engine(backend, service_with_salt(salt)).await;
        let notes = entity_type("notes");

        device_a
            .push_bytes(&notes, &entity_id("n1"), b"shared note", Version::zero())
            .await
            .unwrap();

        let items = device_b.pull_changes(&notes).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].payload, b"shared note");
    }

    /// A device with a different salt cannot read, and the pull fails whole.
    #[tokio::test]
    async fn foreign_key_rejects_entire_pull() {
        let backend = MemoryAdapter::new();
        let device_a = memory_engine(backend.clone(), service()).await;
        let stranger = memory_engine(backend.clone(), service()).await;
        let notes = entity_type("notes");

        for id in ["n1", "n2"] {
            device_a
                .push_bytes(&notes, &entity_id(id), b"private", Version::zero())
                .await
                .unwrap();
        }

        let result = stranger.pull_changes(&notes).await;
        assert!(matches!(
            result,
            Err(EngineError::RejectedRecord {
                source: CryptoError::DecryptionFailed,
                ..
            })
        ));
    }

    // ========================================================================
    // Key rotation
    // ========================================================================

    /// Records written before and after rotation both stay readable, and a
    /// device restored from the key history reads both.
    #[tokio::test]
    async fn rotation_keeps_history_readable_across_devices() {
        let backend = MemoryAdapter::new();
        let crypto = service();
        let device_a = memory_engine(backend.clone(), Arc::clone(&crypto)).await;
        let journal = entity_type("journal");

        device_a
            .push_bytes(&journal, &entity_id("j1"), b"before", Version::zero())
            .await
            .unwrap();
        let rotated = crypto.rotate_key("Rotated5678").unwrap();
        assert_eq!(rotated, 2);
        device_a
            .push_bytes(&journal, &entity_id("j2"), b"after", Version::zero())
            .await
            .unwrap();

        let stored = backend.stored(&journal, &entity_id("j2")).unwrap();
        assert_eq!(stored.data.key_version, 2);

        let restored = EncryptionService::restore(
            &[
                KeySpec {
                    version: 1,
                    passphrase: PASSPHRASE,
                    salt: crypto.salt_for(1).unwrap().unwrap(),
                },
                KeySpec {
                    version: 2,
                    passphrase: "Rotated5678",
                    salt: crypto.salt_for(2).unwrap().unwrap(),
                },
            ],
            fast_kdf(),
        )
        .unwrap();
        let device_b = memory_engine(backend, Arc::new(restored)).await;

        let mut payloads: Vec<Vec<u8>> = device_b
            .pull_since(&journal, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.payload)
            .collect();
        payloads.sort();
        assert_eq!(payloads, vec![b"after".to_vec(), b"before".to_vec()]);
    }

    /// A device that never learned the rotated key reports the unknown version.
    #[tokio::test]
    async fn stale_device_reports_unknown_key_version() {
        let backend = MemoryAdapter::new();
        let crypto = service();
        let salt = crypto.salt_for(1).unwrap().unwrap();
        let device_a = memory_engine(backend.clone(), Arc::clone(&crypto)).await;
        let device_b = memory_engine(backend, service_with_salt(salt)).await;
        let journal = entity_type("journal");

        crypto.rotate_key("Rotated5678").unwrap();
        device_a
            .push_bytes(&journal, &entity_id("j1"), b"new key", Version::zero())
            .await
            .unwrap();

        let result = device_b.pull_since(&journal, 0).await;
        assert!(matches!(
            result,
            Err(EngineError::RejectedRecord {
                source: CryptoError::UnknownKeyVersion(2),
                ..
            })
        ));
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Shutting one engine down destroys the shared service for every holder.
    #[tokio::test]
    async fn shutdown_destroys_shared_service() {
        let crypto = service();
        let engine = memory_engine(MemoryAdapter::new(), Arc::clone(&crypto)).await;

        engine.shutdown();
        engine.shutdown();

        assert!(crypto.is_destroyed());
        assert!(matches!(
            crypto.encrypt(b"x"),
            Err(CryptoError::ServiceDestroyed)
        ));
    }
}
