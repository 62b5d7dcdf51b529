//! Comprehensive tests for the gateway abstraction layer

#[cfg(test)]
mod integration_tests {
    use crate::config::GatewayConfig;
    use crate::gateway::config::GatewayBackend;
    use crate::gateway::mock_store::{Consistency, MockGateway};
    use crate::gateway::{ObjectGateway, ObjectKey, Payloads};
    use bytes::Bytes;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn mock_gateway(consistency: Consistency) -> Arc<dyn ObjectGateway> {
        let config = GatewayConfig {
            backend: GatewayBackend::Mock,
            mock_consistency: consistency,
            ..GatewayConfig::default()
        };
        config.create_gateway().expect("mock gateway")
    }

    #[test]
    fn test_direct_gateway_interface() {
        let gateway = mock_gateway(Consistency::Strong);
        let key = ObjectKey::generate();
        let payloads = Payloads::zeroed(16);

        gateway.put(&key, payloads.base.clone()).expect("Put failed");
        assert_eq!(gateway.get(&key).expect("Get failed").len(), 16);

        gateway.put(&key, payloads.overwrite.clone()).expect("Overwrite failed");
        assert_eq!(gateway.get(&key).expect("Get failed").len(), 17);

        assert!(gateway.list().expect("List failed").contains(&key));

        gateway.delete(&key).expect("Delete failed");
        assert!(gateway.lookup(&key).expect("Lookup failed").is_none());
    }

    #[test]
    fn test_concurrent_operations() {
        let gateway = mock_gateway(Consistency::Strong);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let gateway = Arc::clone(&gateway);
                thread::spawn(move || {
                    let mut keys = Vec::new();
                    for j in 0..10 {
                        let key = ObjectKey::new(format!("concurrent-{}-{}", i, j));
                        gateway.put(&key, Bytes::from(vec![i as u8; j + 1])).unwrap();
                        assert_eq!(gateway.get(&key).unwrap().len(), j + 1);
                        keys.push(key);
                    }
                    keys
                })
            })
            .collect();

        let mut written = HashSet::new();
        for handle in handles {
            written.extend(handle.join().unwrap());
        }

        let listed = gateway.list().unwrap();
        assert_eq!(listed, written);

        for key in &written {
            gateway.delete(key).unwrap();
        }
        assert!(gateway.list().unwrap().is_empty());
    }

    #[test]
    fn test_empty_payload_round_trip() {
        let gateway = mock_gateway(Consistency::Strong);
        let key = ObjectKey::new("empty_object");
        let payloads = Payloads::zeroed(0);

        gateway.put(&key, payloads.base).expect("Empty put failed");
        let retrieved = gateway.get(&key).expect("Empty get failed");
        assert!(retrieved.is_empty());
        gateway.delete(&key).expect("Empty delete failed");
    }

    #[test]
    fn test_large_payload_handling() {
        let gateway = mock_gateway(Consistency::Strong);
        let key = ObjectKey::new("large_object");
        let payloads = Payloads::zeroed(1024 * 1024);

        gateway.put(&key, payloads.overwrite.clone()).expect("Large put failed");
        assert_eq!(gateway.get(&key).expect("Large get failed").len(), 1024 * 1024 + 1);
        gateway.delete(&key).expect("Large delete failed");
    }

    #[test]
    fn test_not_found_is_distinguished() {
        let gateway = mock_gateway(Consistency::Strong);
        let missing = ObjectKey::new("never_written");

        let err = gateway.get(&missing).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "object not found: never_written");
        assert_eq!(gateway.lookup(&missing).unwrap(), None);
    }

    #[test]
    fn test_consistency_models_differ_only_where_expected() {
        for consistency in [Consistency::Strong, Consistency::StaleDeletes, Consistency::StaleWrites] {
            let gateway = MockGateway::with_consistency(consistency);
            let key = ObjectKey::generate();

            gateway.put(&key, Bytes::from_static(b"one")).unwrap();
            let after_create = gateway.lookup(&key).unwrap();
            gateway.delete(&key).unwrap();
            let after_delete = gateway.lookup(&key).unwrap();

            match consistency {
                Consistency::Strong => {
                    assert!(after_create.is_some());
                    assert!(after_delete.is_none());
                }
                Consistency::StaleDeletes => {
                    assert!(after_create.is_some());
                    assert!(after_delete.is_some());
                }
                Consistency::StaleWrites => {
                    assert!(after_create.is_none());
                    assert!(after_delete.is_none());
                }
            }
        }
    }
}
