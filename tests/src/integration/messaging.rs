//! # Messaging Flows
//!
//! Request/response traffic between running nodes: peer exchange on start,
//! storage reporting, and acknowledged confidential messages.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mn_04_resend::ResendError;
    use node_runtime::{MemoryHub, RuntimeError};
    use shared_types::{ConnectionId, TransportError};

    use crate::integration::harness::{node_config, note, start_all, wait_until, TestNode};

    // =========================================================================
    // TEST GROUP 1: Peer Group
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_connected_seeds_become_persisted_peers() {
        let hub = MemoryHub::new();
        let a = TestNode::build(&hub, node_config(7201, &[7202]));
        let b = TestNode::build(&hub, node_config(7202, &[7201]));
        start_all(&[&a, &b]).await;

        let a_group = a.runtime.services().peer_group.peer_group().clone();
        let b_group = b.runtime.services().peer_group.peer_group().clone();
        wait_until("both sides to persist each other", || {
            a_group.is_persisted(&b.address) && b_group.is_persisted(&a.address)
        })
        .await;
        assert!(a.is_connected_to(&b) && b.is_connected_to(&a));

        a.stop(&hub).await;
        b.stop(&hub).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_third_node_learns_about_peers_through_exchange() {
        let hub = MemoryHub::new();
        let a = TestNode::build(&hub, node_config(7211, &[7212]));
        let b = TestNode::build(&hub, node_config(7212, &[7211]));
        start_all(&[&a, &b]).await;
        wait_until("a and b to connect", || a.is_connected_to(&b)).await;

        let c = TestNode::build(&hub, node_config(7213, &[7211]));
        start_all(&[&c]).await;

        let c_group = c.runtime.services().peer_group.peer_group().clone();
        wait_until("c to hear about b", || {
            c_group.reported_peers().iter().any(|p| p.address == b.address)
                || c_group.is_persisted(&b.address)
        })
        .await;

        for node in [a, b, c] {
            node.stop(&hub).await;
        }
    }

    // =========================================================================
    // TEST GROUP 2: Storage Reporting
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_storage_report_round_trip() {
        let hub = MemoryHub::new();
        let a = TestNode::build(&hub, node_config(7221, &[7222]));
        let b = TestNode::build(&hub, node_config(7222, &[7221]));
        start_all(&[&a, &b]).await;
        wait_until("a and b to connect", || a.is_connected_to(&b)).await;

        b.runtime.publish(note(b"one")).await.unwrap();
        b.runtime.publish(note(b"two")).await.unwrap();

        let connection = a.runtime.network().connection_to(&b.address).unwrap();
        let report = a.runtime.request_storage_report(&connection.id).await.unwrap();
        assert_eq!(report.total_entries, b.num_entries());
        assert!(report.stores.iter().any(|s| s.store_name == "Witness"));

        let unknown = a.runtime.request_storage_report(&ConnectionId::new("nope")).await;
        assert!(matches!(
            unknown,
            Err(RuntimeError::Transport(TransportError::UnknownConnection(_)))
        ));

        a.stop(&hub).await;
        b.stop(&hub).await;
    }

    // =========================================================================
    // TEST GROUP 3: Confidential Messages
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_confidential_message_is_delivered_and_tracked() {
        let hub = MemoryHub::new();
        let a = TestNode::build(&hub, node_config(7231, &[7232]));
        let b = TestNode::build(&hub, node_config(7232, &[7231]));
        start_all(&[&a, &b]).await;

        let mut inbox = b.runtime.subscribe_confidential();
        let b_key = b.runtime.services().node_key.public_key().as_bytes().to_vec();
        let message_id = a
            .runtime
            .send_confidential(b.address.clone(), b_key, b"trade accepted".to_vec())
            .await
            .unwrap();

        let delivered = tokio::time::timeout(Duration::from_secs(5), inbox.recv())
            .await
            .expect("message arrives")
            .unwrap();
        assert_eq!(delivered.message_id, message_id);
        assert_eq!(delivered.payload, b"trade accepted".to_vec());
        assert_eq!(delivered.sender_network_id, a.runtime.services().network_id);

        // Acknowledged messages stay tracked until they age out.
        let resend = a.runtime.services().resend.clone();
        assert!(resend.contains(&message_id));

        for _ in 0..3 {
            a.runtime.resend_confidential(&message_id).await.unwrap();
            let again = tokio::time::timeout(Duration::from_secs(5), inbox.recv())
                .await
                .expect("resent message arrives")
                .unwrap();
            assert_eq!(again.message_id, message_id);
        }
        let refused = a.runtime.resend_confidential(&message_id).await;
        assert!(matches!(
            refused,
            Err(RuntimeError::Resend(ResendError::ResendLimitReached { limit: 3, .. }))
        ));

        a.stop(&hub).await;
        b.stop(&hub).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_undeliverable_message_is_dropped() {
        let hub = MemoryHub::new();
        let a = TestNode::build(&hub, node_config(7241, &[7242]));
        start_all(&[&a]).await;

        let nowhere = shared_types::Address::localhost(7249);
        let result = a.runtime.send_confidential(nowhere, vec![0; 32], b"lost".to_vec()).await;
        assert!(matches!(result, Err(RuntimeError::Transport(_))));
        assert!(a.runtime.services().resend.is_empty());

        a.stop(&hub).await;
    }
}
