//! # Replication Flows
//!
//! Data reaches other nodes two ways:
//!
//! 1. **Gossip**: newly accepted data is forwarded to every other connection
//! 2. **Inventory**: a node sends a filter of what it holds and receives the rest

#[cfg(test)]
mod tests {
    use mn_01_data_storage::{DataStorageApi, DataStorageResult};
    use node_runtime::MemoryHub;
    use shared_crypto::Ed25519KeyPair;

    use crate::integration::harness::{node_config, note, offer, start_all, wait_until, TestNode};

    // =========================================================================
    // TEST GROUP 1: Gossip
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_published_data_reaches_connected_peer() {
        let hub = MemoryHub::new();
        let a = TestNode::build(&hub, node_config(7101, &[7102]));
        let b = TestNode::build(&hub, node_config(7102, &[7101]));
        start_all(&[&a, &b]).await;
        wait_until("a and b to connect", || a.is_connected_to(&b)).await;

        let request = note(b"hello mesh");
        let result = a.runtime.publish(request.clone()).await.unwrap();
        assert_eq!(result, DataStorageResult::Accepted);
        wait_until("b to hold the note", || b.holds(&request)).await;

        // Republishing is redundant and not gossiped again.
        let again = a.runtime.publish(request.clone()).await.unwrap();
        assert_eq!(again, DataStorageResult::PayloadAlreadyStored);

        let owner = Ed25519KeyPair::generate();
        let listing = offer(b"sell 1 BTC", 1, &owner);
        assert!(b.runtime.publish(listing.clone()).await.unwrap().is_success());
        wait_until("a to hold the offer", || a.holds(&listing)).await;

        a.stop(&hub).await;
        b.stop(&hub).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_gossip_crosses_an_intermediate_node() {
        let hub = MemoryHub::new();
        let a = TestNode::build(&hub, node_config(7111, &[7112]));
        let b = TestNode::build(&hub, node_config(7112, &[7111]));
        start_all(&[&a, &b]).await;
        wait_until("a and b to connect", || a.is_connected_to(&b)).await;

        let c = TestNode::build(&hub, node_config(7113, &[7112]));
        start_all(&[&c]).await;
        wait_until("c to connect to b", || c.is_connected_to(&b)).await;

        let request = note(b"relayed");
        a.runtime.publish(request.clone()).await.unwrap();
        wait_until("c to hold the note", || c.holds(&request)).await;

        for node in [a, b, c] {
            node.stop(&hub).await;
        }
    }

    // =========================================================================
    // TEST GROUP 2: Inventory
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_two_seeded_nodes_exchange_peers_and_full_stores() {
        let hub = MemoryHub::new();
        let a = TestNode::build(&hub, node_config(7141, &[7142]));
        let b = TestNode::build(&hub, node_config(7142, &[7141]));

        // Stored before any connection exists.
        let a_notes: Vec<_> = (0..4u8).map(|i| note(&[b'a', i])).collect();
        let b_notes: Vec<_> = (0..2u8).map(|i| note(&[b'b', i])).collect();
        for request in &a_notes {
            a.runtime.publish(request.clone()).await.unwrap();
        }
        for request in &b_notes {
            b.runtime.publish(request.clone()).await.unwrap();
        }

        start_all(&[&a, &b]).await;

        let a_group = a.runtime.services().peer_group.peer_group().clone();
        let b_group = b.runtime.services().peer_group.peer_group().clone();
        wait_until("both sides to persist each other", || {
            a_group.is_persisted(&b.address) && b_group.is_persisted(&a.address)
        })
        .await;
        wait_until("a to hold b's store", || b_notes.iter().all(|n| a.holds(n))).await;
        wait_until("b to hold a's store", || a_notes.iter().all(|n| b.holds(n))).await;
        assert_eq!(a.num_entries(), 6);
        assert_eq!(b.num_entries(), 6);

        a.stop(&hub).await;
        b.stop(&hub).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_late_joiner_catches_up_through_inventory() {
        let hub = MemoryHub::new();
        let a = TestNode::build(&hub, node_config(7121, &[7122]));
        let b = TestNode::build(&hub, node_config(7122, &[7121]));
        start_all(&[&a, &b]).await;

        let notes: Vec<_> = (0..3u8).map(|i| note(&[b'n', i])).collect();
        for request in &notes {
            a.runtime.publish(request.clone()).await.unwrap();
        }

        // Published before c existed, so only inventory can deliver them.
        let c = TestNode::build(&hub, node_config(7123, &[7121]));
        start_all(&[&c]).await;
        wait_until("c to hold every note", || notes.iter().all(|n| c.holds(n))).await;
        assert!(c.runtime.services().inventory.metrics().entries_accepted >= 3);

        for node in [a, b, c] {
            node.stop(&hub).await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_explicit_inventory_request_fetches_only_missing_entries() {
        let hub = MemoryHub::new();
        let a = TestNode::build(&hub, node_config(7131, &[7132]));
        let b = TestNode::build(&hub, node_config(7132, &[7131]));
        start_all(&[&a, &b]).await;
        wait_until("a and b to connect", || a.is_connected_to(&b)).await;

        let shared = note(b"shared");
        a.runtime.publish(shared.clone()).await.unwrap();
        wait_until("b to hold the shared note", || b.holds(&shared)).await;

        // Stored on b without gossip.
        let hidden = note(b"hidden");
        let stored = b.runtime.services().storage.process(hidden.clone()).await.unwrap();
        assert!(stored.is_success());
        assert!(!a.holds(&hidden));

        let connection = a.runtime.network().connection_to(&b.address).unwrap();
        let applied = a.runtime.request_inventory(&connection.id).await.unwrap();
        assert_eq!(applied.accepted, 1);
        assert_eq!(applied.num_dropped, 0);
        assert!(a.holds(&hidden));
        assert_eq!(a.num_entries(), b.num_entries());

        a.stop(&hub).await;
        b.stop(&hub).await;
    }
}
