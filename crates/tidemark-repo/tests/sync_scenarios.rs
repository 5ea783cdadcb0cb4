//! End-to-end synchronization scenarios over in-process transports.

mod common;

use async_trait::async_trait;
use common::{connect, get_int, get_string, wait_until};
use automerge::transaction::Transactable;
use automerge::ROOT;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tidemark_network::{ChannelAdapter, NetworkAdapter, NetworkEvent, RepoMessage};
use tidemark_repo::{HandleState, Repo, RepoConfig, RepoEvent};
use tidemark_storage::{Chunk, MemoryStorage, StorageAdapter, StorageKey};
use tidemark_types::DocumentId;
use tokio::sync::{mpsc, watch};

fn repo(name: &str) -> Repo {
    Repo::new(RepoConfig::with_peer_id(name))
}

/// Hub and spoke: alice and charlie only ever talk through bob.
#[tokio::test(flavor = "multi_thread")]
async fn hub_and_spoke_converges() {
    let alice = repo("alice");
    let bob = repo("bob");
    let charlie = repo("charlie");
    connect(&alice, &bob);
    connect(&bob, &charlie);

    let doc = alice.create();
    doc.update(|d| {
        d.put(ROOT, "foo", "bar")?;
        Ok(())
    })
    .unwrap();

    let at_charlie = charlie.find(&doc.url()).unwrap();
    at_charlie.wait_for_state(&[HandleState::Ready]).await;
    assert_eq!(at_charlie.state(), HandleState::Ready);
    assert_eq!(get_string(&at_charlie, "foo").as_deref(), Some("bar"));

    for r in [&alice, &bob, &charlie] {
        r.shutdown().await;
    }
}

/// Full mesh with concurrent edits on two replicas.
#[tokio::test(flavor = "multi_thread")]
async fn all_to_all_merges_concurrent_edits() {
    let alice = repo("alice");
    let bob = repo("bob");
    let charlie = repo("charlie");
    connect(&alice, &bob);
    connect(&alice, &charlie);
    connect(&bob, &charlie);

    let doc = alice.create();
    let at_bob = bob.find(&doc.url()).unwrap();
    let at_charlie = charlie.find(&doc.url()).unwrap();

    doc.update(|d| {
        d.put(ROOT, "x", 1i64)?;
        Ok(())
    })
    .unwrap();
    // Charlie edits as soon as its replica is materialized, possibly before
    // it has seen anything from alice.
    at_charlie
        .wait_for_state(&[HandleState::Requesting, HandleState::Ready])
        .await;
    at_charlie
        .update(|d| {
            d.put(ROOT, "y", 2i64)?;
            Ok(())
        })
        .unwrap();

    for (name, handle) in [("alice", &doc), ("bob", &at_bob), ("charlie", &at_charlie)] {
        wait_until(&format!("{name} observes both edits"), || {
            get_int(handle, "x") == Some(1) && get_int(handle, "y") == Some(2)
        })
        .await;
    }
    assert_eq!(doc.heads(), at_bob.heads());
    assert_eq!(doc.heads(), at_charlie.heads());

    for r in [&alice, &bob, &charlie] {
        r.shutdown().await;
    }
}

/// Requesting a document nobody has ends in unavailability, exactly once.
#[tokio::test(flavor = "multi_thread")]
async fn unknown_document_becomes_unavailable() {
    let alice = repo("alice");
    let bob = repo("bob");
    let charlie = repo("charlie");
    connect(&alice, &bob);
    connect(&alice, &charlie);
    connect(&bob, &charlie);

    let mut events = alice.subscribe();
    let wanted = DocumentId::random();
    let handle = alice.find_by_id(wanted.clone());

    let settled = handle.wait_for_state(&[HandleState::Unavailable]).await;
    assert_eq!(settled, HandleState::Unavailable);

    // Let any stragglers arrive, then confirm the event fired exactly once.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let mut unavailable_events = 0;
    while let Ok(event) = events.try_recv() {
        if let RepoEvent::DocumentUnavailable { document_id } = event {
            assert_eq!(document_id, wanted);
            unavailable_events += 1;
        }
    }
    assert_eq!(unavailable_events, 1);

    for r in [&alice, &bob, &charlie] {
        r.shutdown().await;
    }
}

/// Counts outbound sends so reconnection traffic can be bounded.
struct CountingAdapter {
    inner: Arc<ChannelAdapter>,
    sent: Arc<AtomicUsize>,
}

#[async_trait]
impl NetworkAdapter for CountingAdapter {
    async fn send(&self, message: RepoMessage) -> tidemark_network::Result<()> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        self.inner.send(message).await
    }

    fn events(&self) -> Option<mpsc::UnboundedReceiver<NetworkEvent>> {
        self.inner.events()
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }
}

/// Disconnect, mutate, reconnect: the peer catches up without a message storm.
#[tokio::test(flavor = "multi_thread")]
async fn reconnect_resumes_where_it_left_off() {
    let alice = repo("alice");
    let bob = repo("bob");
    let (alice_end, _bob_end) = connect(&alice, &bob);

    let doc = alice.create();
    doc.update(|d| {
        d.put(ROOT, "rev", 1i64)?;
        Ok(())
    })
    .unwrap();

    let at_bob = bob.find(&doc.url()).unwrap();
    wait_until("bob catches up before the drop", || {
        get_int(&at_bob, "rev") == Some(1)
    })
    .await;

    alice_end.disconnect();
    // Give both repos a moment to process the departure.
    tokio::time::sleep(Duration::from_millis(50)).await;

    doc.update(|d| {
        d.put(ROOT, "rev", 2i64)?;
        Ok(())
    })
    .unwrap();
    assert_eq!(get_int(&at_bob, "rev"), Some(1));

    // Fresh transport, same peers.
    let sent = Arc::new(AtomicUsize::new(0));
    let (alice_end2, bob_end2) =
        ChannelAdapter::pair(alice.peer_id().clone(), bob.peer_id().clone());
    alice
        .add_network_adapter(Arc::new(CountingAdapter {
            inner: alice_end2,
            sent: Arc::clone(&sent),
        }))
        .unwrap();
    bob.add_network_adapter(bob_end2).unwrap();

    wait_until("bob sees the offline edit", || {
        get_int(&at_bob, "rev") == Some(2)
    })
    .await;

    // Settle, then check the exchange stayed a short conversation.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(
        sent.load(Ordering::SeqCst) <= 10,
        "reconnect produced {} outbound messages",
        sent.load(Ordering::SeqCst)
    );

    alice.shutdown().await;
    bob.shutdown().await;
}

/// Storage adapter whose reads block until the test opens the gate.
struct GatedStorage {
    inner: MemoryStorage,
    gate: watch::Receiver<bool>,
}

#[async_trait]
impl StorageAdapter for GatedStorage {
    async fn load(&self, key: &StorageKey) -> tidemark_storage::Result<Option<bytes::Bytes>> {
        self.wait_open().await;
        self.inner.load(key).await
    }

    async fn save(&self, key: &StorageKey, data: bytes::Bytes) -> tidemark_storage::Result<()> {
        self.inner.save(key, data).await
    }

    async fn remove(&self, key: &StorageKey) -> tidemark_storage::Result<()> {
        self.inner.remove(key).await
    }

    async fn load_range(&self, prefix: &StorageKey) -> tidemark_storage::Result<Vec<Chunk>> {
        self.wait_open().await;
        self.inner.load_range(prefix).await
    }

    async fn remove_range(&self, prefix: &StorageKey) -> tidemark_storage::Result<()> {
        self.inner.remove_range(prefix).await
    }
}

impl GatedStorage {
    async fn wait_open(&self) {
        let mut gate = self.gate.clone();
        let _ = gate.wait_for(|open| *open).await;
    }
}

/// Messages that arrive while the handle is still loading are applied once
/// the load resolves, in order, and the replicas converge.
#[tokio::test(flavor = "multi_thread")]
async fn messages_buffered_during_load_are_applied() {
    let (gate_tx, gate_rx) = watch::channel(false);
    let alice = repo("alice");
    let bob = Repo::new(
        RepoConfig::with_peer_id("bob").storage(Arc::new(GatedStorage {
            inner: MemoryStorage::new(),
            gate: gate_rx,
        })),
    );
    connect(&alice, &bob);

    let doc = alice.create();
    for i in 0..3i64 {
        doc.update(|d| {
            d.put(ROOT, format!("k{i}"), i)?;
            Ok(())
        })
        .unwrap();
    }

    let at_bob = bob.find(&doc.url()).unwrap();
    // Sync traffic arrives while bob's storage load is stuck.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(at_bob.in_state(&[HandleState::Idle, HandleState::Loading]));

    gate_tx.send_replace(true);

    at_bob.wait_for_state(&[HandleState::Ready]).await;
    wait_until("bob replays the buffered changes", || {
        (0..3).all(|i| get_int(&at_bob, &format!("k{i}")) == Some(i))
    })
    .await;
    assert_eq!(at_bob.heads(), doc.heads());

    alice.shutdown().await;
    bob.shutdown().await;
}

/// Ephemeral payloads reach subscribers on the other side without touching
/// the document.
#[tokio::test(flavor = "multi_thread")]
async fn ephemeral_broadcast_reaches_peers() {
    let alice = repo("alice");
    let bob = repo("bob");
    connect(&alice, &bob);

    let doc = alice.create();
    doc.update(|d| {
        d.put(ROOT, "foo", "bar")?;
        Ok(())
    })
    .unwrap();
    let at_bob = bob.find(&doc.url()).unwrap();
    at_bob.wait_for_state(&[HandleState::Ready]).await;
    let heads_before = at_bob.heads();

    let mut events = at_bob.subscribe();
    doc.broadcast(vec![42]).unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(tidemark_repo::DocHandleEvent::Ephemeral { sender_id, data }) => {
                    return (sender_id, data)
                }
                Ok(_) => continue,
                Err(err) => panic!("event stream closed: {err}"),
            }
        }
    })
    .await
    .expect("ephemeral payload arrives");

    assert_eq!(received.0, alice.peer_id().clone());
    assert_eq!(received.1, vec![42]);
    assert_eq!(at_bob.heads(), heads_before);

    alice.shutdown().await;
    bob.shutdown().await;
}

/// A restrictive share policy suppresses announcements; documents only move
/// when the other side explicitly asks.
#[tokio::test(flavor = "multi_thread")]
async fn share_policy_gates_announcements() {
    let alice = Repo::new(
        RepoConfig::with_peer_id("alice")
            .share_policy(tidemark_repo::share_policy_fn(|_, _| false)),
    );
    let bob = repo("bob");
    connect(&alice, &bob);
    let mut bob_events = bob.subscribe();

    let doc = alice.create();
    doc.update(|d| {
        d.put(ROOT, "secret", "yes")?;
        Ok(())
    })
    .unwrap();

    // Alice never announces, so bob hears nothing about the document.
    tokio::time::sleep(Duration::from_millis(200)).await;
    while let Ok(event) = bob_events.try_recv() {
        assert!(
            !matches!(event, RepoEvent::DocumentAdded { ref document_id }
                if document_id == doc.document_id()),
            "document was announced despite the policy"
        );
    }

    // An explicit request is still served.
    let at_bob = bob.find(&doc.url()).unwrap();
    at_bob.wait_for_state(&[HandleState::Ready]).await;
    assert_eq!(get_string(&at_bob, "secret").as_deref(), Some("yes"));

    alice.shutdown().await;
    bob.shutdown().await;
}
