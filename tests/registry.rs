use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;
use xmpp_roster::{
    registry::{RegistryError, RosterRegistry},
    roster::{RosterItem, RosterQuery, Subscription},
    runtime::handle::{RosterConfig, RosterError},
    session::{ClientSession, IdSupply},
    stanza::{Payload, Stanza, StanzaType},
    types::ClientKey,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn session(key: &str, jid: &str, ids: &IdSupply) -> (Arc<ClientSession>, mpsc::UnboundedReceiver<Stanza>) {
    let (session, outbound) = ClientSession::new(key, jid, ids.clone());
    (Arc::new(session), outbound)
}

#[tokio::test]
async fn full_session_flow_fetch_then_push() {
    init_tracing();
    let registry = RosterRegistry::new(RosterConfig::default());
    let ids = IdSupply::new();
    let (sess, mut outbound) = session("c1", "romeo@x/orchard", &ids);
    let (inbound_tx, inbound_rx) = mpsc::channel(16);

    let (roster, mut downstream) = registry.start(Arc::clone(&sess), inbound_rx).expect("start");
    assert_eq!(registry.len(), 1);

    let fetch = {
        let registry_sess = Arc::clone(&sess);
        let registry = &registry;
        async move { registry.fetch(registry_sess.as_ref()).await }
    };
    let server = async {
        let req = outbound.recv().await.expect("request");
        let reply = Stanza::iq(StanzaType::Result, req.id.clone().expect("id")).with_payload(
            Payload::Roster(RosterQuery::with_items(vec![
                RosterItem::new("a@x", Subscription::Both),
                RosterItem::new("b@x", Subscription::None),
            ])),
        );
        assert!(sess.deliver(reply).is_none());
    };
    let (fetched, ()) = tokio::join!(fetch, server);
    assert_eq!(fetched.expect("fetch"), 2);

    let pushed = Stanza::iq(StanzaType::Set, "push1").with_payload(Payload::Roster(
        RosterQuery::with_items(vec![RosterItem::removal("a@x")]),
    ));
    inbound_tx.send(pushed.clone()).await.expect("inbound");
    let forwarded = tokio::time::timeout(Duration::from_secs(1), downstream.recv())
        .await
        .expect("forwarded")
        .expect("open");
    assert_eq!(forwarded, pushed);

    let ack = outbound.recv().await.expect("ack");
    assert_eq!(ack.id.as_deref(), Some("push1"));

    let key = ClientKey::from("c1");
    assert_eq!(
        registry.snapshot(&key).await.expect("snapshot"),
        vec![RosterItem::new("b@x", Subscription::None)]
    );
    assert_eq!(roster.snapshot().await.expect("snapshot").len(), 1);
}

#[tokio::test]
async fn sessions_are_isolated() {
    let registry = RosterRegistry::new(RosterConfig::default());
    let ids = IdSupply::new();
    let (s1, _o1) = session("c1", "a@x/1", &ids);
    let (s2, _o2) = session("c2", "b@x/1", &ids);
    let (_t1, r1) = mpsc::channel(4);
    let (_t2, r2) = mpsc::channel(4);

    let (h1, _d1) = registry.start(s1, r1).expect("start c1");
    let (_h2, _d2) = registry.start(s2, r2).expect("start c2");

    h1.apply_update(RosterItem::new("friend@x", Subscription::Both))
        .await
        .expect("update");

    assert_eq!(registry.snapshot(&"c1".into()).await.expect("c1").len(), 1);
    assert!(registry.snapshot(&"c2".into()).await.expect("c2").is_empty());
}

#[tokio::test]
async fn duplicate_and_unknown_keys_are_errors() {
    let registry = RosterRegistry::new(RosterConfig::default());
    let ids = IdSupply::new();
    let (s1, _o1) = session("c1", "a@x/1", &ids);
    let (_t1, r1) = mpsc::channel(4);
    let (_t2, r2) = mpsc::channel(4);

    let _started = registry.start(Arc::clone(&s1), r1).expect("start");
    assert!(matches!(
        registry.start(s1, r2),
        Err(RegistryError::AlreadyRegistered(k)) if k.as_str() == "c1"
    ));

    assert!(matches!(
        registry.snapshot(&"nobody".into()).await,
        Err(RegistryError::UnknownClient(_))
    ));
    assert!(registry.handle(&"nobody".into()).is_none());
}

#[tokio::test]
async fn remove_stops_the_actor() {
    let registry = RosterRegistry::new(RosterConfig::default());
    let ids = IdSupply::new();
    let (s1, _o1) = session("c1", "a@x/1", &ids);
    let (_t1, r1) = mpsc::channel(4);
    let (roster, _d1) = registry.start(s1, r1).expect("start");

    let removed = registry.remove(&"c1".into()).expect("removed");
    assert!(registry.is_empty());

    let res = tokio::time::timeout(Duration::from_secs(1), removed.snapshot())
        .await
        .expect("must not hang");
    assert!(matches!(res, Err(RosterError::ActorGone)));
    assert!(roster.apply_update(RosterItem::new("x@x", Subscription::To)).await.is_err());
}

#[tokio::test]
async fn session_close_tears_down_actor_and_filter() {
    let registry = RosterRegistry::new(RosterConfig::default());
    let ids = IdSupply::new();
    let (s1, _o1) = session("c1", "a@x/1", &ids);
    let (_inbound_tx, r1) = mpsc::channel(4);
    let (roster, mut downstream) = registry.start(Arc::clone(&s1), r1).expect("start");

    s1.close();

    let end = tokio::time::timeout(Duration::from_secs(1), downstream.recv())
        .await
        .expect("filter stops");
    assert!(end.is_none());
    let res = tokio::time::timeout(Duration::from_secs(1), roster.snapshot())
        .await
        .expect("must not hang");
    assert!(res.is_err());
}

#[tokio::test]
async fn closed_session_key_can_be_started_again() {
    init_tracing();
    let registry = RosterRegistry::new(RosterConfig::default());
    let ids = IdSupply::new();
    let key = ClientKey::from("c1");

    let (s1, _o1) = session("c1", "a@x/1", &ids);
    let (_t1, r1) = mpsc::channel(4);
    let (old, _d1) = registry.start(Arc::clone(&s1), r1).expect("start");
    old.apply_update(RosterItem::new("stale@x", Subscription::Both))
        .await
        .expect("update");

    s1.close();
    assert!(old.is_closed());
    assert_eq!(registry.len(), 0);
    assert!(registry.handle(&key).is_none());
    assert!(matches!(
        registry.snapshot(&key).await,
        Err(RegistryError::UnknownClient(k)) if k == key
    ));

    let (s2, _o2) = session("c1", "a@x/2", &ids);
    let (_t2, r2) = mpsc::channel(4);
    let (fresh, _d2) = registry.start(s2, r2).expect("restart after close");
    assert_eq!(registry.len(), 1);
    assert!(!fresh.is_closed());
    assert!(registry.snapshot(&key).await.expect("snapshot").is_empty());
}

#[tokio::test]
async fn shut_down_actor_is_pruned() {
    let registry = RosterRegistry::new(RosterConfig::default());
    let ids = IdSupply::new();
    let (s1, _o1) = session("c1", "a@x/1", &ids);
    let (s2, _o2) = session("c2", "b@x/1", &ids);
    let (_t1, r1) = mpsc::channel(4);
    let (_t2, r2) = mpsc::channel(4);
    let (h1, _d1) = registry.start(s1, r1).expect("start c1");
    let (_h2, _d2) = registry.start(s2, r2).expect("start c2");

    h1.shutdown().await.expect("shutdown");
    assert!(h1.is_closed());
    assert_eq!(registry.len(), 1);

    assert_eq!(registry.prune(), 1);
    assert_eq!(registry.prune(), 0);
    assert!(registry.handle(&"c2".into()).is_some());
}

#[tokio::test]
async fn push_during_pending_fetch_leaves_one_entry() {
    init_tracing();
    let registry = RosterRegistry::new(RosterConfig::default());
    let ids = IdSupply::new();
    let (sess, mut outbound) = session("c1", "romeo@x/orchard", &ids);
    let (inbound_tx, inbound_rx) = mpsc::channel(16);
    let (roster, mut downstream) = registry.start(Arc::clone(&sess), inbound_rx).expect("start");

    let fetch = registry.fetch(sess.as_ref());
    let server = async {
        let req = outbound.recv().await.expect("request");
        let fetch_id = req.id.clone().expect("id");

        // Push for the same contact lands before the fetch reply.
        let pushed = Stanza::iq(StanzaType::Set, "push1").with_payload(Payload::Roster(
            RosterQuery::with_items(vec![RosterItem::new("a@x", Subscription::To)]),
        ));
        inbound_tx.send(pushed.clone()).await.expect("inbound");
        let forwarded = tokio::time::timeout(Duration::from_secs(1), downstream.recv())
            .await
            .expect("forwarded")
            .expect("open");
        assert_eq!(forwarded, pushed);
        let ack = outbound.recv().await.expect("ack");
        assert_eq!(ack.id.as_deref(), Some("push1"));
        assert_eq!(ack.stanza_type, Some(StanzaType::Result));

        let reply = Stanza::iq(StanzaType::Result, fetch_id).with_payload(Payload::Roster(
            RosterQuery::with_items(vec![
                RosterItem::new("a@x", Subscription::Both),
                RosterItem::new("b@x", Subscription::None),
            ]),
        ));
        assert!(sess.deliver(reply).is_none());
    };

    let (fetched, ()) = tokio::time::timeout(Duration::from_secs(2), async {
        tokio::join!(fetch, server)
    })
    .await
    .expect("fetch and push complete");
    assert_eq!(fetched.expect("fetch"), 2);

    let snap = roster.snapshot().await.expect("snapshot");
    let a_entries: Vec<_> = snap.iter().filter(|i| i.address.as_str() == "a@x").collect();
    assert_eq!(a_entries.len(), 1);
    assert_eq!(a_entries[0].subscription, Subscription::Both);
    assert_eq!(snap.len(), 2);
}

#[test]
fn id_supply_is_shared_and_fresh() {
    let ids = IdSupply::with_prefix("q");
    let other = ids.clone();
    let a = ids.next_id();
    let b = other.next_id();
    let c = ids.next_id();
    assert_ne!(a, b);
    assert_ne!(b, c);
    assert!(a.starts_with('q'));
}
