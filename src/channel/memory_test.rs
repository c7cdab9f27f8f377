use super::*;
use crate::message::Reference;

fn record(id: Option<&str>, sender: &str, text: &str) -> MessageRecord {
    MessageRecord {
        id: id.map(MessageId::from),
        sender: sender.to_owned(),
        text: text.to_owned(),
        avatar_color: "#FF6B6B".to_owned(),
        sent_at: "09:00".to_owned(),
    }
}

#[tokio::test]
async fn history_request_is_answered_to_requester_only() {
    let hub = MemoryHub::with_history(vec![record(Some("1"), "A", "hi")]);
    let alice = hub.connect();
    let bob = hub.connect();
    let mut alice_sub = alice.subscribe();
    let mut bob_sub = bob.subscribe();

    alice.emit(OutboundEvent::RequestHistory).await.expect("emit");

    assert_eq!(
        alice_sub.try_recv(),
        Some(InboundEvent::History(vec![record(Some("1"), "A", "hi")]))
    );
    assert_eq!(bob_sub.try_recv(), None);
}

#[tokio::test]
async fn sent_message_is_broadcast_to_everyone_including_sender() {
    let hub = MemoryHub::new();
    let alice = hub.connect();
    let bob = hub.connect();
    let mut alice_sub = alice.subscribe();
    let mut bob_sub = bob.subscribe();

    let msg = record(Some("m1"), "Alice", "hello");
    alice.emit(OutboundEvent::SendMessage(msg.clone())).await.expect("emit");

    assert_eq!(alice_sub.try_recv(), Some(InboundEvent::MessageAppended(msg.clone())));
    assert_eq!(bob_sub.try_recv(), Some(InboundEvent::MessageAppended(msg.clone())));
    assert_eq!(hub.history(), vec![msg]);
}

#[tokio::test]
async fn id_less_message_gets_server_id() {
    let hub = MemoryHub::new();
    let chan = hub.connect();
    let mut sub = chan.subscribe();

    chan.emit(OutboundEvent::SendMessage(record(None, "A", "hi"))).await.expect("emit");

    let Some(InboundEvent::MessageAppended(appended)) = sub.try_recv() else {
        panic!("expected appended event");
    };
    assert!(appended.id.is_some());
    assert_eq!(hub.history()[0].id, appended.id);
}

#[tokio::test]
async fn update_and_delete_of_unknown_message_are_not_broadcast() {
    let hub = MemoryHub::new();
    let chan = hub.connect();
    let mut sub = chan.subscribe();

    let missing = Reference::Id(MessageId::from("missing"));
    chan.emit(OutboundEvent::UpdateMessage { reference: missing.clone(), text: "x".to_owned() })
        .await
        .expect("emit");
    chan.emit(OutboundEvent::DeleteMessage(missing)).await.expect("emit");

    assert_eq!(sub.try_recv(), None);
    assert_eq!(hub.received().len(), 2);
}

#[tokio::test]
async fn update_then_delete_are_broadcast_in_server_order() {
    let hub = MemoryHub::with_history(vec![record(Some("1"), "A", "hi")]);
    let chan = hub.connect();
    let mut sub = chan.subscribe();
    let reference = Reference::Id(MessageId::from("1"));

    chan.emit(OutboundEvent::UpdateMessage { reference: reference.clone(), text: "hey".to_owned() })
        .await
        .expect("emit");
    chan.emit(OutboundEvent::DeleteMessage(reference.clone())).await.expect("emit");

    assert_eq!(
        sub.try_recv(),
        Some(InboundEvent::MessageUpdated { reference: reference.clone(), text: "hey".to_owned() })
    );
    assert_eq!(sub.try_recv(), Some(InboundEvent::MessageDeleted(reference)));
    assert!(hub.history().is_empty());
}

#[tokio::test]
async fn offline_hub_rejects_emits() {
    let hub = MemoryHub::new();
    let chan = hub.connect();
    hub.set_offline(true);

    let err = chan.emit(OutboundEvent::RequestHistory).await.expect_err("offline");
    assert!(matches!(err, ChannelError::Closed));
    assert!(hub.received().is_empty());

    hub.set_offline(false);
    chan.emit(OutboundEvent::RequestHistory).await.expect("back online");
}

#[tokio::test]
async fn bounce_publishes_reconnected_to_every_channel() {
    let hub = MemoryHub::new();
    let a = hub.connect();
    let b = hub.connect();
    let mut a_sub = a.subscribe();
    let mut b_sub = b.subscribe();

    hub.bounce_connections();

    assert_eq!(a_sub.try_recv(), Some(InboundEvent::Reconnected));
    assert_eq!(b_sub.try_recv(), Some(InboundEvent::Reconnected));
}

#[tokio::test]
async fn dropped_subscription_hears_nothing_more() {
    let hub = MemoryHub::new();
    let chan = hub.connect();
    let sub = chan.subscribe();
    assert_eq!(chan.subscriber_count(), 1);

    drop(sub);
    assert_eq!(chan.subscriber_count(), 0);
    chan.emit(OutboundEvent::SendMessage(record(Some("1"), "A", "hi"))).await.expect("emit");
    assert_eq!(hub.history().len(), 1);
}
