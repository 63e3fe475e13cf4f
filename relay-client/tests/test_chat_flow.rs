//! End-to-end chat flow tests over the mock transport: subscription
//! scoping, enter/leave control messages, send guards, typing force-stop,
//! and the inbound event pipeline into the reconciliation engine.

mod common;

use std::time::Duration;

use relay_models::{ChatKey, MessageStatus};

use common::{
    connected_app, send_frame, typing_frame, MockTransport, LOCAL_USERNAME, LOCAL_USER_ID,
};

const OTHER_USER_ID: i64 = 9;

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn open_subscribes_and_sends_enter() {
    let transport = MockTransport::new();
    let app = connected_app(transport.clone()).await;

    let chat = ChatKey::room(5);
    app.chat().open(chat).await;

    let destinations = transport.subscribed_destinations().await;
    assert!(destinations.contains(&"/topic/room/5".to_string()));
    assert_eq!(
        transport.sent_to("/app/chat/room/5/enter").await.len(),
        1,
        "enter control message is sent on open"
    );
    assert_eq!(app.chat().active_chat().await, Some(chat));
}

#[tokio::test]
async fn open_twice_keeps_single_subscription() {
    let transport = MockTransport::new();
    let app = connected_app(transport.clone()).await;

    let chat = ChatKey::room(5);
    app.chat().open(chat).await;
    app.chat().open(chat).await;

    assert_eq!(app.socket().chat_subscription_count().await, 1);
    let chat_topics: Vec<String> = transport
        .subscribed_destinations()
        .await
        .into_iter()
        .filter(|d| d.starts_with("/topic/room"))
        .collect();
    assert_eq!(chat_topics, vec!["/topic/room/5".to_string()]);
}

#[tokio::test]
async fn open_b_after_a_leaves_a_first() {
    let transport = MockTransport::new();
    let app = connected_app(transport.clone()).await;

    let a = ChatKey::room(1);
    let b = ChatKey::conversation(2);
    app.chat().open(a).await;
    app.chat().open(b).await;

    // Exactly one live subscription, and it is B's.
    assert_eq!(app.socket().chat_subscription_count().await, 1);
    let destinations = transport.subscribed_destinations().await;
    assert!(!destinations.contains(&"/topic/room/1".to_string()));
    assert!(destinations.contains(&"/topic/conversation/2".to_string()));

    // A got its leave control message before B was entered.
    assert_eq!(transport.sent_to("/app/chat/room/1/leave").await.len(), 1);
    assert_eq!(
        transport.sent_to("/app/chat/conversation/2/enter").await.len(),
        1
    );
}

#[tokio::test]
async fn send_message_targets_chat_destination_and_stops_typing() {
    let transport = MockTransport::new();
    let app = connected_app(transport.clone()).await;

    let chat = ChatKey::conversation(42);
    app.chat().open(chat).await;

    // Start typing, then send: the send force-stops the typing indicator.
    app.chat().notify_typing().await;
    settle().await;

    assert!(app.chat().send_message("hello").await);
    settle().await;

    let sends = transport.sent_to("/app/chat/conversation/42").await;
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0]["content"], "hello");
    assert_eq!(sends[0]["type"], "CHAT");

    let typing = transport
        .sent_to("/app/chat/typing/conversation/42")
        .await;
    assert_eq!(
        typing,
        vec![
            serde_json::json!({"typing": true}),
            serde_json::json!({"typing": false}),
        ],
        "one typing=true from input, one forced typing=false from send"
    );
}

#[tokio::test]
async fn send_message_guards() {
    let transport = MockTransport::new();
    let app = connected_app(transport.clone()).await;

    // No active chat.
    assert!(!app.chat().send_message("hello").await);

    let chat = ChatKey::conversation(42);
    app.chat().open(chat).await;

    // Blank and whitespace-only text.
    assert!(!app.chat().send_message("").await);
    assert!(!app.chat().send_message("   \n").await);

    // Not connected.
    app.socket().disconnect().await;
    assert!(!app.chat().send_message("hello").await);

    assert!(transport.sent_to("/app/chat/conversation/42").await.is_empty());
}

#[tokio::test]
async fn reply_target_is_attached_and_consumed() {
    let transport = MockTransport::new();
    let app = connected_app(transport.clone()).await;

    let chat = ChatKey::conversation(42);
    app.chat().open(chat).await;

    app.chat().set_reply_target(99, "bob");
    assert!(app.chat().send_message("replying").await);

    let sends = transport.sent_to("/app/chat/conversation/42").await;
    assert_eq!(sends[0]["replyToId"], 99);
    assert!(
        app.chat().reply_target().is_none(),
        "reply target is consumed by a successful send"
    );

    // The next message is not a reply.
    assert!(app.chat().send_message("plain").await);
    let sends = transport.sent_to("/app/chat/conversation/42").await;
    assert!(sends[1].get("replyToId").is_none());
}

#[tokio::test]
async fn inbound_send_frames_deduplicate_by_id() {
    let transport = MockTransport::new();
    let app = connected_app(transport.clone()).await;

    let chat = ChatKey::conversation(42);
    app.chat().open(chat).await;

    let frame = send_frame(10, OTHER_USER_ID, "bob", "hi");
    transport.push_frame("/topic/conversation/42", frame.clone()).await;
    transport.push_frame("/topic/conversation/42", frame).await;
    settle().await;

    let messages = app.engine().messages(&chat);
    assert_eq!(messages.len(), 1, "the echo/duplicate path renders once");
    assert_eq!(messages[0].id, 10);
}

#[tokio::test]
async fn own_message_status_updates_apply_via_personal_queue() {
    let transport = MockTransport::new();
    let app = connected_app(transport.clone()).await;

    let chat = ChatKey::conversation(42);
    app.chat().open(chat).await;

    // The server echoes our own message, then reports it read through the
    // personal read-receipt queue (no chat scope on that stream).
    transport
        .push_frame(
            "/topic/conversation/42",
            send_frame(10, LOCAL_USER_ID, LOCAL_USERNAME, "mine"),
        )
        .await;
    transport
        .push_frame(
            "/topic/conversation/42",
            send_frame(11, OTHER_USER_ID, "bob", "theirs"),
        )
        .await;
    settle().await;

    transport
        .push_frame(
            "/user/queue/read-receipts",
            serde_json::json!({
                "type": "MESSAGE_READ",
                "data": {"messageId": 10, "readerId": OTHER_USER_ID, "readerName": "Bob Tran"}
            }),
        )
        .await;
    transport
        .push_frame(
            "/user/queue/read-receipts",
            serde_json::json!({
                "type": "MESSAGE_READ",
                "data": {"messageId": 11, "readerId": OTHER_USER_ID, "readerName": "Bob Tran"}
            }),
        )
        .await;
    settle().await;

    let mine = app.engine().message(&chat, 10).unwrap();
    assert_eq!(mine.status, MessageStatus::Read);
    assert_eq!(mine.read_by.as_deref(), Some("Bob Tran"));

    let theirs = app.engine().message(&chat, 11).unwrap();
    assert_eq!(
        theirs.status,
        MessageStatus::Sent,
        "receipts never mutate messages the local user did not send"
    );
}

#[tokio::test]
async fn remote_typing_flows_into_coordinator_and_leave_clears_it() {
    let transport = MockTransport::new();
    let app = connected_app(transport.clone()).await;

    let chat = ChatKey::room(5);
    app.chat().open(chat).await;

    transport
        .push_frame("/topic/room/5", typing_frame(OTHER_USER_ID, "bob", true))
        .await;
    settle().await;
    assert_eq!(app.typing().typing_users(&chat), vec!["bob".to_string()]);
    assert_eq!(app.typing().summary(&chat).unwrap(), "bob is typing");

    app.chat().leave().await;
    assert!(
        app.typing().typing_users(&chat).is_empty(),
        "deactivation clears the remote typing set"
    );
    assert_eq!(app.chat().active_chat().await, None);

    // leave() is idempotent.
    app.chat().leave().await;
}

#[tokio::test]
async fn events_for_left_chat_no_longer_arrive() {
    let transport = MockTransport::new();
    let app = connected_app(transport.clone()).await;

    let a = ChatKey::room(1);
    app.chat().open(a).await;
    app.chat().leave().await;

    transport
        .push_frame("/topic/room/1", send_frame(1, OTHER_USER_ID, "bob", "late"))
        .await;
    settle().await;

    assert!(
        app.engine().messages(&a).is_empty(),
        "a cancelled subscription must not mutate state"
    );
}

#[tokio::test]
async fn visibility_ping_payload() {
    let transport = MockTransport::new();
    let app = connected_app(transport.clone()).await;

    let chat = ChatKey::conversation(42);
    app.chat().open(chat).await;

    assert!(app.chat().mark_visible(10, true).await);
    let pings = transport.sent_to("/app/message/visibility").await;
    assert_eq!(pings[0], serde_json::json!({"messageId": 10, "visible": true}));
}
