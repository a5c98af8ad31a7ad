mod common;

use common::Harness;
use event_consumer::{EventHandler, HandlerError};
use event_schema::{
    DomainEvent, EventEnvelope, NewCommentEvent, NewPostEvent, NewReactionEvent,
    RegistrationCodeEvent, UserDeletedEvent,
};
use notification_service::dispatch::receipt_key;
use redis_utils::EphemeralStore;
use uuid::Uuid;

fn envelope(event: DomainEvent) -> EventEnvelope<DomainEvent> {
    EventEnvelope::new("community-service", event)
}

async fn three_subscribers(harness: &Harness) -> Vec<Uuid> {
    let mut ids = Vec::new();
    for (name, email) in [("A", "a@x.com"), ("B", "b@x.com"), ("C", "c@x.com")] {
        let id = Uuid::new_v4();
        harness.directory.insert(id, name, email).await;
        ids.push(id);
    }
    ids
}

fn new_post(subscriber_ids: Vec<Uuid>) -> DomainEvent {
    DomainEvent::NewPost(NewPostEvent {
        spector_name: "rust".to_string(),
        post_link: "http://localhost:8080/api/messages/1".to_string(),
        subscriber_ids,
    })
}

#[tokio::test]
async fn test_new_post_mails_every_subscriber() {
    let harness = Harness::new();
    let ids = three_subscribers(&harness).await;

    harness
        .dispatcher
        .handle(&envelope(new_post(ids)))
        .await
        .unwrap();

    let sent = harness.mailer.sent().await;
    assert_eq!(sent.len(), 3);
    assert_eq!(
        sent.iter().map(|e| e.to.as_str()).collect::<Vec<_>>(),
        vec!["a@x.com", "b@x.com", "c@x.com"]
    );
    assert!(sent.iter().all(|e| e.subject == "New post in spector rust"));
    assert!(sent
        .iter()
        .all(|e| e.body == "Check out the new post: http://localhost:8080/api/messages/1"));
}

#[tokio::test]
async fn test_one_failing_recipient_does_not_suppress_the_others() {
    let harness = Harness::new();
    let ids = three_subscribers(&harness).await;
    harness.mailer.fail_always("b@x.com").await;
    let event = envelope(new_post(ids));

    let err = harness.dispatcher.handle(&event).await.unwrap_err();
    assert!(matches!(err, HandlerError::Retryable(ref msg) if msg.contains("1 of 3")));

    assert_eq!(harness.mailer.sent_to().await, vec!["a@x.com", "c@x.com"]);
    // first attempt plus two retries
    assert_eq!(harness.mailer.attempts("b@x.com").await, 3);
    assert!(harness
        .receipts
        .exists(&receipt_key(event.event_id, "a@x.com"))
        .await
        .unwrap());
    assert!(!harness
        .receipts
        .exists(&receipt_key(event.event_id, "b@x.com"))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_redelivery_only_retries_failed_recipients() {
    let harness = Harness::new();
    let ids = three_subscribers(&harness).await;
    harness.mailer.fail_times("b@x.com", 3).await;
    let event = envelope(new_post(ids));

    assert!(harness.dispatcher.handle(&event).await.is_err());
    harness.dispatcher.handle(&event).await.unwrap();

    assert_eq!(
        harness.mailer.sent_to().await,
        vec!["a@x.com", "c@x.com", "b@x.com"]
    );
    assert_eq!(harness.mailer.attempts("a@x.com").await, 1);
    assert_eq!(harness.mailer.attempts("c@x.com").await, 1);
}

#[tokio::test]
async fn test_transient_send_failure_is_retried_in_place() {
    let harness = Harness::new();
    let ids = three_subscribers(&harness).await;
    harness.mailer.fail_times("c@x.com", 1).await;

    harness
        .dispatcher
        .handle(&envelope(new_post(ids)))
        .await
        .unwrap();

    assert_eq!(harness.mailer.sent().await.len(), 3);
    assert_eq!(harness.mailer.attempts("c@x.com").await, 2);
}

#[tokio::test]
async fn test_only_bad_addresses_is_permanent() {
    let harness = Harness::new();
    let id = Uuid::new_v4();
    harness.directory.insert(id, "Broken", "no-at-sign").await;

    let err = harness
        .dispatcher
        .handle(&envelope(new_post(vec![id])))
        .await
        .unwrap_err();

    assert!(matches!(err, HandlerError::Permanent(_)));
    assert_eq!(harness.mailer.attempts("no-at-sign").await, 1);
}

#[tokio::test]
async fn test_registration_code_goes_to_the_registering_address() {
    let harness = Harness::new();

    harness
        .dispatcher
        .handle(&envelope(DomainEvent::RegistrationCode(RegistrationCodeEvent {
            email: "a@x.com".to_string(),
            code: 482913,
        })))
        .await
        .unwrap();

    let sent = harness.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "a@x.com");
    assert_eq!(sent[0].subject, "Your Spectra registration code");
    assert_eq!(sent[0].body, "Your registration code: 482913");
}

#[tokio::test]
async fn test_comment_goes_to_parent_author() {
    let harness = Harness::new();
    let author = Uuid::new_v4();
    harness.directory.insert(author, "Author", "author@x.com").await;

    harness
        .dispatcher
        .handle(&envelope(DomainEvent::NewComment(NewCommentEvent {
            spector_name: "rust".to_string(),
            message_link: "http://x/api/messages/1".to_string(),
            comment_link: "http://x/api/messages/2".to_string(),
            author_user_id: author,
        })))
        .await
        .unwrap();

    assert_eq!(harness.mailer.sent_to().await, vec!["author@x.com"]);
}

#[tokio::test]
async fn test_reaction_names_the_reactor() {
    let harness = Harness::new();
    let target = Uuid::new_v4();
    let reactor = Uuid::new_v4();
    harness.directory.insert(target, "Target", "target@x.com").await;
    harness.directory.insert(reactor, "Bob", "bob@x.com").await;

    let reaction = |reacting_user_id| {
        envelope(DomainEvent::NewReaction(NewReactionEvent {
            message_link: "http://x/api/messages/1".to_string(),
            reaction_type: "LIKE".to_string(),
            target_user_id: target,
            reacting_user_id,
        }))
    };

    harness.dispatcher.handle(&reaction(reactor)).await.unwrap();
    harness
        .dispatcher
        .handle(&reaction(Uuid::new_v4()))
        .await
        .unwrap();

    let bodies: Vec<String> = harness
        .mailer
        .sent()
        .await
        .into_iter()
        .map(|e| e.body)
        .collect();
    assert_eq!(
        bodies,
        vec![
            "Bob reacted LIKE to your message http://x/api/messages/1",
            "Someone reacted LIKE to your message http://x/api/messages/1",
        ]
    );
}

#[tokio::test]
async fn test_directory_outage_is_retryable() {
    let harness = Harness::new();
    let ids = three_subscribers(&harness).await;
    harness.directory.fail_next(10);

    let err = harness
        .dispatcher
        .handle(&envelope(new_post(ids)))
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert!(harness.mailer.sent().await.is_empty());
}

#[tokio::test]
async fn test_brief_directory_blip_is_absorbed() {
    let harness = Harness::new();
    let ids = three_subscribers(&harness).await;
    harness.directory.fail_next(1);

    harness
        .dispatcher
        .handle(&envelope(new_post(ids)))
        .await
        .unwrap();

    assert_eq!(harness.mailer.sent().await.len(), 3);
}

#[tokio::test]
async fn test_user_deleted_sends_nothing() {
    let harness = Harness::new();

    harness
        .dispatcher
        .handle(&envelope(DomainEvent::UserDeleted(UserDeletedEvent {
            user_id: Uuid::new_v4(),
        })))
        .await
        .unwrap();

    assert!(harness.mailer.sent().await.is_empty());
}
