mod common;

use common::{link, Harness};
use community_service::models::{CreateMessageRequest, ReactionType, SpectorRequest};
use community_service::services::cache::message_key;
use community_service::CommunityError;
use event_schema::DomainEvent;
use redis_utils::EphemeralStore;
use uuid::Uuid;

fn spector_named(name: &str) -> SpectorRequest {
    SpectorRequest {
        name: Some(name.to_string()),
        description: Some("about".to_string()),
    }
}

fn post(spector_id: Uuid, body: &str) -> CreateMessageRequest {
    CreateMessageRequest {
        spector_id,
        parent_message_id: None,
        body: body.to_string(),
    }
}

fn reply(spector_id: Uuid, parent: Uuid, body: &str) -> CreateMessageRequest {
    CreateMessageRequest {
        spector_id,
        parent_message_id: Some(parent),
        body: body.to_string(),
    }
}

#[tokio::test]
async fn test_post_to_spector_with_three_subscribers_names_exactly_them() {
    let harness = Harness::new();
    let owner = Uuid::new_v4();
    let spector = harness
        .state
        .spectors
        .create(owner, spector_named("rust"))
        .await
        .unwrap();

    let mut subscribers = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
    for user in &subscribers {
        harness.state.spectors.subscribe(*user, spector.id).await.unwrap();
    }

    let message = harness
        .state
        .messages
        .create(owner, post(spector.id, "hello"))
        .await
        .unwrap();

    let events = harness.events().await;
    assert_eq!(events.len(), 1);
    let DomainEvent::NewPost(event) = &events[0] else {
        panic!("expected NewPost, got {:?}", events[0]);
    };
    let mut notified = event.subscriber_ids.clone();
    notified.sort();
    subscribers.sort();
    assert_eq!(notified, subscribers);
    assert_eq!(event.spector_name, "rust");
    assert_eq!(event.post_link, link(message.id));
}

#[tokio::test]
async fn test_only_owner_may_start_a_thread() {
    let harness = Harness::new();
    let owner = Uuid::new_v4();
    let member = Uuid::new_v4();
    let spector = harness
        .state
        .spectors
        .create(owner, spector_named("rust"))
        .await
        .unwrap();
    harness.state.spectors.subscribe(member, spector.id).await.unwrap();

    let err = harness
        .state
        .messages
        .create(member, post(spector.id, "not allowed"))
        .await
        .unwrap_err();
    assert!(matches!(err, CommunityError::BadRequest(_)));
    assert!(err.to_string().contains("is not the owner"));
    assert!(harness.events().await.is_empty());
}

#[tokio::test]
async fn test_anyone_may_reply_and_only_third_party_replies_notify() {
    let harness = Harness::new();
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let spector = harness
        .state
        .spectors
        .create(owner, spector_named("rust"))
        .await
        .unwrap();
    let thread = harness
        .state
        .messages
        .create(owner, post(spector.id, "thread"))
        .await
        .unwrap();
    harness.events().await;

    harness
        .state
        .messages
        .create(owner, reply(spector.id, thread.id, "self reply"))
        .await
        .unwrap();
    assert!(harness.events().await.is_empty());

    let answer = harness
        .state
        .messages
        .create(stranger, reply(spector.id, thread.id, "hi"))
        .await
        .unwrap();
    assert_eq!(answer.parent_message_id, Some(thread.id));

    let events = harness.events().await;
    assert_eq!(events.len(), 1);
    let DomainEvent::NewComment(event) = &events[0] else {
        panic!("expected NewComment, got {:?}", events[0]);
    };
    assert_eq!(event.author_user_id, owner);
    assert_eq!(event.message_link, link(thread.id));
    assert_eq!(event.comment_link, link(answer.id));
}

#[tokio::test]
async fn test_reply_parent_must_exist_in_same_spector() {
    let harness = Harness::new();
    let owner = Uuid::new_v4();
    let first = harness
        .state
        .spectors
        .create(owner, spector_named("first"))
        .await
        .unwrap();
    let second = harness
        .state
        .spectors
        .create(owner, spector_named("second"))
        .await
        .unwrap();
    let thread = harness
        .state
        .messages
        .create(owner, post(first.id, "thread"))
        .await
        .unwrap();

    let err = harness
        .state
        .messages
        .create(owner, reply(second.id, thread.id, "wrong place"))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "There is no parent message with this id in this spector"
    );

    let missing = Uuid::new_v4();
    let err = harness
        .state
        .messages
        .create(owner, reply(first.id, missing, "orphan"))
        .await
        .unwrap_err();
    assert!(matches!(err, CommunityError::NotFound(_)));

    let err = harness
        .state
        .messages
        .create(owner, post(Uuid::new_v4(), "nowhere"))
        .await
        .unwrap_err();
    assert!(matches!(err, CommunityError::NotFound(_)));
}

#[tokio::test]
async fn test_only_author_edits_and_deletes_messages() {
    let harness = Harness::new();
    let owner = Uuid::new_v4();
    let other = Uuid::new_v4();
    let spector = harness
        .state
        .spectors
        .create(owner, spector_named("rust"))
        .await
        .unwrap();
    let thread = harness
        .state
        .messages
        .create(owner, post(spector.id, "thread"))
        .await
        .unwrap();

    let err = harness
        .state
        .messages
        .update(other, thread.id, "hijack".to_string())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Only creator can edit a message");

    let err = harness
        .state
        .messages
        .delete(other, thread.id)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Only creator can delete a message");

    let edited = harness
        .state
        .messages
        .update(owner, thread.id, "edited".to_string())
        .await
        .unwrap();
    assert_eq!(edited.body, "edited");

    harness.state.messages.delete(owner, thread.id).await.unwrap();
    let err = harness.state.messages.get(thread.id).await.unwrap_err();
    assert!(matches!(err, CommunityError::NotFound(_)));
}

#[tokio::test]
async fn test_deleting_a_thread_drops_cached_replies() {
    let harness = Harness::new();
    let owner = Uuid::new_v4();
    let other = Uuid::new_v4();
    let spector = harness
        .state
        .spectors
        .create(owner, spector_named("rust"))
        .await
        .unwrap();
    let thread = harness
        .state
        .messages
        .create(owner, post(spector.id, "thread"))
        .await
        .unwrap();
    let answer = harness
        .state
        .messages
        .create(other, reply(spector.id, thread.id, "reply"))
        .await
        .unwrap();

    assert_eq!(harness.state.messages.get(answer.id).await.unwrap(), answer);
    harness.state.messages.delete(owner, thread.id).await.unwrap();

    assert!(harness.state.messages.get(answer.id).await.is_err());
}

#[tokio::test]
async fn test_cached_read_reflects_edits() {
    let harness = Harness::new();
    let owner = Uuid::new_v4();
    let spector = harness
        .state
        .spectors
        .create(owner, spector_named("rust"))
        .await
        .unwrap();
    let thread = harness
        .state
        .messages
        .create(owner, post(spector.id, "v1"))
        .await
        .unwrap();

    assert_eq!(harness.state.messages.get(thread.id).await.unwrap().body, "v1");
    harness
        .state
        .messages
        .update(owner, thread.id, "v2".to_string())
        .await
        .unwrap();
    assert!(!harness.store.exists(&message_key(thread.id)).await.unwrap());

    assert_eq!(harness.state.messages.get(thread.id).await.unwrap().body, "v2");
    assert!(harness.store.exists(&message_key(thread.id)).await.unwrap());
}

#[tokio::test]
async fn test_reactions_notify_author_and_only_reactor_deletes() {
    let harness = Harness::new();
    let owner = Uuid::new_v4();
    let fan = Uuid::new_v4();
    let spector = harness
        .state
        .spectors
        .create(owner, spector_named("rust"))
        .await
        .unwrap();
    let thread = harness
        .state
        .messages
        .create(owner, post(spector.id, "thread"))
        .await
        .unwrap();
    harness.events().await;

    let reaction = harness
        .state
        .reactions
        .create(fan, thread.id, ReactionType::Like)
        .await
        .unwrap();

    let events = harness.events().await;
    let DomainEvent::NewReaction(event) = &events[0] else {
        panic!("expected NewReaction, got {:?}", events[0]);
    };
    assert_eq!(event.target_user_id, owner);
    assert_eq!(event.reacting_user_id, fan);
    assert_eq!(event.reaction_type, "LIKE");
    assert_eq!(event.message_link, link(thread.id));

    let err = harness
        .state
        .reactions
        .delete(owner, thread.id, reaction.id)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Only creator can delete a reaction");

    harness
        .state
        .reactions
        .delete(fan, thread.id, reaction.id)
        .await
        .unwrap();
    assert!(harness.state.reactions.list(thread.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_spector_rules() {
    let harness = Harness::new();
    let owner = Uuid::new_v4();
    let other = Uuid::new_v4();

    let err = harness
        .state
        .spectors
        .create(owner, SpectorRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Property \"name\" must be specified");

    let spector = harness
        .state
        .spectors
        .create(owner, spector_named("rust"))
        .await
        .unwrap();
    let err = harness
        .state
        .spectors
        .create(other, spector_named("rust"))
        .await
        .unwrap_err();
    assert!(matches!(err, CommunityError::Conflict(_)));

    let err = harness
        .state
        .spectors
        .update(other, spector.id, spector_named("mine"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("is not the owner"));

    let err = harness
        .state
        .spectors
        .update(owner, spector.id, SpectorRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "At least one property must be changed");

    let err = harness
        .state
        .spectors
        .update(
            owner,
            spector.id,
            SpectorRequest {
                name: Some("  ".to_string()),
                description: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Property \"name\" cannot be empty string");

    let renamed = harness
        .state
        .spectors
        .update(owner, spector.id, spector_named("rustaceans"))
        .await
        .unwrap();
    assert_eq!(renamed.name, "rustaceans");

    assert!(harness.state.spectors.delete(other, spector.id).await.is_err());
    harness.state.spectors.delete(owner, spector.id).await.unwrap();
    assert!(harness.state.spectors.get(spector.id).await.is_err());
    assert!(harness.repo.memberships_of(owner).await.is_empty());
}

#[tokio::test]
async fn test_subscribe_is_idempotent_and_subscribers_resolve_names() {
    let harness = Harness::new();
    let owner = Uuid::new_v4();
    let member = Uuid::new_v4();
    harness.directory.insert(owner, "Owner", "owner@x.com").await;
    harness.directory.insert(member, "Member", "member@x.com").await;

    let spector = harness
        .state
        .spectors
        .create(owner, spector_named("rust"))
        .await
        .unwrap();
    harness.state.spectors.subscribe(member, spector.id).await.unwrap();
    harness.state.spectors.subscribe(member, spector.id).await.unwrap();

    harness.directory.fail_next(1);
    let mut names: Vec<String> = harness
        .state
        .spectors
        .subscribers(spector.id)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["Member", "Owner"]);

    harness.state.spectors.unsubscribe(member, spector.id).await.unwrap();
    assert!(harness.repo.memberships_of(member).await.is_empty());
}
