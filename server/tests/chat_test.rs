//! Tests for the chat history cache: system preamble seeding, last
//! assistant reply lookup, reset, and restart hydration.

use botbridge_server::chat::{
    ChatHistoryCache, ClearOutcome, LastReply, ROLE_ASSISTANT, ROLE_SYSTEM, ROLE_USER,
};
use botbridge_server::db::models::ChatMessage;
use botbridge_server::db::{self, DbPool};

const PROMPT: &str = "You are a terse test assistant.";

fn cache(db: &DbPool) -> std::sync::Arc<ChatHistoryCache> {
    ChatHistoryCache::new(db.clone(), PROMPT.to_string())
}

fn user_turn(content: &str) -> ChatMessage {
    ChatMessage {
        role: ROLE_USER.to_string(),
        content: content.to_string(),
    }
}

#[tokio::test]
async fn first_append_seeds_the_system_preamble() {
    let db = db::init_db_in_memory().unwrap();
    let chat = cache(&db);

    let history = chat.append("user-1", user_turn("hello")).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, ROLE_SYSTEM);
    assert_eq!(history[0].content, PROMPT);
    assert_eq!(history[1].role, ROLE_USER);
    assert_eq!(history[1].content, "hello");

    // Later appends extend without reseeding.
    let history = chat
        .append(
            "user-1",
            ChatMessage {
                role: ROLE_ASSISTANT.to_string(),
                content: "hi".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history.iter().filter(|m| m.role == ROLE_SYSTEM).count(), 1);
}

#[tokio::test]
async fn last_assistant_reply_distinguishes_empty_from_unanswered() {
    let db = db::init_db_in_memory().unwrap();
    let chat = cache(&db);

    assert_eq!(chat.last_assistant_reply("user-1"), LastReply::NoHistory);

    chat.append("user-1", user_turn("anyone there?")).await.unwrap();
    assert_eq!(
        chat.last_assistant_reply("user-1"),
        LastReply::NoAssistantTurn
    );

    for content in ["first answer", "second answer"] {
        chat.append(
            "user-1",
            ChatMessage {
                role: ROLE_ASSISTANT.to_string(),
                content: content.to_string(),
            },
        )
        .await
        .unwrap();
    }
    chat.append("user-1", user_turn("and then?")).await.unwrap();

    // The newest assistant turn wins, even with a user turn after it.
    assert_eq!(
        chat.last_assistant_reply("user-1"),
        LastReply::Found("second answer".to_string())
    );
}

#[tokio::test]
async fn clear_wipes_history_and_the_next_append_reseeds() {
    let db = db::init_db_in_memory().unwrap();
    let chat = cache(&db);

    assert_eq!(
        chat.clear("user-1").await.unwrap(),
        ClearOutcome::NothingToClear
    );

    chat.append("user-1", user_turn("hello")).await.unwrap();
    assert_eq!(chat.clear("user-1").await.unwrap(), ClearOutcome::Cleared);
    assert_eq!(chat.history("user-1"), None);

    let history = chat.append("user-1", user_turn("again")).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, ROLE_SYSTEM);
}

#[tokio::test]
async fn hydrate_rebuilds_histories_from_the_table() {
    let db = db::init_db_in_memory().unwrap();
    let chat = cache(&db);

    chat.append("user-1", user_turn("hello")).await.unwrap();
    chat.append(
        "user-1",
        ChatMessage {
            role: ROLE_ASSISTANT.to_string(),
            content: "hi".to_string(),
        },
    )
    .await
    .unwrap();
    chat.append("user-2", user_turn("ping")).await.unwrap();

    // A fresh cache over the same database, as after a restart.
    let rebuilt = cache(&db);
    assert_eq!(rebuilt.history("user-1"), None);
    let loaded = rebuilt.hydrate().await.unwrap();
    assert_eq!(loaded, 5);

    let history = rebuilt.history("user-1").expect("hydrated history");
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].role, ROLE_SYSTEM);
    assert_eq!(history[2].content, "hi");
    assert_eq!(
        rebuilt.last_assistant_reply("user-1"),
        LastReply::Found("hi".to_string())
    );

    // Appending after hydration must not reseed.
    let history = rebuilt.append("user-1", user_turn("more")).await.unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history.iter().filter(|m| m.role == ROLE_SYSTEM).count(), 1);
}
