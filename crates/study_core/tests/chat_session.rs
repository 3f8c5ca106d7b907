use study_core::{ChatReply, ChatRole, ChatSession, SearchScore, CHAT_ERROR_REPLY};

#[test]
fn replies_keep_sources_and_scores() {
    let mut session = ChatSession::new("user_1700000000000");
    session.push_user("What is borrowing?");
    session.push_reply(ChatReply {
        answer: "A reference without ownership.".to_string(),
        sources_used: 2,
        search_scores: vec![SearchScore {
            score: 0.82,
            source: "https://example.com".to_string(),
        }],
        query_enhanced: true,
    });
    session.push_error();

    let messages = session.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].role, ChatRole::User);
    assert_eq!(messages[1].role, ChatRole::Ai);
    assert_eq!(messages[1].sources, Some(2));
    assert_eq!(messages[1].enhanced, Some(true));
    assert_eq!(messages[1].search_scores.len(), 1);
    assert_eq!(messages[2].text, CHAT_ERROR_REPLY);
}

#[test]
fn clear_empties_messages_but_keeps_the_id() {
    let mut session = ChatSession::new("user_42");
    session.push_user("hi");
    let deleted = session.clear();
    assert_eq!(deleted, "user_42");
    assert!(session.messages().is_empty());
    assert_eq!(session.session_id(), "user_42");
}
