// tests/chat_service.rs
//
// Chat routing end to end: rules over the datasets, persistence of the
// conversation, and the LLM fallback.

mod common;

use std::sync::Arc;

use busan_youth_bot::chat::llm::{DisabledClient, MockClient};
use busan_youth_bot::chat::rules::RANDOM_SPACE_BUTTON;
use busan_youth_bot::chat::store::{ChatStore, InMemoryChatStore, Sender};
use busan_youth_bot::chat::{ChatError, ChatService, LLM_APOLOGY, UNTITLED_CHAT};
use busan_youth_bot::dataset::query::CONDITIONS_REQUIRED;
use busan_youth_bot::dataset::types::{Program, Space};
use common::{dataset_with, program, space, CountingScraper};
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    store: Arc<InMemoryChatStore>,
    llm: Arc<MockClient>,
    chat: ChatService,
}

fn harness(spaces: Option<Vec<Space>>, programs: Option<Vec<Program>>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let spaces = Arc::new(dataset_with(dir.path(), spaces, CountingScraper::new(vec![])));
    let programs = Arc::new(dataset_with(dir.path(), programs, CountingScraper::new(vec![])));
    let store = Arc::new(InMemoryChatStore::new());
    let llm = Arc::new(MockClient::default());
    let chat = ChatService::new(spaces, programs, store.clone(), llm.clone());
    Harness {
        _dir: dir,
        store,
        llm,
        chat,
    }
}

fn sample_spaces() -> Vec<Space> {
    vec![
        space("해운대 청년채움공간", "해운대구"),
        Space {
            description: Some("바다가 보이는 카페형 라운지".into()),
            ..space("광안 청년카페", "수영구")
        },
    ]
}

#[tokio::test]
async fn first_message_titles_the_chat_and_both_turns_are_stored() {
    let h = harness(Some(sample_spaces()), None);

    let reply = h.chat.process("해운대구", "anon-1", "c1").await.unwrap();
    assert!(reply.contains("해운대구 청년공간(1개)"), "{reply}");
    assert!(reply.contains("해운대 청년채움공간"));

    h.chat.process("수영구", "anon-1", "c1").await.unwrap();

    let chat = h.store.find_chat("c1").unwrap().unwrap();
    assert_eq!(chat.title, "해운대구");
    let senders: Vec<Sender> = chat.messages.iter().map(|m| m.sender).collect();
    assert_eq!(
        senders,
        vec![Sender::User, Sender::Bot, Sender::User, Sender::Bot]
    );
    assert_eq!(chat.messages[2].text, "수영구");
    assert_eq!(h.llm.calls(), 0);
}

#[tokio::test]
async fn missing_fields_are_rejected_before_anything_is_stored() {
    let h = harness(None, None);

    let err = h.chat.process("  ", "anon-1", "c1").await.unwrap_err();
    assert!(matches!(err, ChatError::MissingField("message")));
    let err = h.chat.process("안녕", "", "c1").await.unwrap_err();
    assert!(matches!(err, ChatError::MissingField("anonymousId")));
    let err = h.chat.process("안녕", "anon-1", "").await.unwrap_err();
    assert!(matches!(err, ChatError::MissingField("chatId")));

    assert_eq!(h.chat.stats().unwrap().total_users, 0);
}

#[tokio::test]
async fn region_with_program_suffix_lists_programs() {
    let h = harness(
        None,
        Some(vec![
            program("[해운대구] 바리스타 교육", Some("해운대구")),
            program("[금정구] 창업 특강", Some("금정구")),
        ]),
    );
    let reply = h.chat.respond("해운대구 프로그램", "").await;
    assert!(reply.contains("바리스타 교육"), "{reply}");
    assert!(!reply.contains("창업 특강"));

    let reply = h.chat.respond("사하구 프로그램", "").await;
    assert!(reply.contains("사하구"), "{reply}");
    assert!(reply.contains("찾을 수 없습니다"));
}

#[tokio::test]
async fn program_keyword_shows_digest_when_programs_exist() {
    let h = harness(None, Some(vec![program("청년 취업 컨설팅", None)]));
    let reply = h.chat.respond("취업 도와줘", "").await;
    assert!(reply.contains("부산 청년 프로그램 모집중"), "{reply}");
    assert!(reply.contains("청년 취업 컨설팅"));
}

#[tokio::test]
async fn program_keyword_without_programs_falls_through_to_later_rules() {
    let h = harness(Some(sample_spaces()), None);

    // "교육" triggers the digest, "카페" the space search behind it
    let reply = h.chat.respond("카페 교육", "").await;
    assert!(reply.contains("**카페 교육** 관련 청년공간"), "{reply}");
    assert_eq!(h.llm.calls(), 0);

    // nothing behind the digest matches: the LLM answers
    let reply = h.chat.respond("교육 일정", "").await;
    assert_eq!(reply, "[mock] 교육 일정");
    assert_eq!(h.llm.calls(), 1);
}

#[tokio::test]
async fn unmatched_text_goes_to_the_llm_with_history() {
    let h = harness(Some(sample_spaces()), None);
    h.chat.process("수영구", "anon-1", "c1").await.unwrap();
    let reply = h.chat.process("고마워요", "anon-1", "c1").await.unwrap();
    assert_eq!(reply, "[mock] 고마워요");
    assert_eq!(h.llm.calls(), 1);
}

#[tokio::test]
async fn disabled_llm_apologises() {
    let dir = tempfile::tempdir().unwrap();
    let chat = ChatService::new(
        Arc::new(dataset_with::<Space>(dir.path(), None, CountingScraper::new(vec![]))),
        Arc::new(dataset_with::<Program>(dir.path(), None, CountingScraper::new(vec![]))),
        Arc::new(InMemoryChatStore::new()),
        Arc::new(DisabledClient),
    );
    assert_eq!(chat.llm_provider(), "disabled");
    assert_eq!(chat.respond("오늘 날씨 어때", "").await, LLM_APOLOGY);
}

#[tokio::test]
async fn random_recommendation_picks_a_listed_space() {
    let h = harness(Some(sample_spaces()), None);
    let reply = h.chat.respond(RANDOM_SPACE_BUTTON, "").await;
    assert!(reply.contains("랜덤으로 추천"), "{reply}");
    assert!(reply.contains("해운대 청년채움공간") || reply.contains("광안 청년카페"));

    let empty = harness(None, None);
    let reply = empty.chat.respond(RANDOM_SPACE_BUTTON, "").await;
    assert!(reply.contains("불러올 수 없습니다"));
}

#[tokio::test]
async fn history_and_deletion() {
    let h = harness(Some(sample_spaces()), None);
    h.chat.process("해운대구", "anon-1", "a").await.unwrap();
    h.chat.process("수영구", "anon-1", "b").await.unwrap();
    h.chat.process("수영구", "anon-2", "z").await.unwrap();

    let history = h.chat.history("anon-1").unwrap();
    assert_eq!(history.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(history["a"].title, "해운대구");
    assert_eq!(history["a"].messages.len(), 2);
    assert!(h.chat.history("nobody").unwrap().is_empty());

    h.chat.delete_chat("a").unwrap();
    assert!(matches!(
        h.chat.delete_chat("a"),
        Err(ChatError::ChatNotFound(id)) if id == "a"
    ));
    assert_eq!(h.chat.history("anon-1").unwrap().len(), 1);

    let stats = h.chat.stats().unwrap();
    assert_eq!((stats.total_users, stats.total_chats, stats.total_messages), (2, 2, 4));
}

#[tokio::test]
async fn create_user_is_idempotent() {
    let h = harness(None, None);
    let (first, created) = h.chat.create_user("anon-9").unwrap();
    assert!(created);
    let (again, created) = h.chat.create_user("anon-9").unwrap();
    assert!(!created);
    assert_eq!(first.id, again.id);
    assert!(matches!(
        h.chat.create_user(""),
        Err(ChatError::MissingField("anonymous_id"))
    ));
    assert_eq!(h.chat.user_info("anon-9").unwrap().map(|u| u.id), Some(first.id));
    assert!(h.chat.user_info("anon-0").unwrap().is_none());
}

#[tokio::test]
async fn button_press_does_not_title_the_chat() {
    let h = harness(Some(sample_spaces()), None);

    h.chat.process(RANDOM_SPACE_BUTTON, "anon-1", "c1").await.unwrap();
    h.chat.process("🧘휴식/놀이", "anon-1", "c1").await.unwrap();
    assert_eq!(h.store.find_chat("c1").unwrap().unwrap().title, UNTITLED_CHAT);

    // the first typed message names it, later ones do not
    h.chat.process("수영구", "anon-1", "c1").await.unwrap();
    h.chat.process("해운대구", "anon-1", "c1").await.unwrap();
    let chat = h.store.find_chat("c1").unwrap().unwrap();
    assert_eq!(chat.title, "수영구");
    assert_eq!(chat.messages.len(), 8);
}

fn sized_spaces() -> Vec<Space> {
    vec![
        Space {
            capacity_min: Some(1),
            capacity_max: Some(4),
            keywords: vec!["📝스터디/회의".into()],
            ..space("해운대 청년채움공간", "해운대구")
        },
        Space {
            capacity_min: Some(10),
            capacity_max: Some(40),
            keywords: vec!["🎪행사/이벤트".into()],
            ..space("부산청년센터", "부산진구")
        },
    ]
}

#[tokio::test]
async fn condition_search_ranks_and_explains_matches() {
    let h = harness(Some(sized_spaces()), None);

    let reply = h
        .chat
        .respond("조건별 검색: 지역=해운대구|인원=3-6명|목적=스터디/회의", "")
        .await;
    assert!(reply.contains("✅ **선택하신 조건**"), "{reply}");
    assert!(reply.contains("• 지역: 해운대구"));
    assert!(reply.contains("**총 1개의 공간**"), "{reply}");
    assert!(reply.contains("**1. 해운대 청년채움공간**"));
    assert!(reply.contains("최소 1명 ~ 최대 4명"), "{reply}");

    let reply = h.chat.respond("조건별 검색: 인원=7명이상", "").await;
    assert!(reply.contains("**1. 부산청년센터**"), "{reply}");
    assert!(!reply.contains("해운대 청년채움공간"));

    let reply = h.chat.respond("조건별 검색: 지역=기장군", "").await;
    assert!(reply.starts_with("😥 **지역: 기장군**"), "{reply}");
    assert_eq!(h.llm.calls(), 0);
}

#[tokio::test]
async fn condition_search_needs_at_least_one_condition() {
    let h = harness(Some(sized_spaces()), None);
    let reply = h.chat.respond("조건별 검색: 지역=|인원=|목적=", "").await;
    assert_eq!(reply, CONDITIONS_REQUIRED);

    let empty = harness(None, None);
    let reply = empty.chat.respond("조건별 검색: 지역=해운대구", "").await;
    assert!(reply.contains("청년공간 정보를 가져올 수 없습니다"), "{reply}");
}
