// src/chat/rules.rs
//! Ordered routing table for chat messages. Rules are tried top to bottom
//! and the first one that matches decides the reply.

use crate::dataset::query::{canonical_tag, is_region, SpaceConditions};

/// Button label for the grouped list of every youth space.
pub const SPACE_OVERVIEW_BUTTON: &str = "청년 공간 상세";
pub const RANDOM_SPACE_BUTTON: &str = "✨ 랜덤 추천";
/// Prefix the condition search form sends: `조건별 검색: 지역=..|인원=..|목적=..`.
pub const CONDITION_SEARCH_PREFIX: &str = "조건별 검색:";

const PROGRAM_KEYWORDS: &[&str] = &[
    "프로그램", "교육", "강의", "과정", "모집", "신청", "바리스타", "취업", "컨설팅",
];
const SPACE_KEYWORDS: &[&str] = &["스터디", "창업", "회의", "카페", "라운지", "센터"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SpaceOverview,
    RandomSpace,
    ConditionSearch(SpaceConditions),
    RegionPrograms(String),
    RegionSpaces(String),
    SpaceTag(&'static str),
    ProgramDigest,
    SpaceSearch(String),
    Fallback,
}

pub struct Rule {
    pub name: &'static str,
    pub matches: fn(&str) -> Option<Command>,
}

pub static RULES: &[Rule] = &[
    Rule {
        name: "space_overview",
        matches: |t| (t.trim() == SPACE_OVERVIEW_BUTTON).then_some(Command::SpaceOverview),
    },
    Rule {
        name: "random_space",
        matches: |t| (t.trim() == RANDOM_SPACE_BUTTON).then_some(Command::RandomSpace),
    },
    Rule {
        name: "condition_search",
        matches: condition_search,
    },
    Rule {
        name: "region_programs",
        matches: region_programs,
    },
    Rule {
        name: "region_spaces",
        matches: |t| {
            let t = t.trim();
            is_region(t).then(|| Command::RegionSpaces(t.to_string()))
        },
    },
    Rule {
        name: "space_tag",
        matches: |t| canonical_tag(t).map(Command::SpaceTag),
    },
    Rule {
        name: "program_digest",
        matches: |t| {
            PROGRAM_KEYWORDS
                .iter()
                .any(|k| t.contains(k))
                .then_some(Command::ProgramDigest)
        },
    },
    Rule {
        name: "space_search",
        matches: |t| {
            SPACE_KEYWORDS
                .iter()
                .any(|k| t.contains(k))
                .then(|| Command::SpaceSearch(t.trim().to_string()))
        },
    },
];

/// "해운대구 프로그램" → programs in 해운대구. Unknown districts fall through.
fn region_programs(text: &str) -> Option<Command> {
    if !text.contains(" 프로그램") {
        return None;
    }
    let region = text.replace(" 프로그램", "");
    let region = region.trim();
    is_region(region).then(|| Command::RegionPrograms(region.to_string()))
}

fn condition_search(text: &str) -> Option<Command> {
    let (_, form) = text.split_once(CONDITION_SEARCH_PREFIX)?;
    let mut conditions = SpaceConditions::default();
    for pair in form.split('|') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let slot = match key.trim() {
            "지역" => &mut conditions.region,
            "인원" => &mut conditions.capacity,
            "목적" => &mut conditions.purpose,
            _ => continue,
        };
        *slot = Some(value.to_string());
    }
    Some(Command::ConditionSearch(conditions))
}

/// Fixed button labels; these never make a useful chat title.
pub fn is_button(command: &Command) -> bool {
    matches!(
        command,
        Command::SpaceOverview | Command::RandomSpace | Command::SpaceTag(_)
    )
}

pub fn classify(text: &str) -> Command {
    classify_from(text, 0).1
}

/// First match at or after rule index `start`, with the index of the rule
/// that fired (`RULES.len()` for the fallback).
pub fn classify_from(text: &str, start: usize) -> (usize, Command) {
    RULES
        .iter()
        .enumerate()
        .skip(start)
        .find_map(|(i, rule)| (rule.matches)(text).map(|cmd| (i, cmd)))
        .unwrap_or((RULES.len(), Command::Fallback))
}
