// src/dataset/query.rs
//! Filters, lookups and chat rendering over the merged view.
//!
//! Filters are pure functions over slices; `Dataset` wraps them into
//! `QueryResult` so callers can tell "no data" from "no match".

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::dataset::types::{present, DatasetKind, Program, Record, Space};

/// Busan districts accepted as region filters.
pub const REGIONS: [&str; 16] = [
    "중구", "동구", "서구", "영도구", "부산진구", "동래구", "연제구", "금정구", "북구", "사상구",
    "사하구", "강서구", "남구", "해운대구", "수영구", "기장군",
];

pub fn is_region(s: &str) -> bool {
    REGIONS.contains(&s)
}

/// Exact, case-sensitive match on `region`. `"해운대구 "` is not `"해운대구"`.
pub fn by_region<R: Record>(records: &[R], region: &str) -> Vec<R> {
    records
        .iter()
        .filter(|r| r.region() == Some(region))
        .cloned()
        .collect()
}

/// Case-insensitive containment in either direction against name,
/// description and region.
pub fn by_keyword<R: Record>(records: &[R], keyword: &str) -> Vec<R> {
    let kw = keyword.trim().to_lowercase();
    if kw.is_empty() {
        return Vec::new();
    }
    records
        .iter()
        .filter(|r| {
            [Some(r.name()), r.description(), r.region()]
                .into_iter()
                .flatten()
                .any(|field| loosely_contains(field, &kw))
        })
        .cloned()
        .collect()
}

/// First record whose name contains `fragment` (or is contained by it),
/// ignoring case.
pub fn by_name<R: Record>(records: &[R], fragment: &str) -> Option<R> {
    let frag = fragment.trim().to_lowercase();
    if frag.is_empty() {
        return None;
    }
    records
        .iter()
        .find(|r| loosely_contains(r.name(), &frag))
        .cloned()
}

/// Records tagged with `tag` after resolving both sides through the
/// synonym table.
pub fn by_tag<R: Record>(records: &[R], tag: &str) -> Vec<R> {
    let wanted = search_terms(tag);
    records
        .iter()
        .filter(|r| has_any_tag(*r, &wanted))
        .cloned()
        .collect()
}

fn has_any_tag<R: Record>(record: &R, wanted: &[String]) -> bool {
    record.keywords().iter().any(|kw| {
        let kw = kw.trim().to_lowercase();
        !kw.is_empty() && wanted.iter().any(|w| loosely_contains(&kw, w))
    })
}

/// `needle` must already be lowercase.
fn loosely_contains(field: &str, needle: &str) -> bool {
    let field = field.trim().to_lowercase();
    if field.is_empty() {
        return false;
    }
    field.contains(needle) || needle.contains(field.as_str())
}

// ------------------------------------------------------------
// Keyword tags
// ------------------------------------------------------------

/// Canonical tag → every spelling seen in the chat UI over time.
static TAG_SYNONYMS: &[(&str, &[&str])] = &[
    ("📝스터디/회의", &["📝 스터디/회의", "스터디/회의", "스터디", "회의"]),
    ("🎤교육/강연", &["🏫교육/강연", "🏫 교육/강연", "교육/강연", "교육", "강연"]),
    (
        "👥커뮤니티",
        &["👥모임/커뮤니티", "👥 모임/커뮤니티", "모임/커뮤니티", "커뮤니티", "모임"],
    ),
    ("🚀진로/창업", &["🚀 진로/창업", "진로/창업", "진로", "창업"]),
    ("🎨문화/창작", &["🎨 문화/창작", "문화/창작", "문화", "창작"]),
    ("🛠작업/창작실", &["💻작업/창작실", "💻 작업/창작실", "작업/창작실", "작업", "창작실"]),
    ("🧘휴식/놀이", &["🌿휴식/놀이", "🌿 휴식/놀이", "휴식/놀이", "휴식", "놀이"]),
    ("🎪행사/이벤트", &["🎬행사/이벤트", "🎬 행사/이벤트", "행사/이벤트", "행사", "이벤트"]),
];

/// Spellings that only ever came from a tag button. Bare words such as
/// "교육" stay free text so they can reach the broader chat rules.
fn is_button_spelling(s: &str) -> bool {
    s.contains('/')
}

/// Resolve a button label (current or legacy spelling) to its canonical tag.
pub fn canonical_tag(input: &str) -> Option<&'static str> {
    let s = input.trim();
    TAG_SYNONYMS.iter().find_map(|(canon, alts)| {
        let hit = *canon == s || alts.iter().any(|a| is_button_spelling(a) && *a == s);
        hit.then_some(*canon)
    })
}

pub fn canonical_tags() -> impl Iterator<Item = &'static str> {
    TAG_SYNONYMS.iter().map(|(canon, _)| *canon)
}

/// Canonical tags whose plain-word spellings occur in `text`. Used to tag
/// scraped spaces from their name and description.
pub fn infer_tags(text: &str) -> Vec<String> {
    let text = text.to_lowercase();
    TAG_SYNONYMS
        .iter()
        .filter(|(_, alts)| {
            alts.iter()
                .any(|a| !is_button_spelling(a) && text.contains(&a.to_lowercase()))
        })
        .map(|(canon, _)| canon.to_string())
        .collect()
}

fn search_terms(tag: &str) -> Vec<String> {
    let mut terms = vec![tag.trim().to_lowercase()];
    let canon = canonical_tag(tag).unwrap_or("");
    if let Some((c, alts)) = TAG_SYNONYMS.iter().find(|(c, _)| *c == canon) {
        terms.push(c.to_lowercase());
        terms.extend(alts.iter().map(|a| a.to_lowercase()));
    }
    terms.retain(|t| !t.is_empty());
    terms.dedup();
    terms
}

// ------------------------------------------------------------
// Condition search (region / headcount / purpose)
// ------------------------------------------------------------

/// Headcount choices offered by the condition search form.
pub const CAPACITY_BRACKETS: [&str; 4] = ["1-2명", "3-6명", "7명이상", "상관없음"];

pub const CONDITIONS_REQUIRED: &str = "❌ 지역, 인원, 이용 목적 중 하나는 반드시 선택해주세요.";

/// Filters picked in the condition search form; blank choices are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpaceConditions {
    pub region: Option<String>,
    pub capacity: Option<String>,
    pub purpose: Option<String>,
}

impl SpaceConditions {
    pub fn is_empty(&self) -> bool {
        self.region.is_none() && self.capacity.is_none() && self.purpose.is_none()
    }

    fn labels(&self) -> Vec<String> {
        [("지역", &self.region), ("인원", &self.capacity), ("목적", &self.purpose)]
            .into_iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| format!("{k}: {v}")))
            .collect()
    }
}

/// A space that met at least one condition, with the conditions it met.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionMatch {
    pub space: Space,
    pub reasons: Vec<String>,
}

/// Spaces without any headcount data fit every bracket.
pub fn capacity_matches(space: &Space, bracket: &str) -> bool {
    let (min, max) = (space.capacity_min, space.capacity_max);
    if min.is_none() && max.is_none() {
        return true;
    }
    match bracket {
        "1-2명" => min.map_or(true, |m| m <= 2),
        "3-6명" => min.map_or(true, |m| m <= 6) && max.map_or(true, |m| m >= 3),
        "7명이상" => max.map_or(true, |m| m >= 7),
        "상관없음" => true,
        _ => false,
    }
}

/// Purpose is a tag label ("스터디/회의") matched through the synonym table.
pub fn purpose_matches(space: &Space, purpose: &str) -> bool {
    has_any_tag(space, &search_terms(purpose))
}

/// Spaces meeting any chosen condition, most conditions met first (stable).
pub fn by_conditions(spaces: &[Space], conditions: &SpaceConditions) -> Vec<ConditionMatch> {
    let mut hits: Vec<ConditionMatch> = spaces
        .iter()
        .filter_map(|space| {
            let mut reasons = Vec::new();
            if let Some(region) = &conditions.region {
                if space.region.as_deref() == Some(region.as_str()) {
                    reasons.push(format!("지역: {region}"));
                }
            }
            if let Some(capacity) = &conditions.capacity {
                if capacity_matches(space, capacity) {
                    reasons.push(format!("인원: {capacity}"));
                }
            }
            if let Some(purpose) = &conditions.purpose {
                if purpose_matches(space, purpose) {
                    reasons.push(format!("목적: {purpose}"));
                }
            }
            (!reasons.is_empty()).then(|| ConditionMatch {
                space: space.clone(),
                reasons,
            })
        })
        .collect();
    hits.sort_by(|a, b| b.reasons.len().cmp(&a.reasons.len()));
    hits
}

fn capacity_label(space: &Space) -> String {
    match (space.capacity_min, space.capacity_max) {
        (Some(min), Some(max)) => format!("최소 {min}명 ~ 최대 {max}명"),
        (None, Some(max)) => format!("최대 {max}명"),
        (Some(min), None) => format!("최소 {min}명"),
        (None, None) => "인원 제한 없음".to_string(),
    }
}

pub fn render_condition_results(conditions: &SpaceConditions, hits: &[ConditionMatch]) -> String {
    let mut out = String::from("✅ **선택하신 조건**\n");
    for label in conditions.labels() {
        out.push_str(&format!("• {label}\n"));
    }
    out.push_str(&format!("\n📌 **총 {}개의 공간**을 찾았어요!\n\n---\n\n", hits.len()));
    for (i, hit) in hits.iter().enumerate() {
        let s = &hit.space;
        out.push_str(&format!("**{}. {}**\n", i + 1, s.name));
        if let Some(v) = present(&s.description) {
            out.push_str(&format!("{}\n", clip(v, DESCRIPTION_MAX_CHARS)));
        }
        out.push_str(&format!(
            "• 📍 **위치 :** {}\n",
            present(&s.region).unwrap_or("정보없음")
        ));
        out.push_str(&format!("• 👥 **인원 :** {}\n", capacity_label(s)));
        out.push_str(&format!("• ✅ **일치 조건 :** {}\n", hit.reasons.join(", ")));
        let link = [&s.homepage, &s.rental_link, &s.program_link, &s.sns]
            .into_iter()
            .find_map(present);
        if let Some(url) = link {
            out.push_str(&format!("• 🔗 **링크 :** {url}\n"));
        }
        out.push_str("\n---\n\n");
    }
    out.push_str("다른 공간을 보고싶다면? **[✨ 랜덤 추천]**");
    out
}

pub fn condition_no_match_message(conditions: &SpaceConditions) -> String {
    format!(
        "😥 **{}** 조건에 맞는 청년공간을 찾을 수 없습니다.\n\n\
         💡 **다른 조건으로 검색해보세요!**\n\
         • 지역 조건을 넓혀보거나\n\
         • 인원 조건을 '상관없음'으로 변경하거나\n\
         • 다른 이용 목적을 선택해보세요",
        conditions.labels().join(", ")
    )
}

// ------------------------------------------------------------
// Record rendering
// ------------------------------------------------------------

const DESCRIPTION_MAX_CHARS: usize = 100;

fn clip(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

pub fn render_space(space: &Space) -> String {
    let mut out = match present(&space.region) {
        Some(region) => format!("**{}[{}]**\n", space.name, region),
        None => format!("**{}**\n", space.name),
    };
    if let Some(v) = present(&space.address) {
        out.push_str(&format!("📍 {v}\n"));
    }
    if let Some(v) = present(&space.contact) {
        out.push_str(&format!("📞 {v}\n"));
    }
    if let Some(v) = present(&space.hours) {
        out.push_str(&format!("🕒 {v}\n"));
    }
    if let Some(v) = present(&space.description) {
        out.push_str(&format!("📝 {}\n", clip(v, DESCRIPTION_MAX_CHARS)));
    }

    let links: Vec<String> = [
        ("홈페이지", &space.homepage),
        ("대관신청", &space.rental_link),
        ("프로그램", &space.program_link),
        ("SNS", &space.sns),
    ]
    .into_iter()
    .filter_map(|(label, url)| present(url).map(|u| format!("[{label}]({u})")))
    .collect();
    if !links.is_empty() {
        out.push_str(&format!("🔗 {}\n", links.join(" | ")));
    }
    out
}

pub fn render_program(program: &Program) -> String {
    let mut out = format!("**{}**\n", program.title);
    if let Some(v) = present(&program.status) {
        let dot = if v == RECRUITING { "🟢" } else { "🔴" };
        out.push_str(&format!("{dot} {v}\n"));
    }
    if let Some(v) = present(&program.application_period) {
        out.push_str(&format!("📅 신청기간: {v}\n"));
    }
    if let Some(v) = present(&program.program_date) {
        out.push_str(&format!("🗓️ 일정: {v}\n"));
    }
    if let Some(v) = present(&program.location) {
        out.push_str(&format!("📍 장소: {v}\n"));
    }
    if let Some(v) = present(&program.region) {
        out.push_str(&format!("🏛️ 지역: {v}\n"));
    }
    if let Some(v) = present(&program.description) {
        out.push_str(&format!("📝 {}\n", clip(v, DESCRIPTION_MAX_CHARS)));
    }
    if let Some(v) = present(&program.link) {
        out.push_str(&format!("🔗 [자세히 보기]({v})\n"));
    }
    out
}

/// Status marker the programs listing uses for open recruitment.
pub const RECRUITING: &str = "모집중";

// ------------------------------------------------------------
// Listing rendering
// ------------------------------------------------------------

pub fn unavailable_message(kind: DatasetKind) -> String {
    format!("현재 {} 정보를 가져올 수 없습니다.", kind.label())
}

pub fn region_no_match_message(kind: DatasetKind, region: &str) -> String {
    match kind {
        DatasetKind::Spaces => format!(
            "**{region}**에서 청년공간을 찾을 수 없습니다.\n\n다른 지역을 검색해보세요!"
        ),
        DatasetKind::Programs => format!(
            "**{region}**에서 현재 모집중인 청년 프로그램을 찾을 수 없습니다.\n\n다른 지역을 검색해보세요!"
        ),
    }
}

pub fn keyword_no_match_message(kind: DatasetKind, keyword: &str) -> String {
    match kind {
        DatasetKind::Spaces => format!(
            "**{keyword}** 관련 청년공간을 찾을 수 없습니다.\n\n다른 키워드로 검색해보세요!"
        ),
        DatasetKind::Programs => format!(
            "**{keyword}** 관련 모집중인 청년 프로그램을 찾을 수 없습니다.\n\n다른 키워드로 검색해보세요!"
        ),
    }
}

pub fn name_no_match_message(kind: DatasetKind, name: &str) -> String {
    format!("**{name}**에 해당하는 {}을(를) 찾을 수 없습니다.", kind.label())
}

pub fn tag_no_match_message(tag: &str) -> String {
    let mut out = format!(
        "**{tag}** 관련 청년공간을 찾을 수 없습니다.\n\n다른 키워드로 검색해보세요!\n\n💡 **사용 가능한 키워드:**\n"
    );
    for t in canonical_tags() {
        out.push_str(&format!("- {t}\n"));
    }
    out
}

fn push_limited<R: Record>(out: &mut String, kind: DatasetKind, records: &[R]) {
    let limit = kind.listing_limit();
    for r in records.iter().take(limit) {
        out.push_str(&r.render());
        out.push('\n');
    }
    if kind == DatasetKind::Programs && records.len() > limit {
        out.push_str(&format!(
            "\n... 외 {}개 프로그램 더 있음",
            records.len() - limit
        ));
    }
}

pub fn render_region_listing<R: Record>(region: &str, records: &[R]) -> String {
    let kind = R::KIND;
    let mut out = match kind {
        DatasetKind::Spaces => format!("**{region} 청년공간({}개)**\n\n", records.len()),
        DatasetKind::Programs => {
            format!("**{region} 청년 프로그램** ({}개 모집중)\n\n", records.len())
        }
    };
    push_limited(&mut out, kind, records);
    out
}

pub fn render_keyword_listing<R: Record>(keyword: &str, records: &[R]) -> String {
    let kind = R::KIND;
    let suffix = match kind {
        DatasetKind::Spaces => "개",
        DatasetKind::Programs => "개 모집중",
    };
    let mut out = format!(
        "🔍 **{keyword}** 검색 결과 ({}{suffix})\n\n",
        records.len()
    );
    push_limited(&mut out, kind, records);
    out
}

/// Numbered one-line-per-record listing for tag buttons.
pub fn render_tag_listing<R: Record>(tag: &str, records: &[R]) -> String {
    let mut out = format!("**{tag}**로 찾은 공간입니다!\n\n");
    for (i, r) in records.iter().enumerate() {
        match r.region().filter(|s| !s.trim().is_empty()) {
            Some(region) => out.push_str(&format!("**{}.** {} [{}]\n", i + 1, r.name(), region)),
            None => out.push_str(&format!("**{}.** {}\n", i + 1, r.name())),
        }
    }
    out.push_str("\n📌 **공간 상세 내용은**\n");
    out.push_str("👉 \"청년 공간 상세\" 버튼을 눌러 확인하거나,\n");
    out.push_str("👉 공간명을 입력해서 직접 확인해보세요!");
    out
}

static TITLE_REGION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+구)\]").expect("valid title-region regex"));

/// District named in a title like `"[해운대구] 취업 특강"`.
pub fn region_from_title(title: &str) -> Option<String> {
    TITLE_REGION
        .captures(title)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn grouping_region<R: Record>(r: &R) -> String {
    if let Some(region) = r.region().filter(|s| !s.trim().is_empty()) {
        return region.to_string();
    }
    match R::KIND {
        DatasetKind::Spaces => "기타".to_string(),
        DatasetKind::Programs => {
            region_from_title(r.name()).unwrap_or_else(|| "전체/기타".to_string())
        }
    }
}

/// Whole dataset grouped by region (sorted by region name).
pub fn render_overview<R: Record>(records: &[R]) -> String {
    let mut groups: BTreeMap<String, Vec<&R>> = BTreeMap::new();
    for r in records {
        groups.entry(grouping_region(r)).or_default().push(r);
    }

    let mut out = match R::KIND {
        DatasetKind::Spaces => format!("**부산 청년공간 전체 목록** ({}개)\n\n", records.len()),
        DatasetKind::Programs => format!("**부산 청년 프로그램 모집중** ({}개)\n\n", records.len()),
    };

    for (region, items) in &groups {
        match R::KIND {
            DatasetKind::Spaces => {
                out.push_str(&format!("**📍 {region}** ({}개)\n", items.len()));
                for r in items {
                    out.push_str(&format!("  • {}\n", r.name()));
                }
            }
            DatasetKind::Programs => {
                out.push_str(&format!("**{region}** ({}개)\n", items.len()));
                for r in items.iter().take(3) {
                    out.push_str(&format!("{}\n", r.name()));
                }
                if items.len() > 3 {
                    out.push_str(&format!("     ... 외 {}개 더\n", items.len() - 3));
                }
            }
        }
        out.push('\n');
    }

    let hint = match R::KIND {
        DatasetKind::Spaces => "💡 지역명이나 공간명으로 자세한 정보를 검색해보세요!",
        DatasetKind::Programs => "💡 지역명이나 프로그램명으로 자세한 정보를 검색해보세요!",
    };
    out.push_str(hint);
    out
}

/// Short digest of the first few programs, used by the chat program rule.
pub fn render_program_digest(programs: &[Program], limit: usize) -> String {
    let mut out = format!("**부산 청년 프로그램 모집중** ({}개)\n\n", programs.len());
    for p in programs.iter().take(limit) {
        out.push_str(&format!("🟢 **{}**\n", p.title));
        if let Some(v) = present(&p.application_period) {
            out.push_str(&format!("📅 {v}\n"));
        }
        if let Some(v) = present(&p.location) {
            out.push_str(&format!("📍 {v}\n"));
        }
        out.push('\n');
    }
    if programs.len() > limit {
        out.push_str(&format!(
            "... 외 {}개 프로그램 더 있음\n\n",
            programs.len() - limit
        ));
    }
    out.push_str("💡 지역명과 함께 질문하시면 해당 지역 프로그램을 찾아드려요!");
    out
}

// ------------------------------------------------------------
// Program categories
// ------------------------------------------------------------

static CATEGORY_RULES: &[(&str, &[&str])] = &[
    ("취업/진로", &["취업", "job", "컨설팅", "면접", "이력서"]),
    ("교육/강의", &["교육", "강의", "과정", "교실", "스쿨"]),
    ("창업", &["창업", "사업", "비즈니스"]),
    ("문화/예술", &["문화", "예술", "공연", "전시", "음악", "미술"]),
];

pub const OTHER_CATEGORY: &str = "기타";

/// Bucket programs by title keywords; first matching category wins.
/// Categories are returned in fixed order, empty ones included.
pub fn categorize(programs: &[Program]) -> Vec<(&'static str, Vec<Program>)> {
    let mut buckets: Vec<(&'static str, Vec<Program>)> = CATEGORY_RULES
        .iter()
        .map(|(name, _)| (*name, Vec::new()))
        .chain(std::iter::once((OTHER_CATEGORY, Vec::new())))
        .collect();

    for p in programs {
        let title = p.title.to_lowercase();
        let idx = CATEGORY_RULES
            .iter()
            .position(|(_, kws)| kws.iter().any(|k| title.contains(k)))
            .unwrap_or(CATEGORY_RULES.len());
        buckets[idx].1.push(p.clone());
    }
    buckets
}

pub fn render_categories(programs: &[Program]) -> String {
    let mut out = String::from("**카테고리별 청년 프로그램**\n\n");
    for (name, items) in categorize(programs) {
        if items.is_empty() {
            continue;
        }
        out.push_str(&format!("**{name}** ({}개)\n", items.len()));
        for p in items.iter().take(3) {
            out.push_str(&format!("{}\n", p.title));
        }
        if items.len() > 3 {
            out.push_str(&format!("     ... 외 {}개 더\n", items.len() - 3));
        }
        out.push('\n');
    }
    out
}
