// tests/dataset_pipeline.rs
//
// Dataset pipeline: cache + overrides merged into one view, and the query
// operations exposed to the HTTP/chat layers.

mod common;

use std::time::Duration;

use busan_youth_bot::dataset::merge::merge;
use busan_youth_bot::dataset::providers::spaces::extract_spaces;
use busan_youth_bot::dataset::scrape::{ListingScraper, PageSource};
use busan_youth_bot::dataset::types::{QueryResult, Space};
use busan_youth_bot::dataset::Dataset;
use common::{dataset_with, space, write_overrides, CountingScraper};
use reqwest::Url;

fn names(records: &[Space]) -> Vec<&str> {
    records.iter().map(|r| r.name.as_str()).collect()
}

#[tokio::test]
async fn no_override_file_serves_cache_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let cached = vec![space("A", "중구"), space("B", "동구"), space("C", "서구")];
    let ds = dataset_with(dir.path(), Some(cached.clone()), CountingScraper::new(vec![]));

    assert_eq!(ds.list_all().await, QueryResult::Found(cached));
}

#[tokio::test]
async fn override_replaces_cached_record_of_same_name() {
    let dir = tempfile::tempdir().unwrap();
    let x = Space {
        address: Some("X".into()),
        ..Space::named("센터1")
    };
    let y = Space {
        address: Some("Y".into()),
        ..Space::named("센터1")
    };
    let ds = dataset_with(dir.path(), Some(vec![x]), CountingScraper::new(vec![]));
    write_overrides(ds.overrides().path(), &[y.clone()]);

    assert_eq!(ds.merged().await, vec![y]);
}

#[tokio::test]
async fn override_only_records_are_appended_and_reload_picks_up_edits() {
    let dir = tempfile::tempdir().unwrap();
    let ds = dataset_with(
        dir.path(),
        Some(vec![space("a", "중구"), space("b", "동구")]),
        CountingScraper::new(vec![]),
    );
    write_overrides(ds.overrides().path(), &[space("new", "남구"), space("a", "북구")]);

    let merged = ds.merged().await;
    assert_eq!(names(&merged), vec!["a", "b", "new"]);
    assert_eq!(merged[0].region.as_deref(), Some("북구"));

    // edits are invisible until reload
    write_overrides(ds.overrides().path(), &[space("z", "강서구")]);
    assert_eq!(names(&ds.merged().await), vec!["a", "b", "new"]);
    assert_eq!(ds.reload_overrides(), 1);
    assert_eq!(names(&ds.merged().await), vec!["a", "b", "z"]);
}

#[tokio::test]
async fn merge_of_a_merged_view_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let ds = dataset_with(
        dir.path(),
        Some(vec![space("a", "중구"), space("a", "중구"), space("b", "동구")]),
        CountingScraper::new(vec![]),
    );
    write_overrides(ds.overrides().path(), &[space("b", "서구"), space("c", "남구")]);
    let merged = ds.merged().await;
    assert_eq!(merge(&merged, &[]), merged);
    assert_eq!(names(&merged), vec!["a", "a", "b", "c"]);
}

#[tokio::test]
async fn empty_view_is_unavailable_not_no_match() {
    let dir = tempfile::tempdir().unwrap();
    let ds = dataset_with::<Space>(dir.path(), None, CountingScraper::new(vec![]));

    assert_eq!(ds.list_all().await, QueryResult::Unavailable);
    assert_eq!(ds.list_by_region("중구").await, QueryResult::Unavailable);
    assert_eq!(ds.get_detail("센터").await, QueryResult::Unavailable);
    assert!(ds.region_reply("중구").await.contains("가져올 수 없습니다"));
}

#[tokio::test]
async fn region_filter_is_exact() {
    let dir = tempfile::tempdir().unwrap();
    let ds = dataset_with(
        dir.path(),
        Some(vec![space("끝공백", "해운대구 "), space("정확", "해운대구")]),
        CountingScraper::new(vec![]),
    );

    let hits = ds.list_by_region("해운대구").await.found().unwrap();
    assert_eq!(names(&hits), vec!["정확"]);
    assert_eq!(ds.list_by_region("해운대").await, QueryResult::NoMatch);
    assert!(ds.region_reply("해운대").await.contains("찾을 수 없습니다"));
}

#[tokio::test]
async fn keyword_and_detail_lookups() {
    let dir = tempfile::tempdir().unwrap();
    let ds = dataset_with(
        dir.path(),
        Some(vec![space("카페거리", "수영구"), space("카", "남구"), space("도서관", "북구")]),
        CountingScraper::new(vec![]),
    );

    let hits = ds.list_by_keyword("카페").await.found().unwrap();
    assert_eq!(names(&hits), vec!["카페거리", "카"]);

    assert_eq!(
        ds.get_detail("도서").await,
        QueryResult::Found(space("도서관", "북구"))
    );
    assert_eq!(ds.get_detail("없는공간").await, QueryResult::NoMatch);
}

#[tokio::test]
async fn status_reports_counts_without_scraping() {
    let dir = tempfile::tempdir().unwrap();
    let scraper = CountingScraper::new(vec![space("s", "중구")]);
    let ds = dataset_with::<Space>(dir.path(), None, scraper.clone());
    write_overrides(ds.overrides().path(), &[space("o", "동구")]);

    let st = ds.status();
    assert_eq!(st.dataset, "spaces");
    assert_eq!(st.cache_count, 0);
    assert_eq!(st.override_count, 1);
    assert_eq!(st.merged_count, 1);
    assert!(st.cached_at.is_none());
    assert!(st.stale);
    assert_eq!(scraper.calls(), 0);

    let outcome = ds.force_refresh().await;
    assert!(outcome.persisted);
    let st = ds.status();
    assert_eq!((st.cache_count, st.merged_count), (1, 2));
    assert!(!st.stale);
    assert_eq!(scraper.calls(), 1);
}

#[tokio::test]
async fn fixture_pages_flow_through_the_whole_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let scraper = ListingScraper::new(
        "youth_spaces",
        PageSource::fixture(vec![
            include_str!("fixtures/spaces_page1.html"),
            include_str!("fixtures/spaces_page2.html"),
            include_str!("fixtures/empty_page.html"),
            include_str!("fixtures/spaces_page2.html"),
        ]),
        Url::parse("https://young.busan.go.kr").unwrap(),
        extract_spaces,
    )
    .with_max_pages(5)
    .with_delay(Duration::ZERO);
    let ds: Dataset<Space> = Dataset::new(
        dir.path().join("spaces.json"),
        dir.path().join("spaces_overrides.json"),
        std::sync::Arc::new(scraper),
        chrono::Duration::hours(24),
    );

    let all = ds.list_all().await.found().unwrap();
    assert_eq!(
        names(&all),
        vec!["해운대 청년채움공간", "부산청년센터", "광안 청년카페"]
    );
    assert_eq!(ds.cache().peek(), all);
}
