// src/dataset/providers/programs.rs
use anyhow::Result;
use reqwest::Url;
use scraper::{ElementRef, Html};

use super::{absolute, first_text, selector, text_of};
use crate::config::DatasetConfig;
use crate::dataset::query::{region_from_title, RECRUITING};
use crate::dataset::scrape::ListingScraper;
use crate::dataset::types::Program;

selector!(ITEMS, "ul li");
selector!(STATE, ".recruit_state");
selector!(STATE_OPEN, ".recruit_state .ing");
selector!(TITLE, ".recruit_tit");
selector!(DATE_SPANS, ".recruit_date span");
selector!(PLACE, ".part3");
selector!(LINK, "a");

pub fn scraper(cfg: &DatasetConfig) -> Result<ListingScraper<Program>> {
    ListingScraper::from_config("youth_programs", cfg, extract_programs)
}

/// Programs whose recruitment badge reads 모집중; everything else is dropped.
pub fn extract_programs(html: &str, base: &Url) -> Vec<Program> {
    let doc = Html::parse_document(html);
    doc.select(&ITEMS)
        .filter(|li| li.select(&STATE).next().is_some())
        .filter_map(|li| parse_item(li, base))
        .collect()
}

fn parse_item(li: ElementRef<'_>, base: &Url) -> Option<Program> {
    let status = li.select(&STATE_OPEN).next().map(text_of)?;
    if status != RECRUITING {
        return None;
    }
    let title = first_text(li, &TITLE)?;

    Some(Program {
        region: region_from_title(&title),
        status: Some(status),
        application_period: li
            .select(&DATE_SPANS)
            .nth(1)
            .map(text_of)
            .filter(|s| !s.is_empty()),
        location: first_text(li, &PLACE),
        link: li
            .select(&LINK)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|h| absolute(base, h)),
        ..Program::titled(title)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_recruiting_items() {
        let html = r#"<ul>
          <li><a href="/policySupport/view.nm?id=7">
            <span class="recruit_state"><em class="ing">모집중</em></span>
            <p class="recruit_tit">[해운대구] 바리스타 교육</p>
            <p class="recruit_date"><span>신청기간</span><span>2025.01.01 ~ 2025.01.31</span></p>
            <span class="part3">해운대구청</span>
          </a></li>
          <li><a href="/policySupport/view.nm?id=8">
            <span class="recruit_state"><em class="ing">모집마감</em></span>
            <p class="recruit_tit">마감된 프로그램</p>
          </a></li>
          <li>메뉴 항목</li>
        </ul>"#;
        let base = Url::parse("https://young.busan.go.kr").unwrap();
        let programs = extract_programs(html, &base);
        assert_eq!(programs.len(), 1);
        let p = &programs[0];
        assert_eq!(p.title, "[해운대구] 바리스타 교육");
        assert_eq!(p.region.as_deref(), Some("해운대구"));
        assert_eq!(p.status.as_deref(), Some("모집중"));
        assert_eq!(p.application_period.as_deref(), Some("2025.01.01 ~ 2025.01.31"));
        assert_eq!(p.location.as_deref(), Some("해운대구청"));
        assert_eq!(
            p.link.as_deref(),
            Some("https://young.busan.go.kr/policySupport/view.nm?id=7")
        );
    }
}
