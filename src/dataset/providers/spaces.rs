// src/dataset/providers/spaces.rs
use anyhow::Result;
use reqwest::Url;
use scraper::{ElementRef, Html};

use super::{absolute, first_text, selector, text_of};
use crate::config::DatasetConfig;
use crate::dataset::query::infer_tags;
use crate::dataset::scrape::ListingScraper;
use crate::dataset::types::Space;

selector!(ITEMS, ".policy_list.space_list ul li.toggle_type");
selector!(REGION, "a.toggle .plc_box .plc_gu");
selector!(TITLE_SPANS, "a.toggle .plc_box .plc_tit span");
selector!(PART, "a.toggle .plc_box .plc_part");
selector!(DESCRIPTION, ".toggle_inner .spif_con");
selector!(INFO_ROWS, ".toggle_inner .arrow_list ul li");
selector!(SPAN, "span");
selector!(LINKS, ".toggle_inner .splink_list a");
selector!(LINK_TEXT, ".splink_txt");

pub fn scraper(cfg: &DatasetConfig) -> Result<ListingScraper<Space>> {
    ListingScraper::from_config("youth_spaces", cfg, extract_spaces)
}

/// Every listed space that has both a name and a region.
pub fn extract_spaces(html: &str, base: &Url) -> Vec<Space> {
    let doc = Html::parse_document(html);
    doc.select(&ITEMS)
        .filter_map(|li| parse_item(li, base))
        .collect()
}

fn parse_item(li: ElementRef<'_>, base: &Url) -> Option<Space> {
    // The title holds a category badge span followed by the name span.
    let name = li
        .select(&TITLE_SPANS)
        .nth(1)
        .map(text_of)
        .filter(|s| !s.is_empty())?;
    let region = first_text(li, &REGION)?;

    let mut space = Space {
        region: Some(region),
        contact: first_text(li, &PART),
        description: first_text(li, &DESCRIPTION),
        ..Space::named(name)
    };

    for row in li.select(&INFO_ROWS) {
        let spans: Vec<String> = row.select(&SPAN).map(text_of).collect();
        let [label, value, ..] = spans.as_slice() else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        if label.contains("주소") {
            space.address = Some(value.clone());
        } else if label.contains("이용시간") || label.contains("운영시간") {
            space.hours = Some(value.clone());
        } else if label.contains("연락처") && space.contact.is_none() {
            space.contact = Some(value.clone());
        }
    }

    for a in li.select(&LINKS) {
        let Some(label) = first_text(a, &LINK_TEXT) else {
            continue;
        };
        let href = a.value().attr("href").and_then(|h| absolute(base, h));
        let slot = if label.contains("홈페이지") {
            &mut space.homepage
        } else if label.contains("SNS") {
            &mut space.sns
        } else if label.contains("대관") {
            &mut space.rental_link
        } else if label.contains("프로그램") {
            &mut space.program_link
        } else {
            continue;
        };
        if href.is_some() {
            *slot = href;
        }
    }

    // the listing has no tag field; derive tag-button keywords from the text
    let text = format!("{} {}", space.name, space.description.as_deref().unwrap_or_default());
    space.keywords = infer_tags(&text);

    Some(space)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITEM: &str = r#"
<div class="policy_list space_list"><ul>
  <li class="toggle_type">
    <a class="toggle"><div class="plc_box">
      <p class="plc_gu">해운대구</p>
      <p class="plc_tit"><span>청년공간</span><span>청년두드림센터</span></p>
      <p class="plc_part">051-000-0000</p>
    </div></a>
    <div class="toggle_inner">
      <p class="spif_con">스터디룸과 라운지</p>
      <div class="arrow_list"><ul>
        <li><span>주소</span><span>해운대로 1</span></li>
        <li><span>운영시간</span><span>09:00~18:00</span></li>
      </ul></div>
      <div class="splink_list">
        <a href="/space/rent.nm?id=1"><span class="splink_txt">대관신청</span></a>
        <a href="https://blog.example/x"><span class="splink_txt">SNS</span></a>
      </div>
    </div>
  </li>
  <li class="toggle_type">
    <a class="toggle"><div class="plc_box">
      <p class="plc_tit"><span>청년공간</span><span>지역없음</span></p>
    </div></a>
  </li>
</ul></div>"#;

    #[test]
    fn extracts_fields_and_drops_items_without_region() {
        let base = Url::parse("https://young.busan.go.kr").unwrap();
        let spaces = extract_spaces(ITEM, &base);
        assert_eq!(spaces.len(), 1);
        let s = &spaces[0];
        assert_eq!(s.name, "청년두드림센터");
        assert_eq!(s.region.as_deref(), Some("해운대구"));
        assert_eq!(s.contact.as_deref(), Some("051-000-0000"));
        assert_eq!(s.address.as_deref(), Some("해운대로 1"));
        assert_eq!(s.hours.as_deref(), Some("09:00~18:00"));
        assert_eq!(
            s.rental_link.as_deref(),
            Some("https://young.busan.go.kr/space/rent.nm?id=1")
        );
        assert_eq!(s.sns.as_deref(), Some("https://blog.example/x"));
        assert!(s.homepage.is_none());
        assert_eq!(s.keywords, vec!["📝스터디/회의".to_string()]);
    }
}
