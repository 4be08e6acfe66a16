// src/dataset/types.rs
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// The two scraped datasets served by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Spaces,
    Programs,
}

impl DatasetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DatasetKind::Spaces => "spaces",
            DatasetKind::Programs => "programs",
        }
    }

    /// Korean display label used in chat replies.
    pub fn label(self) -> &'static str {
        match self {
            DatasetKind::Spaces => "청년공간",
            DatasetKind::Programs => "청년 프로그램",
        }
    }

    /// How many records a region/keyword listing shows before truncating.
    pub fn listing_limit(self) -> usize {
        match self {
            DatasetKind::Spaces => 5,
            DatasetKind::Programs => 8,
        }
    }
}

/// A scraped (or operator-overridden) entity. `name()` is the identity key
/// for merging; `region()` is the exact-match filter key.
pub trait Record:
    Clone + std::fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: DatasetKind;

    fn name(&self) -> &str;
    fn region(&self) -> Option<&str>;
    fn description(&self) -> Option<&str>;
    fn keywords(&self) -> &[String];

    /// Multi-line chat block: header first, then present fields, then links.
    fn render(&self) -> String;
}

/// A youth space (청년공간).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sns: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rental_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_link: Option<String>,
    /// Headcount the space takes; only curated (override) records carry it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_max: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

/// A youth program (청년 프로그램) currently recruiting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

impl Space {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Program {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

impl Record for Space {
    const KIND: DatasetKind = DatasetKind::Spaces;

    fn name(&self) -> &str {
        &self.name
    }
    fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }
    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
    fn keywords(&self) -> &[String] {
        &self.keywords
    }
    fn render(&self) -> String {
        crate::dataset::query::render_space(self)
    }
}

impl Record for Program {
    const KIND: DatasetKind = DatasetKind::Programs;

    fn name(&self) -> &str {
        &self.title
    }
    fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }
    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
    fn keywords(&self) -> &[String] {
        &self.keywords
    }
    fn render(&self) -> String {
        crate::dataset::query::render_program(self)
    }
}

/// Outcome of a query over the merged view.
///
/// `Unavailable` means there is no data at all (scrape failed or nothing is
/// published right now); `NoMatch` means data exists but the filter matched
/// nothing. Both are normal outcomes with distinct user-facing messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult<T> {
    Found(T),
    NoMatch,
    Unavailable,
}

impl<T> QueryResult<T> {
    pub fn found(self) -> Option<T> {
        match self {
            QueryResult::Found(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, QueryResult::Found(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryResult<U> {
        match self {
            QueryResult::Found(v) => QueryResult::Found(f(v)),
            QueryResult::NoMatch => QueryResult::NoMatch,
            QueryResult::Unavailable => QueryResult::Unavailable,
        }
    }
}

/// Treat empty / whitespace-only strings like absent fields.
pub(crate) fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_are_not_serialized() {
        let s = Space {
            region: Some("해운대구".into()),
            ..Space::named("센터1")
        };
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, r#"{"name":"센터1","region":"해운대구"}"#);
    }

    #[test]
    fn legacy_empty_strings_still_deserialize() {
        let raw = r#"{"title":"t","region":"","link":"","status":"모집중"}"#;
        let p: Program = serde_json::from_str(raw).unwrap();
        assert_eq!(p.region.as_deref(), Some(""));
        assert_eq!(present(&p.region), None);
        assert_eq!(present(&p.status), Some("모집중"));
    }

    #[test]
    fn query_result_map_keeps_tags() {
        let r: QueryResult<Vec<u8>> = QueryResult::Found(vec![1, 2]);
        assert_eq!(r.map(|v| v.len()), QueryResult::Found(2));
        let n: QueryResult<Vec<u8>> = QueryResult::NoMatch;
        assert_eq!(n.map(|v| v.len()), QueryResult::NoMatch);
    }
}
