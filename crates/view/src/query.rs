//! Query engine: pure functions deriving a view over a record store.
//!
//! `filter` and `sort` never reorder beyond what they are asked to do:
//! filtering preserves input order, sorting is stable with a fixed id
//! tiebreak, so identical inputs always produce identical outputs.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::macros::time;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use bizflow_model::{DomainRecord, SortKey};

use crate::tags::fold_tag;

// ──────────────────────────────────────────────
// Query
// ──────────────────────────────────────────────

/// Which records qualify by tag presence alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagSegment {
    #[default]
    All,
    WithTags,
    WithoutTags,
}

impl FromStr for TagSegment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "all" => Ok(TagSegment::All),
            "with_tags" | "tagged" => Ok(TagSegment::WithTags),
            "without_tags" | "untagged" => Ok(TagSegment::WithoutTags),
            other => Err(format!("unknown segment '{}'", other)),
        }
    }
}

/// Inclusive calendar-day range on `created_at`.
///
/// Days are interpreted in `offset` (the viewer's local time): `from` is
/// floored to 00:00:00 and `to` ceiled to the last nanosecond of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Date>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Date>,
    #[serde(default = "utc", with = "offset_format")]
    pub offset: UtcOffset,
}

fn utc() -> UtcOffset {
    UtcOffset::UTC
}

const END_OF_DAY: Time = time!(23:59:59.999_999_999);

impl DateRange {
    pub fn new(from: Option<Date>, to: Option<Date>, offset: UtcOffset) -> Self {
        Self { from, to, offset }
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn lower_bound(&self) -> Option<OffsetDateTime> {
        self.from
            .map(|d| PrimitiveDateTime::new(d, Time::MIDNIGHT).assume_offset(self.offset))
    }

    pub fn upper_bound(&self) -> Option<OffsetDateTime> {
        self.to
            .map(|d| PrimitiveDateTime::new(d, END_OF_DAY).assume_offset(self.offset))
    }

    pub fn contains(&self, at: OffsetDateTime) -> bool {
        if let Some(lower) = self.lower_bound() {
            if at < lower {
                return false;
            }
        }
        if let Some(upper) = self.upper_bound() {
            if at > upper {
                return false;
            }
        }
        true
    }
}

/// What a list screen is asked to show. Pure data: the same spec over the
/// same records always selects the same records.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Case-insensitive substring matched against the searchable fields.
    #[serde(default)]
    pub text: String,
    /// Every one of these must be on the record (case-insensitive).
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub segment: TagSegment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

impl QuerySpec {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
            && self.tags.is_empty()
            && self.segment == TagSegment::All
            && self.date_range.map_or(true, |r| r.is_unbounded())
    }

    /// Whether `record` satisfies every clause of the query.
    pub fn matches<R: DomainRecord>(&self, record: &R) -> bool {
        let tags = record.tags();

        match self.segment {
            TagSegment::WithTags if tags.is_empty() => return false,
            TagSegment::WithoutTags if !tags.is_empty() => return false,
            _ => {}
        }

        if !self.tags.is_empty() {
            let have: HashSet<String> = tags.iter().map(|t| fold_tag(t)).collect();
            if !self.tags.iter().all(|t| have.contains(&fold_tag(t))) {
                return false;
            }
        }

        if let Some(range) = &self.date_range {
            if !range.contains(record.created_at()) {
                return false;
            }
        }

        let needle = self.text.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        record
            .search_fields()
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

// ──────────────────────────────────────────────
// Sorting
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Asc),
            "desc" | "descending" => Ok(SortDirection::Desc),
            other => Err(format!("unknown sort direction '{}'", other)),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("asc"),
            SortDirection::Desc => f.write_str("desc"),
        }
    }
}

/// Sort key plus direction. The default, newest first, matches the order
/// the storage collaborator lists records in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    pub fn asc(key: SortKey) -> Self {
        Self::new(key, SortDirection::Asc)
    }

    pub fn desc(key: SortKey) -> Self {
        Self::new(key, SortDirection::Desc)
    }

    fn compare<R: DomainRecord>(&self, a: &R, b: &R) -> Ordering {
        let primary = a.sort_value(self.key).cmp(&b.sort_value(self.key));
        let primary = match self.direction {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        };
        // Tiebreak stays ascending by id regardless of direction.
        primary.then_with(|| a.id().cmp(b.id()))
    }
}

// ──────────────────────────────────────────────
// Pagination
// ──────────────────────────────────────────────

/// One page of a derived sequence.
///
/// `start..end` are zero-based positions of `items` within the full
/// sequence; `page` is one-based and already clamped into
/// `1..=page_count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub start: usize,
    pub end: usize,
    pub total: usize,
    pub page: usize,
    pub page_count: usize,
}

impl<T> Page<T> {
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.page_count
    }
}

/// `max(1, ceil(total / page_size))`. A page size of zero counts as one.
pub fn page_count(total: usize, page_size: usize) -> usize {
    let size = page_size.max(1);
    total.div_ceil(size).max(1)
}

/// Clamp a one-based page number into `1..=page_count`.
pub fn clamp_page(page: usize, total: usize, page_size: usize) -> usize {
    page.clamp(1, page_count(total, page_size))
}

// ──────────────────────────────────────────────
// Engine
// ──────────────────────────────────────────────

/// Records matching `spec`, in input order.
pub fn filter<'a, R, I>(records: I, spec: &QuerySpec) -> Vec<&'a R>
where
    R: DomainRecord,
    I: IntoIterator<Item = &'a R>,
{
    records.into_iter().filter(|r| spec.matches(*r)).collect()
}

/// Stable sort by `spec`, ties broken by id.
pub fn sort<'a, R: DomainRecord>(mut records: Vec<&'a R>, spec: SortSpec) -> Vec<&'a R> {
    records.sort_by(|a, b| spec.compare(*a, *b));
    records
}

/// Slice out one page after clamping `page`.
pub fn paginate<T: Clone>(records: &[T], page_size: usize, page: usize) -> Page<T> {
    let size = page_size.max(1);
    let total = records.len();
    let page_count = page_count(total, size);
    let page = page.clamp(1, page_count);
    let start = ((page - 1) * size).min(total);
    let end = (start + size).min(total);
    Page {
        items: records[start..end].to_vec(),
        start,
        end,
        total,
        page,
        page_count,
    }
}

mod offset_format {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::UtcOffset;

    use crate::config::{format_offset, parse_offset};

    pub fn serialize<S: Serializer>(offset: &UtcOffset, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_offset(*offset))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<UtcOffset, D::Error> {
        let raw = String::deserialize(d)?;
        parse_offset(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizflow_model::{Customer, Lead, LeadStage, OwnerId, RecordId, RecordMeta};
    use rust_decimal::Decimal;
    use time::macros::{date, datetime, offset};

    fn customer(id: &str, name: &str, tags: &[&str], created: OffsetDateTime) -> Customer {
        Customer {
            meta: RecordMeta {
                id: RecordId::from(id),
                owner_id: OwnerId::from("owner-1"),
                created_at: created,
            },
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn lead(id: &str, amount: i64, stage: LeadStage) -> Lead {
        Lead {
            meta: RecordMeta {
                id: RecordId::from(id),
                owner_id: OwnerId::from("owner-1"),
                created_at: datetime!(2025-01-01 00:00 UTC),
            },
            name: format!("Lead {}", id),
            amount: Decimal::new(amount, 0),
            stage,
        }
    }

    fn ids<R: DomainRecord>(records: &[&R]) -> Vec<String> {
        records.iter().map(|r| r.id().to_string()).collect()
    }

    fn fixture() -> Vec<Customer> {
        vec![
            customer("1", "Acme", &["vip"], datetime!(2025-03-01 09:00 UTC)),
            customer("2", "Nimbus", &[], datetime!(2025-03-02 23:30 UTC)),
            customer("3", "BlueBay", &["Retail", "VIP"], datetime!(2025-03-05 00:00 UTC)),
        ]
    }

    #[test]
    fn required_tags_fold_like_the_tag_vocabulary() {
        let store = vec![
            customer("1", "Alpen", &["Über"], datetime!(2025-01-01 00:00 UTC)),
            customer("2", "Berg", &["über "], datetime!(2025-01-02 00:00 UTC)),
            customer("3", "Delta", &["uber"], datetime!(2025-01-03 00:00 UTC)),
        ];
        let spec = QuerySpec {
            tags: vec![" ÜBER".to_string()],
            ..QuerySpec::default()
        };
        assert_eq!(ids(&filter(&store, &spec)), vec!["1", "2"]);
    }

    #[test]
    fn text_matches_tags_case_insensitively() {
        let store = vec![
            customer("1", "Acme", &["vip"], datetime!(2025-01-01 00:00 UTC)),
            customer("2", "Nimbus", &[], datetime!(2025-01-01 00:00 UTC)),
        ];
        let out = filter(&store, &QuerySpec::text("vip"));
        assert_eq!(ids(&out), vec!["1"]);
        let out = filter(&store, &QuerySpec::text("  NIMBUS "));
        assert_eq!(ids(&out), vec!["2"]);
    }

    #[test]
    fn empty_spec_matches_everything() {
        let store = fixture();
        let spec = QuerySpec::default();
        assert!(spec.is_empty());
        assert_eq!(filter(&store, &spec).len(), 3);
    }

    #[test]
    fn required_tags_are_anded() {
        let store = fixture();
        let spec = QuerySpec {
            tags: vec!["vip".to_string(), "retail".to_string()],
            ..QuerySpec::default()
        };
        assert_eq!(ids(&filter(&store, &spec)), vec!["3"]);
    }

    #[test]
    fn segments_split_by_tag_presence() {
        let store = fixture();
        let with = QuerySpec {
            segment: TagSegment::WithTags,
            ..QuerySpec::default()
        };
        let without = QuerySpec {
            segment: TagSegment::WithoutTags,
            ..QuerySpec::default()
        };
        assert_eq!(ids(&filter(&store, &with)), vec!["1", "3"]);
        assert_eq!(ids(&filter(&store, &without)), vec!["2"]);
    }

    #[test]
    fn date_range_is_inclusive_whole_days() {
        let store = fixture();
        let spec = QuerySpec {
            date_range: Some(DateRange::new(
                Some(date!(2025 - 03 - 01)),
                Some(date!(2025 - 03 - 02)),
                UtcOffset::UTC,
            )),
            ..QuerySpec::default()
        };
        assert_eq!(ids(&filter(&store, &spec)), vec!["1", "2"]);
    }

    #[test]
    fn date_range_uses_local_offset() {
        let store = fixture();
        // 2025-03-02 23:30 UTC is already 2025-03-03 in UTC+02:00.
        let spec = QuerySpec {
            date_range: Some(DateRange::new(
                Some(date!(2025 - 03 - 03)),
                None,
                offset!(+2),
            )),
            ..QuerySpec::default()
        };
        assert_eq!(ids(&filter(&store, &spec)), vec!["2", "3"]);
    }

    #[test]
    fn filter_is_idempotent() {
        let store = fixture();
        let spec = QuerySpec {
            text: "a".to_string(),
            segment: TagSegment::WithTags,
            ..QuerySpec::default()
        };
        let once = filter(&store, &spec);
        let twice = filter(once.iter().copied(), &spec);
        assert_eq!(once, twice);
    }

    #[test]
    fn sort_ties_break_by_id() {
        let leads = vec![
            lead("b", 100, LeadStage::New),
            lead("a", 100, LeadStage::New),
            lead("c", 50, LeadStage::Won),
        ];
        let asc = sort(leads.iter().collect(), SortSpec::asc(SortKey::Amount));
        assert_eq!(ids(&asc), vec!["c", "a", "b"]);
        let desc = sort(leads.iter().collect(), SortSpec::desc(SortKey::Amount));
        assert_eq!(ids(&desc), vec!["a", "b", "c"]);
    }

    #[test]
    fn sort_is_idempotent() {
        let store = fixture();
        let spec = SortSpec::asc(SortKey::TagCount);
        let once = sort(store.iter().collect(), spec);
        let twice = sort(once.clone(), spec);
        assert_eq!(once, twice);
        assert_eq!(ids(&once), vec!["2", "1", "3"]);
    }

    #[test]
    fn sort_by_stage_follows_pipeline_order() {
        let leads = vec![
            lead("1", 1, LeadStage::Lost),
            lead("2", 1, LeadStage::New),
            lead("3", 1, LeadStage::Proposal),
        ];
        let out = sort(leads.iter().collect(), SortSpec::asc(SortKey::Stage));
        assert_eq!(ids(&out), vec!["2", "3", "1"]);
    }

    #[test]
    fn pages_concatenate_to_the_sequence() {
        let items: Vec<u32> = (1..=7).collect();
        let first = paginate(&items, 3, 1);
        assert_eq!(first.page_count, 3);
        let mut all = Vec::new();
        for p in 1..=first.page_count {
            all.extend(paginate(&items, 3, p).items);
        }
        assert_eq!(all, items);
    }

    #[test]
    fn stale_page_is_clamped() {
        let items: Vec<u32> = (1..=5).collect();
        let page = paginate(&items, 2, 5);
        assert_eq!(page.page_count, 3);
        assert_eq!(page.page, 3);
        assert_eq!(page.items, vec![5]);
        assert_eq!((page.start, page.end, page.total), (4, 5, 5));
        assert!(page.has_previous());
        assert!(!page.has_next());
    }

    #[test]
    fn empty_sequence_has_one_empty_page() {
        let items: Vec<u32> = Vec::new();
        let page = paginate(&items, 10, 0);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_count, 1);
        assert!(page.items.is_empty());
        assert_eq!((page.start, page.end), (0, 0));
    }

    #[test]
    fn query_spec_round_trips_through_json() {
        let json = serde_json::json!({
            "text": "acme",
            "tags": ["vip"],
            "segment": "with_tags",
            "date_range": {"from": "2025-03-01", "offset": "+05:30"}
        });
        let spec: QuerySpec = serde_json::from_value(json).unwrap();
        let range = spec.date_range.unwrap();
        assert_eq!(range.from, Some(date!(2025 - 03 - 01)));
        assert_eq!(range.to, None);
        assert_eq!(range.offset, offset!(+5:30));
        assert_eq!(spec.segment, TagSegment::WithTags);
    }
}
