//! Saved segments: named query specs a user can re-apply.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use bizflow_model::DomainRecord;

use crate::error::ViewError;
use crate::query::{filter, QuerySpec};
use crate::tags::fold_tag;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub name: String,
    pub rules: QuerySpec,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Segment {
    pub fn count_matches<'a, R, I>(&self, records: I) -> usize
    where
        R: DomainRecord,
        I: IntoIterator<Item = &'a R>,
    {
        filter(records, &self.rules).len()
    }
}

/// The owner's saved segments, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentBook {
    segments: Vec<Segment>,
    #[serde(default)]
    next_id: u64,
}

impl SegmentBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save `rules` under `name`; the new segment heads the list.
    pub fn add(
        &mut self,
        name: &str,
        rules: QuerySpec,
        created_at: OffsetDateTime,
    ) -> Result<&Segment, ViewError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ViewError::BlankSegmentName);
        }
        let id = self.fresh_id();
        self.segments.insert(
            0,
            Segment {
                id: id.clone(),
                name: name.to_string(),
                rules,
                created_at,
            },
        );
        self.sort();
        let pos = self.position(&id).unwrap_or(0);
        Ok(&self.segments[pos])
    }

    pub fn rename(&mut self, id: &str, name: &str) -> Result<&Segment, ViewError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ViewError::BlankSegmentName);
        }
        let pos = self
            .position(id)
            .ok_or_else(|| ViewError::SegmentNotFound(id.to_string()))?;
        self.segments[pos].name = name.to_string();
        Ok(&self.segments[pos])
    }

    /// Returns the removed segment, if it existed.
    pub fn delete(&mut self, id: &str) -> Option<Segment> {
        self.position(id).map(|pos| self.segments.remove(pos))
    }

    pub fn get(&self, id: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == id)
    }

    /// Look up by id, then by name ignoring case.
    pub fn find(&self, key: &str) -> Option<&Segment> {
        self.get(key).or_else(|| {
            let wanted = fold_tag(key);
            self.segments.iter().find(|s| fold_tag(&s.name) == wanted)
        })
    }

    pub fn list(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// `(segment, matching record count)` for every saved segment.
    pub fn counts<'a, R: DomainRecord>(&'a self, records: &'a [R]) -> Vec<(&'a Segment, usize)> {
        self.segments
            .iter()
            .map(|s| (s, s.count_matches(records)))
            .collect()
    }

    fn fresh_id(&mut self) -> String {
        loop {
            self.next_id += 1;
            let candidate = format!("seg-{}", self.next_id);
            if self.position(&candidate).is_none() {
                return candidate;
            }
        }
    }

    // Newest first; insertion order breaks ties.
    fn sort(&mut self) {
        self.segments
            .sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.segments.iter().position(|s| s.id == id)
    }
}
