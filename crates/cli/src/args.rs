//! Filter and sort flags shared by `query`, `export` and `segments save`.

use clap::Args;
use time::macros::format_description;
use time::{Date, UtcOffset};

use bizflow_model::SortKey;
use bizflow_view::{DateRange, QuerySpec, SegmentBook, SortDirection, SortSpec, TagSegment};

#[derive(Debug, Clone, Args)]
pub(crate) struct QueryArgs {
    /// Free-text search over the searchable fields
    #[arg(long)]
    pub text: Option<String>,
    /// Required tag (repeatable; all must be present)
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    /// all, with-tags or without-tags
    #[arg(long)]
    pub segment: Option<TagSegment>,
    /// Earliest creation day, YYYY-MM-DD (inclusive)
    #[arg(long)]
    pub from: Option<String>,
    /// Latest creation day, YYYY-MM-DD (inclusive)
    #[arg(long)]
    pub to: Option<String>,
    /// Start from a saved segment (id or name)
    #[arg(long)]
    pub saved: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct SortArgs {
    /// created_at, name, email, amount, stage or tag_count
    #[arg(long, default_value = "created_at")]
    pub sort: SortKey,
    /// asc or desc
    #[arg(long, default_value = "desc")]
    pub direction: SortDirection,
}

impl SortArgs {
    pub fn spec(&self) -> SortSpec {
        SortSpec::new(self.sort, self.direction)
    }
}

pub(crate) fn parse_day(raw: &str) -> Result<Date, String> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|e| format!("invalid date '{}': {}", raw, e))
}

impl QueryArgs {
    /// Build the query: saved segment rules first, then any flags given on
    /// the command line replace the corresponding clause.
    pub fn spec(&self, offset: UtcOffset, book: Option<&SegmentBook>) -> Result<QuerySpec, String> {
        let mut spec = match &self.saved {
            Some(key) => book
                .and_then(|b| b.find(key))
                .map(|s| s.rules.clone())
                .ok_or_else(|| format!("segment not found: {}", key))?,
            None => QuerySpec::default(),
        };
        if let Some(text) = &self.text {
            spec.text = text.clone();
        }
        if !self.tags.is_empty() {
            spec.tags = self.tags.clone();
        }
        if let Some(segment) = self.segment {
            spec.segment = segment;
        }
        if self.from.is_some() || self.to.is_some() {
            let from = self.from.as_deref().map(parse_day).transpose()?;
            let to = self.to.as_deref().map(parse_day).transpose()?;
            spec.date_range = Some(DateRange::new(from, to, offset));
        }
        Ok(spec)
    }
}
