//! Per-screen view state and its reducer.

use std::collections::HashSet;

use bizflow_model::{DomainRecord, RecordId};

use crate::config::ViewConfig;
use crate::error::ViewError;
use crate::query::{
    clamp_page, filter, paginate, sort, DateRange, Page, QuerySpec, SortSpec, TagSegment,
};
use crate::selection::Selection;
use crate::store::RecordStore;

/// Everything a list screen can ask its view to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
    SetText(String),
    SetTags(Vec<String>),
    SetSegment(TagSegment),
    SetDateRange(Option<DateRange>),
    SetQuery(QuerySpec),
    SetSort(SortSpec),
    SetPageSize(usize),
    SetPage(usize),
    Toggle(RecordId),
    /// Header checkbox for the current page.
    ToggleAllOnPage(bool),
    ClearSelection,
}

/// Store, query, sort, paging and selection for one list screen.
///
/// The visible page is always derived, never stored: `page()` runs
/// filter, sort and paginate over the current store. Every store mutation
/// made through the view prunes the selection to ids still present.
#[derive(Debug, Clone)]
pub struct CollectionView<R> {
    store: RecordStore<R>,
    query: QuerySpec,
    sort: SortSpec,
    page_size: usize,
    page: usize,
    selection: Selection,
}

impl<R: DomainRecord> CollectionView<R> {
    pub fn new(page_size: usize) -> Result<Self, ViewError> {
        if page_size == 0 {
            return Err(ViewError::InvalidPageSize);
        }
        Ok(Self {
            store: RecordStore::new(),
            query: QuerySpec::default(),
            sort: SortSpec::default(),
            page_size,
            page: 1,
            selection: Selection::new(),
        })
    }

    pub fn from_config(config: &ViewConfig) -> Result<Self, ViewError> {
        Self::new(config.page_size)
    }

    pub fn apply(&mut self, action: ViewAction) -> Result<(), ViewError> {
        match action {
            ViewAction::SetText(text) => {
                self.query.text = text;
                self.page = 1;
            }
            ViewAction::SetTags(tags) => {
                self.query.tags = tags;
                self.page = 1;
            }
            ViewAction::SetSegment(segment) => {
                self.query.segment = segment;
                self.page = 1;
            }
            ViewAction::SetDateRange(range) => {
                self.query.date_range = range;
                self.page = 1;
            }
            ViewAction::SetQuery(query) => {
                self.query = query;
                self.page = 1;
            }
            ViewAction::SetSort(sort) => {
                self.sort = sort;
                self.page = 1;
            }
            ViewAction::SetPageSize(0) => return Err(ViewError::InvalidPageSize),
            ViewAction::SetPageSize(size) => {
                self.page_size = size;
                self.page = 1;
            }
            ViewAction::SetPage(page) => {
                let total = self.matching().len();
                self.page = clamp_page(page, total, self.page_size);
            }
            ViewAction::Toggle(id) => {
                if self.store.contains(&id) {
                    self.selection.toggle(&id);
                }
            }
            ViewAction::ToggleAllOnPage(checked) => {
                let ids = self.page_ids();
                self.selection.toggle_all(&ids, checked);
            }
            ViewAction::ClearSelection => self.selection.clear(),
        }
        Ok(())
    }

    /// Filtered and sorted, before pagination.
    pub fn matching(&self) -> Vec<&R> {
        sort(filter(self.store.iter(), &self.query), self.sort)
    }

    /// The visible page, with the requested page clamped to what exists.
    pub fn page(&self) -> Page<&R> {
        paginate(&self.matching(), self.page_size, self.page)
    }

    pub fn page_ids(&self) -> Vec<RecordId> {
        self.page().items.iter().map(|r| r.id().clone()).collect()
    }

    pub fn is_page_selected(&self) -> bool {
        self.selection.is_all_selected(&self.page_ids())
    }

    pub fn is_page_partially_selected(&self) -> bool {
        self.selection.is_partially_selected(&self.page_ids())
    }

    /// Selected records in store order.
    pub fn selected(&self) -> Vec<&R> {
        self.store
            .iter()
            .filter(|r| self.selection.contains(r.id()))
            .collect()
    }

    pub fn store(&self) -> &RecordStore<R> {
        &self.store
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn query(&self) -> &QuerySpec {
        &self.query
    }

    pub fn sort_spec(&self) -> SortSpec {
        self.sort
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Mutate the store, then drop selected ids that no longer exist.
    pub fn with_store<T>(&mut self, f: impl FnOnce(&mut RecordStore<R>) -> T) -> T {
        let out = f(&mut self.store);
        self.prune();
        out
    }

    pub fn load(&mut self, records: impl IntoIterator<Item = R>) {
        self.with_store(|store| store.load(records));
    }

    /// Empty the store and the selection; query and sort are kept.
    pub fn reset(&mut self) {
        self.store.clear();
        self.selection.clear();
        self.page = 1;
    }

    /// Direct store access for in-crate collaborators; callers must
    /// `prune` afterwards.
    pub(crate) fn store_mut(&mut self) -> &mut RecordStore<R> {
        &mut self.store
    }

    pub(crate) fn prune(&mut self) {
        let live: HashSet<RecordId> = self.store.ids();
        self.selection.prune(&live);
    }
}
