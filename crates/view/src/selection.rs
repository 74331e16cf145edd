use std::collections::HashSet;

use bizflow_model::RecordId;

/// The set of checked rows. Survives paging; never grows implicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: HashSet<RecordId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `id`. Returns whether it is now selected.
    pub fn toggle(&mut self, id: &RecordId) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.clone());
            true
        }
    }

    /// Header checkbox: select or deselect every id on the current page.
    /// Ids on other pages are left alone.
    pub fn toggle_all<'a>(&mut self, page_ids: impl IntoIterator<Item = &'a RecordId>, checked: bool) {
        for id in page_ids {
            if checked {
                self.ids.insert(id.clone());
            } else {
                self.ids.remove(id);
            }
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drop ids no longer present in the store.
    pub fn prune(&mut self, live: &HashSet<RecordId>) {
        self.ids.retain(|id| live.contains(id));
    }

    /// True only when the page is non-empty and every row on it is checked.
    pub fn is_all_selected<'a>(&self, page_ids: impl IntoIterator<Item = &'a RecordId>) -> bool {
        let mut any = false;
        for id in page_ids {
            any = true;
            if !self.ids.contains(id) {
                return false;
            }
        }
        any
    }

    /// Some but not all rows on the page are checked.
    pub fn is_partially_selected<'a>(
        &self,
        page_ids: impl IntoIterator<Item = &'a RecordId>,
    ) -> bool {
        let (mut hit, mut miss) = (false, false);
        for id in page_ids {
            if self.ids.contains(id) {
                hit = true;
            } else {
                miss = true;
            }
        }
        hit && miss
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.ids.contains(id)
    }

    /// Selected ids in a stable (sorted) order.
    pub fn ids(&self) -> Vec<RecordId> {
        let mut ids: Vec<RecordId> = self.ids.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
