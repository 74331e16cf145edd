//! Tag-set algebra. Tags compare case-insensitively; the first spelling
//! seen is the one kept.

use std::collections::{HashMap, HashSet};

/// The comparison key for a tag. Every case-insensitive tag comparison in
/// the crate goes through this.
pub fn fold_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// Whether `tags` holds `wanted`, ignoring case and surrounding blanks.
pub fn has_tag<T: AsRef<str>>(tags: &[T], wanted: &str) -> bool {
    let wanted = fold_tag(wanted);
    tags.iter().any(|t| fold_tag(t.as_ref()) == wanted)
}

/// Trim, drop blanks, and dedup case-insensitively keeping first spelling.
pub fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    merge_tags::<S, S>(&[], tags)
}

/// `existing ∪ new`, existing spellings first.
pub fn merge_tags<A: AsRef<str>, B: AsRef<str>>(existing: &[A], new: &[B]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(existing.len() + new.len());
    let all = existing
        .iter()
        .map(AsRef::as_ref)
        .chain(new.iter().map(AsRef::as_ref));
    for tag in all {
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(fold_tag(trimmed)) {
            out.push(trimmed.to_string());
        }
    }
    out
}

/// `existing \ remove`, matched case-insensitively.
pub fn subtract_tags<A: AsRef<str>, B: AsRef<str>>(existing: &[A], remove: &[B]) -> Vec<String> {
    let doomed: HashSet<String> = remove.iter().map(|t| fold_tag(t.as_ref())).collect();
    existing
        .iter()
        .map(AsRef::as_ref)
        .filter(|t| !doomed.contains(&fold_tag(t)))
        .map(str::to_string)
        .collect()
}

/// Replace `from` with `to` in place; if `to` is already present the two
/// merge. Tags without `from` come back unchanged.
pub fn rename_tag<A: AsRef<str>>(existing: &[A], from: &str, to: &str) -> Vec<String> {
    let from = fold_tag(from);
    let to = to.trim();
    let replaced: Vec<&str> = existing
        .iter()
        .map(AsRef::as_ref)
        .map(|t| if fold_tag(t) == from { to } else { t })
        .collect();
    merge_tags::<&str, &str>(&replaced, &[])
}

/// Whether two tag lists hold the same set, ignoring case and order.
pub fn same_tags<A: AsRef<str>, B: AsRef<str>>(a: &[A], b: &[B]) -> bool {
    let left: HashSet<String> = a.iter().map(|t| fold_tag(t.as_ref())).collect();
    let right: HashSet<String> = b.iter().map(|t| fold_tag(t.as_ref())).collect();
    left == right
}

/// Distinct vocabulary across many tag lists, sorted case-insensitively.
pub fn available_tags<'a, I, T>(lists: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a [T]>,
    T: AsRef<str> + 'a,
{
    let mut seen = HashSet::new();
    let mut out: Vec<String> = Vec::new();
    for list in lists {
        for tag in list {
            let trimmed = tag.as_ref().trim();
            if !trimmed.is_empty() && seen.insert(fold_tag(trimmed)) {
                out.push(trimmed.to_string());
            }
        }
    }
    out.sort_by_key(|t| fold_tag(t));
    out
}

/// [`available_tags`] with the number of lists carrying each tag. A list
/// holding two spellings of one tag counts once.
pub fn tag_counts<'a, I, T>(lists: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a [T]>,
    T: AsRef<str> + 'a,
{
    let mut counts: HashMap<String, (String, usize)> = HashMap::new();
    for list in lists {
        let mut seen = HashSet::new();
        for tag in list {
            let trimmed = tag.as_ref().trim();
            if trimmed.is_empty() {
                continue;
            }
            let key = fold_tag(trimmed);
            if seen.insert(key.clone()) {
                counts.entry(key).or_insert_with(|| (trimmed.to_string(), 0)).1 += 1;
            }
        }
    }
    let mut out: Vec<(String, String, usize)> = counts
        .into_iter()
        .map(|(key, (spelling, n))| (key, spelling, n))
        .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out.into_iter().map(|(_, spelling, n)| (spelling, n)).collect()
}
