//! Item name resolution.
//!
//! Players refer to items by what they see ("sword", "brass l"), never by id.
//! Resolution is deterministic:
//!
//! 1. An exact name match (case-insensitive, whitespace-normalized) wins. If
//!    several items share that name, the first by `(name, id)` is chosen.
//! 2. Otherwise a term matching the start of a name, or the start of any word
//!    in it, is a candidate. If all candidates share one distinct name the
//!    first by id is chosen.
//! 3. Candidates with several distinct names are [`Resolution::Ambiguous`],
//!    names listed alphabetically.
//!
//! Asking the player rather than silently taking the alphabetically first
//! candidate is the allowed alternative to an alphabetical tie-break here.

use super::types::ItemRecord;

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(ItemRecord),
    NoMatch,
    /// Distinct candidate names, sorted.
    Ambiguous(Vec<String>),
}

impl Resolution {
    pub fn found(self) -> Option<ItemRecord> {
        match self {
            Resolution::Found(item) => Some(item),
            _ => None,
        }
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_prefix_match(name: &str, term: &str) -> bool {
    if name.starts_with(term) {
        return true;
    }
    name.match_indices(' ')
        .any(|(idx, _)| name[idx + 1..].starts_with(term))
}

pub fn resolve(items: &[ItemRecord], term: &str) -> Resolution {
    let term = normalize(term);
    if term.is_empty() {
        return Resolution::NoMatch;
    }

    let mut keyed: Vec<(String, &ItemRecord)> =
        items.iter().map(|item| (normalize(&item.name), item)).collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));

    if let Some((_, item)) = keyed.iter().find(|(name, _)| *name == term) {
        return Resolution::Found((*item).clone());
    }

    let candidates: Vec<&(String, &ItemRecord)> = keyed
        .iter()
        .filter(|(name, _)| is_prefix_match(name, &term))
        .collect();

    match candidates.as_slice() {
        [] => Resolution::NoMatch,
        [(_, item)] => Resolution::Found((*item).clone()),
        [first, rest @ ..] => {
            if rest.iter().all(|(name, _)| *name == first.0) {
                return Resolution::Found(first.1.clone());
            }
            let mut names: Vec<String> = candidates.iter().map(|(_, i)| i.name.clone()).collect();
            names.sort_by_key(|n| normalize(n));
            names.dedup_by(|a, b| normalize(a) == normalize(b));
            Resolution::Ambiguous(names)
        }
    }
}
