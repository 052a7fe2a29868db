//! Ordering rules for button lists: permutation checks, renumbering and the
//! drag-to-rank move.

use std::collections::HashSet;

use crate::domain::{Entity, ProfileButton, SyncError, SyncResult};

/// Check that `proposed` holds exactly the entities of `current`, reordered.
pub fn validate_permutation<T: Entity>(current: &[T], proposed: &[T]) -> SyncResult<()> {
    if current.len() != proposed.len() {
        return Err(SyncError::InvalidPermutation(format!(
            "expected {} items, got {}",
            current.len(),
            proposed.len()
        )));
    }

    let known: HashSet<&T::Id> = current.iter().map(|e| e.id()).collect();
    let mut seen = HashSet::with_capacity(proposed.len());
    for entity in proposed {
        let id = entity.id();
        if !known.contains(id) {
            return Err(SyncError::InvalidPermutation(format!("{:?} is not part of the collection", id)));
        }
        if !seen.insert(id) {
            return Err(SyncError::InvalidPermutation(format!("{:?} appears more than once", id)));
        }
    }
    Ok(())
}

/// Assign `position = index`
pub fn renumber(mut items: Vec<ProfileButton>) -> Vec<ProfileButton> {
    for (index, item) in items.iter_mut().enumerate() {
        item.position = index as i32;
    }
    items
}

/// Settle a list read from the store: order by position (ties by id), then
/// renumber from zero
pub fn compact(mut items: Vec<ProfileButton>) -> Vec<ProfileButton> {
    items.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
    renumber(items)
}

/// Whether positions are exactly `0..len`, in list order
pub fn is_contiguous(items: &[ProfileButton]) -> bool {
    items
        .iter()
        .enumerate()
        .all(|(index, item)| item.position == index as i32)
}

/// Remove the item at `from` and reinsert it at `to`, shifting the items in
/// between by one. `None` if either rank is out of range.
pub fn move_rank<T: Clone>(items: &[T], from: usize, to: usize) -> Option<Vec<T>> {
    if from >= items.len() || to >= items.len() {
        return None;
    }
    let mut moved = items.to_vec();
    let item = moved.remove(from);
    moved.insert(to, item);
    Some(moved)
}
