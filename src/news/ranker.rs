use super::item::Item;

/// Orders items newest first and keeps at most `capacity` of them.
///
/// The sort is stable, so items with equal timestamps keep the order they
/// were collected in: earlier configured source first, then feed order.
/// Delta queries depend on this ordering to stop early.
pub fn rank(mut items: Vec<Item>, capacity: usize) -> Vec<Item> {
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    items.truncate(capacity);
    items
}
