//! Partial update semantics.

use super::types::{Snapshot, Updates};

/// Applies `updates` to `snapshot` in place.
///
/// `Some(v)` sets the key, `None` removes it, keys not mentioned are left
/// alone. Removing an absent key is a no-op.
pub fn apply_updates(snapshot: &mut Snapshot, updates: &Updates) {
    for (key, value) in updates {
        match value {
            Some(value) => {
                snapshot.insert(key.clone(), value.clone());
            }
            None => {
                snapshot.remove(key);
            }
        }
    }
}

/// Snapshot for a brand-new record built from an update map. Deletions have
/// nothing to act on and are dropped.
pub fn initial_snapshot(updates: &Updates) -> Snapshot {
    let mut snapshot = Snapshot::new();
    apply_updates(&mut snapshot, updates);
    snapshot
}
