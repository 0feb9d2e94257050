// Keyhook Hook Registry
// Ordered hook collections with removal by alias

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::hook::Hook;

/// A hook shared between the registry and the thread running it
pub type SharedHook = Arc<Mutex<dyn Hook>>;

/// Identity of one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(u64);

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook#{}", self.0)
    }
}

/// Something a hook can be removed by
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HookAlias {
    /// Hotkey string, key name or word
    Name(String),
    /// Address of a shared callback
    Callback(usize),
    /// The registration itself
    Handle(HookId),
}

impl HookAlias {
    /// Alias for a callback shared through an `Arc`
    pub fn callback<T: ?Sized>(callback: &Arc<T>) -> Self {
        HookAlias::Callback(Arc::as_ptr(callback) as *const () as usize)
    }
}

impl From<&str> for HookAlias {
    fn from(name: &str) -> Self {
        HookAlias::Name(name.to_string())
    }
}

impl From<String> for HookAlias {
    fn from(name: String) -> Self {
        HookAlias::Name(name)
    }
}

impl From<HookId> for HookAlias {
    fn from(id: HookId) -> Self {
        HookAlias::Handle(id)
    }
}

struct Entry {
    hook: SharedHook,
    suppress: bool,
}

/// Registered hooks in registration order.
///
/// Every hook is reachable through its own id and through each alias it was
/// registered with. Disabled hooks stay known until disposed so they can be
/// enabled again; re-enabling moves a hook to the end of its collection.
#[derive(Default)]
pub struct HookRegistry {
    next_id: u64,
    entries: HashMap<HookId, Entry>,
    suppressing: IndexSet<HookId>,
    nonsuppressing: IndexSet<HookId>,
    aliases: IndexMap<HookAlias, IndexSet<HookId>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add and enable a hook
    pub fn register(&mut self, hook: SharedHook, aliases: Vec<HookAlias>, suppress: bool) -> HookId {
        let id = HookId(self.next_id);
        self.next_id += 1;

        self.entries.insert(id, Entry { hook, suppress });
        for alias in aliases.into_iter().chain(std::iter::once(HookAlias::Handle(id))) {
            self.aliases.entry(alias).or_default().insert(id);
        }
        self.enable(id);
        id
    }

    /// Put a known hook back into its collection, returns false if unknown
    pub fn enable(&mut self, id: HookId) -> bool {
        let Some(entry) = self.entries.get(&id) else {
            return false;
        };
        if entry.suppress {
            self.suppressing.insert(id);
        } else {
            self.nonsuppressing.insert(id);
        }
        true
    }

    /// Take a hook out of its collection, returns false if it was not enabled
    pub fn disable(&mut self, id: HookId) -> bool {
        self.suppressing.shift_remove(&id) || self.nonsuppressing.shift_remove(&id)
    }

    /// Forget a hook entirely
    pub fn dispose(&mut self, id: HookId) -> bool {
        self.disable(id);
        if self.entries.remove(&id).is_none() {
            return false;
        }
        self.aliases.retain(|_, ids| {
            ids.shift_remove(&id);
            !ids.is_empty()
        });
        true
    }

    /// Disable every enabled hook registered under `alias`
    pub fn disable_by_alias(&mut self, alias: &HookAlias) -> bool {
        let ids: Vec<HookId> = match self.aliases.get(alias) {
            Some(ids) => ids.iter().copied().collect(),
            None => return false,
        };
        let mut removed = false;
        for id in ids {
            removed |= self.disable(id);
        }
        removed
    }

    pub fn is_enabled(&self, id: HookId) -> bool {
        self.suppressing.contains(&id) || self.nonsuppressing.contains(&id)
    }

    /// Enabled suppressing hooks, in order
    pub fn suppressing(&self) -> Vec<SharedHook> {
        self.collect(&self.suppressing)
    }

    /// Enabled non-suppressing hooks, in order
    pub fn nonsuppressing(&self) -> Vec<SharedHook> {
        self.collect(&self.nonsuppressing)
    }

    fn collect(&self, ids: &IndexSet<HookId>) -> Vec<SharedHook> {
        ids.iter()
            .filter_map(|id| self.entries.get(id))
            .map(|entry| entry.hook.clone())
            .collect()
    }

    /// Number of enabled hooks
    pub fn len(&self) -> usize {
        self.suppressing.len() + self.nonsuppressing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.suppressing.clear();
        self.nonsuppressing.clear();
        self.aliases.clear();
    }
}
