//! Item id to render handle association

use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Maps item ids to whatever handle the rendering layer uses for them.
///
/// A handle is created at most once per item id; afterwards the same handle
/// is returned for in-place updates.
#[derive(Debug)]
pub struct RenderHandles<H> {
    handles: HashMap<String, H>,
    created: usize,
}

impl<H> Default for RenderHandles<H> {
    fn default() -> Self {
        Self {
            handles: HashMap::new(),
            created: 0,
        }
    }
}

impl<H> RenderHandles<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for `item_id`, calling `create` only if none exists yet.
    /// The flag is `true` when the handle was created by this call.
    pub fn get_or_create(&mut self, item_id: &str, create: impl FnOnce() -> H) -> (&mut H, bool) {
        match self.handles.entry(item_id.to_string()) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => {
                self.created += 1;
                (entry.insert(create()), true)
            }
        }
    }

    pub fn get(&self, item_id: &str) -> Option<&H> {
        self.handles.get(item_id)
    }

    /// Number of handles ever created
    pub fn created(&self) -> usize {
        self.created
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
