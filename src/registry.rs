//! Component identity registry.
//!
//! Maps component ids to their native handles, weakly, so registration never
//! extends an element's lifetime. The engine holds the strong references;
//! once it drops a component the registry entry goes stale and the id
//! becomes available for reuse. A token side table resolves natively
//! originated events back to component ids.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::backend::{ElementToken, NativeHandle};
use crate::component::ComponentId;
use crate::error::{NavError, Result};

pub struct Registry<R> {
    handles: HashMap<ComponentId, Weak<NativeHandle<R>>>,
    ids_by_token: HashMap<ElementToken, ComponentId>,
}

impl<R> Registry<R> {
    pub fn new() -> Registry<R> {
        Registry {
            handles: HashMap::new(),
            ids_by_token: HashMap::new(),
        }
    }

    /// Registers a handle under an id.
    ///
    /// Fails with `AlreadyExists` only if a *live* handle is registered
    /// under the id; a stale entry is silently replaced.
    pub fn register(&mut self, id: &ComponentId, handle: &Arc<NativeHandle<R>>) -> Result<()> {
        if let Some(existing) = self.handles.get(id) {
            if let Some(existing) = existing.upgrade() {
                if existing.token() != handle.token() {
                    return Err(NavError::AlreadyExists(id.clone()));
                }
            }
        }
        self.handles.insert(id.clone(), Arc::downgrade(handle));
        self.ids_by_token.insert(handle.token(), id.clone());
        Ok(())
    }

    /// Looks up a live handle. Stale entries read as absent.
    pub fn lookup(&self, id: &ComponentId) -> Option<Arc<NativeHandle<R>>> {
        self.handles.get(id).and_then(Weak::upgrade)
    }

    pub fn require(&self, id: &ComponentId) -> Result<Arc<NativeHandle<R>>> {
        self.lookup(id)
            .ok_or_else(|| NavError::ComponentNotFound(id.clone()))
    }

    pub fn id_for_token(&self, token: ElementToken) -> Option<&ComponentId> {
        self.ids_by_token.get(&token)
    }

    pub fn unregister(&mut self, id: &ComponentId) {
        if let Some(weak) = self.handles.remove(id) {
            if let Some(handle) = weak.upgrade() {
                self.ids_by_token.remove(&handle.token());
            } else {
                // handle already gone; drop any token entries pointing here
                self.ids_by_token.retain(|_, owner| owner != id);
            }
        }
    }

    pub fn clear(&mut self) {
        self.handles.clear();
        self.ids_by_token.clear();
    }
}
