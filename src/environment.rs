//! Symbol frames for variable scoping.
//!
//! An [`Environment`] is a cheap handle to a shared frame. Closures keep a handle to
//! the frame they captured, so a closure and every partial application derived from
//! it share that frame for as long as any of them is alive.
//!
//! A frame owns its parent link, except a link to the root frame, which is weak:
//! closures stored in the global frame capture children of it, and an owning link
//! back to the root would keep the whole global frame alive forever.
//!
//! Bindings within a frame are kept sorted by name rather than in insertion order;
//! lookups are unaffected, and listings such as [`Environment::bindings`] come out sorted.

use crate::LispError;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// A single frame of bindings
#[derive(Default)]
struct Frame {
    bindings: BTreeMap<String, Value>,
    parent: Option<ParentLink>,
}

enum ParentLink {
    Scope(Environment),
    Root(Weak<RefCell<Frame>>),
}

/// Handle to a frame of symbol bindings with an optional parent
#[derive(Clone, Default)]
pub struct Environment(Rc<RefCell<Frame>>);

impl Environment {
    /// Create a root frame with no parent
    pub fn new() -> Self {
        Environment::default()
    }

    /// Create an empty frame whose lookups fall back to `parent`
    pub fn child(parent: &Environment) -> Self {
        Self::with_parent_link(BTreeMap::new(), parent)
    }

    /// Copy of this frame's local bindings, parented to `parent` instead of the
    /// original parent. The original frame is not modified.
    pub fn rebased(&self, parent: &Environment) -> Self {
        let bindings = self.0.borrow().bindings.clone();
        Self::with_parent_link(bindings, parent)
    }

    fn with_parent_link(bindings: BTreeMap<String, Value>, parent: &Environment) -> Self {
        let link = if parent.is_root() {
            ParentLink::Root(Rc::downgrade(&parent.0))
        } else {
            ParentLink::Scope(parent.clone())
        };
        Environment(Rc::new(RefCell::new(Frame {
            bindings,
            parent: Some(link),
        })))
    }

    pub fn is_root(&self) -> bool {
        self.0.borrow().parent.is_none()
    }

    /// The enclosing frame, if any. A dropped root yields `None`.
    pub fn parent(&self) -> Option<Environment> {
        match &self.0.borrow().parent {
            Some(ParentLink::Scope(env)) => Some(env.clone()),
            Some(ParentLink::Root(weak)) => weak.upgrade().map(Environment),
            None => None,
        }
    }

    /// Search this frame, then the parent chain. Returns a copy of the stored value.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.0.borrow().bindings.get(name) {
            return Some(value.clone());
        }
        self.parent().and_then(|parent| parent.lookup(name))
    }

    /// Like [`Environment::lookup`], but a miss becomes an unbound-symbol error value
    pub fn get(&self, name: &str) -> Value {
        self.lookup(name)
            .unwrap_or_else(|| Value::Error(LispError::unbound_symbol(name)))
    }

    /// Bind `name` in this frame only, replacing any existing binding
    pub fn put(&self, name: &str, value: Value) {
        self.0.borrow_mut().bindings.insert(name.to_owned(), value);
    }

    /// Whether `name` is bound in this frame, ignoring parents
    pub fn contains_local(&self, name: &str) -> bool {
        self.0.borrow().bindings.contains_key(name)
    }

    /// The bindings of this frame, sorted by name
    pub fn bindings(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .bindings
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Every binding visible from this frame, sorted by name. Inner frames shadow outer ones.
    pub fn all_bindings(&self) -> Vec<(String, Value)> {
        let mut visible = BTreeMap::new();
        let mut frame = Some(self.clone());
        while let Some(env) = frame {
            for (name, value) in &env.0.borrow().bindings {
                visible
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
            frame = env.parent();
        }
        visible.into_iter().collect()
    }

    /// Whether both handles refer to the same frame
    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

// Frames compare by identity; two distinct frames are never equal
impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

// Only local names are printed: bindings may hold closures that point back here
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frame = self.0.borrow();
        f.debug_struct("Environment")
            .field("names", &frame.bindings.keys().collect::<Vec<_>>())
            .field("has_parent", &frame.parent.is_some())
            .finish()
    }
}
