use std::borrow::Cow;

use crate::types::tree::{Path, Segment};
use crate::Value;

/// One scope level in the lookup chain.
///
/// Frames live on the Rust stack of the renderer and borrow their parent, so
/// a frame can never outlive the scope it was entered from.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// The data node bound to this scope.
    node: &'a Value,

    parent: Option<&'a Frame<'a>>,

    /// The position of `node` in its array, only set for the frames of a
    /// repeated section.
    index: Option<usize>,

    /// Lookups don't continue past a boundary frame.
    boundary: bool,
}

impl<'a> Frame<'a> {
    /// A frame that starts a fresh scope, e.g. for the root data document.
    pub fn root(node: &'a Value) -> Self {
        Self {
            node,
            parent: None,
            index: None,
            boundary: true,
        }
    }

    /// A frame nested in `parent`.
    pub fn nested(parent: &'a Frame<'a>, node: &'a Value) -> Self {
        Self {
            node,
            parent: Some(parent),
            index: None,
            boundary: false,
        }
    }

    /// A frame for one element of a repeated section.
    pub fn item(parent: &'a Frame<'a>, node: &'a Value, index: usize) -> Self {
        Self {
            index: Some(index),
            ..Self::nested(parent, node)
        }
    }

    #[inline]
    pub fn node(&self) -> &'a Value {
        self.node
    }

    /// Resolves a path starting at this frame.
    ///
    /// If the first key is not found on this frame's node, the lookup moves up
    /// to the parent frame until a boundary. Once the first key is found the
    /// remaining segments must all match, there is no partial matching.
    pub fn resolve(&self, path: &Path) -> Option<Cow<'a, Value>> {
        let rest = path.rest();
        match path.first() {
            Segment::Current => lookup(self.node, rest).map(Cow::Borrowed),
            Segment::Index1 if rest.is_empty() => self.loop_index().map(|i| Cow::Owned(Value::from(i + 1))),
            Segment::Index0 if rest.is_empty() => self.loop_index().map(|i| Cow::Owned(Value::from(i))),
            Segment::Index1 | Segment::Index0 => None,
            first => {
                let node = self.chain().find_map(|frame| step(frame.node, first))?;
                lookup(node, rest).map(Cow::Borrowed)
            }
        }
    }

    /// Resolves a path starting at the parent of this frame.
    ///
    /// Message arguments are resolved this way because the current frame is
    /// bound to the message itself. A frame without a parent resolves the
    /// path itself.
    pub fn resolve_from_parent(&self, path: &Path) -> Option<Cow<'a, Value>> {
        match self.parent {
            Some(parent) if !self.boundary => parent.resolve(path),
            _ => self.resolve(path),
        }
    }

    /// The index of the nearest enclosing repeated section.
    fn loop_index(&self) -> Option<usize> {
        self.chain().find_map(|frame| frame.index)
    }

    /// Iterates from this frame up to and including the nearest boundary.
    fn chain(&self) -> Chain<'_, 'a> {
        Chain { next: Some(self) }
    }
}

struct Chain<'f, 'a> {
    next: Option<&'f Frame<'a>>,
}

impl<'f, 'a> Iterator for Chain<'f, 'a> {
    type Item = &'f Frame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.next?;
        self.next = match frame.boundary {
            true => None,
            false => frame.parent,
        };
        Some(frame)
    }
}

fn lookup<'a>(node: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    segments.iter().try_fold(node, step)
}

fn step<'a>(node: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (node, segment) {
        (Value::Object(map), Segment::Key(key)) => map.get(key),
        (Value::Object(map), Segment::Index(i)) => map.get(&i.to_string()),
        (Value::Array(list), Segment::Index(i)) => list.get(*i),
        _ => None,
    }
}
