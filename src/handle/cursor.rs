//! Copyable forward cursors behind the query handles.
//!
//! A [`Cursor`] owns its position state through a boxed [`ElementCursor`]
//! trait object. Callers only ever see the cursor and the value snapshots it
//! yields, so the way a group stores and resolves its elements can change
//! without touching any code built against the handles. Cloning a cursor
//! deep-copies the boxed state; the clone advances independently.

use std::fmt;

use crate::mesh::GroupRef;

/// An element kind the query interface can enumerate over a group.
pub trait Element: Copy + fmt::Debug + 'static {
    /// Number of elements of this kind in `group`.
    fn count(group: &GroupRef<'_>) -> usize;

    /// Snapshot of the element at position `pos`, or `None` past the end.
    fn fetch(group: &GroupRef<'_>, pos: usize) -> Option<Self>;
}

/// Position state of one cursor.
pub(crate) trait ElementCursor<'a, T>: fmt::Debug {
    fn current(&self) -> Option<T>;
    fn advance(&mut self);
    fn position(&self) -> usize;
    fn len(&self) -> usize;
    fn group(&self) -> GroupRef<'a>;
    fn box_clone(&self) -> Box<dyn ElementCursor<'a, T> + 'a>;
}

/// Cursor over the elements of one group, in group order.
struct GroupCursor<'a> {
    group: GroupRef<'a>,
    pos: usize,
    len: usize,
}

impl fmt::Debug for GroupCursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupCursor")
            .field("group", &self.group.name())
            .field("pos", &self.pos)
            .field("len", &self.len)
            .finish()
    }
}

impl<'a, T: Element> ElementCursor<'a, T> for GroupCursor<'a> {
    #[inline]
    fn current(&self) -> Option<T> {
        T::fetch(&self.group, self.pos)
    }

    #[inline]
    fn advance(&mut self) {
        if self.pos < self.len {
            self.pos += 1;
        }
    }

    #[inline]
    fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    fn len(&self) -> usize {
        self.len
    }

    fn group(&self) -> GroupRef<'a> {
        self.group
    }

    fn box_clone(&self) -> Box<dyn ElementCursor<'a, T> + 'a> {
        Box::new(GroupCursor {
            group: self.group,
            pos: self.pos,
            len: self.len,
        })
    }
}

/// Forward cursor yielding value snapshots of type `T`.
///
/// A default-constructed cursor is *singular*: it yields nothing, equals
/// other singular cursors and nothing else, and is only useful as an
/// assignment target. Non-singular cursors compare equal when they view the
/// same group at the same position.
///
/// Positions are only meaningful while the mesh sees no structural mutation;
/// the borrow held through [`GroupRef`] makes such mutation impossible while
/// the cursor is alive.
pub struct Cursor<'a, T: Element> {
    imp: Option<Box<dyn ElementCursor<'a, T> + 'a>>,
}

impl<'a, T: Element> Cursor<'a, T> {
    /// Cursor at position `pos` of `group`, clamped to the end position.
    pub(crate) fn new(group: GroupRef<'a>, pos: usize) -> Self {
        let len = T::count(&group);
        Cursor {
            imp: Some(Box::new(GroupCursor {
                group,
                pos: pos.min(len),
                len,
            })),
        }
    }

    /// True for default-constructed cursors.
    #[inline]
    pub fn is_singular(&self) -> bool {
        self.imp.is_none()
    }

    /// Snapshot of the current element; `None` at the end or when singular.
    #[inline]
    pub fn get(&self) -> Option<T> {
        self.imp.as_ref().and_then(|c| c.current())
    }

    /// Moves to the next element (pre-increment). Stays put at the end.
    #[inline]
    pub fn advance(&mut self) -> &mut Self {
        if let Some(c) = self.imp.as_mut() {
            c.advance();
        }
        self
    }

    /// Moves to the next element and returns the cursor as it was before
    /// (post-increment).
    pub fn post_increment(&mut self) -> Self {
        let before = self.clone();
        self.advance();
        before
    }

    /// Current position, or `None` when singular.
    #[inline]
    pub fn position(&self) -> Option<usize> {
        self.imp.as_ref().map(|c| c.position())
    }

    /// True when positioned past the last element. Singular cursors are
    /// always exhausted.
    #[inline]
    pub fn is_end(&self) -> bool {
        self.imp.as_ref().is_none_or(|c| c.position() >= c.len())
    }
}

impl<T: Element> Default for Cursor<'_, T> {
    fn default() -> Self {
        Cursor { imp: None }
    }
}

impl<T: Element> Clone for Cursor<'_, T> {
    fn clone(&self) -> Self {
        Cursor {
            imp: self.imp.as_ref().map(|c| c.box_clone()),
        }
    }
}

impl<T: Element> PartialEq for Cursor<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.imp, &other.imp) {
            (None, None) => true,
            (Some(a), Some(b)) => a.position() == b.position() && a.group().same_group(&b.group()),
            _ => false,
        }
    }
}

impl<T: Element> Eq for Cursor<'_, T> {}

impl<T: Element> fmt::Debug for Cursor<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.imp {
            Some(c) => f.debug_tuple("Cursor").field(c).finish(),
            None => f.write_str("Cursor(singular)"),
        }
    }
}

impl<T: Element> Iterator for Cursor<'_, T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        let item = self.get()?;
        self.advance();
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self
            .imp
            .as_ref()
            .map_or(0, |c| c.len().saturating_sub(c.position()));
        (rest, Some(rest))
    }
}

impl<T: Element> ExactSizeIterator for Cursor<'_, T> {}

impl<T: Element> std::iter::FusedIterator for Cursor<'_, T> {}
