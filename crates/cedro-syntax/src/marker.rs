//! `Marker` and `MarkerArray` (spec.md §3, §4.2).
//!
//! Ported from `examples/original_source/src/array.h`'s
//! `DEFINE_ARRAY_OF(Marker, 0, {})` instantiation: a growable sequence with
//! an atomic `splice` that deletes a subrange and inserts a slice in one
//! step, implemented here with [`Vec::splice`] rather than a hand-rolled
//! `memmove`, since that is what the underlying operation already does.

use crate::buffer::Buffer;
use crate::token::TokenKind;

/// `(start: byte offset, len: byte count, kind: token kind, synthetic: bool)`
/// (spec.md §3 "Marker").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub start: usize,
    pub len: usize,
    pub kind: TokenKind,
    pub synthetic: bool,
}

impl Marker {
    pub fn new(start: usize, len: usize, kind: TokenKind) -> Self {
        Self {
            start,
            len,
            kind,
            synthetic: false,
        }
    }

    pub fn synthetic(start: usize, len: usize, kind: TokenKind) -> Self {
        Self {
            start,
            len,
            kind,
            synthetic: true,
        }
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn text<'b>(&self, buffer: &'b Buffer) -> &'b str {
        buffer.text(self.start, self.len)
    }

    /// Intern `text` into `buffer` and wrap the result as a synthetic
    /// marker of `kind` (spec.md §4.2 `Marker_from`).
    pub fn from_text(buffer: &mut Buffer, text: &str, kind: TokenKind) -> Self {
        let start = buffer.intern(text.as_bytes());
        Self::synthetic(start, text.len(), kind)
    }
}

/// An ordered, growable sequence of [`Marker`]s with splice-in-place
/// semantics (spec.md §3 "Marker array").
#[derive(Debug, Clone, Default)]
pub struct MarkerArray {
    markers: Vec<Marker>,
}

impl MarkerArray {
    pub fn new() -> Self {
        Self { markers: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            markers: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn as_slice(&self) -> &[Marker] {
        &self.markers
    }

    pub fn push(&mut self, marker: Marker) {
        self.markers.push(marker);
    }

    pub fn get(&self, index: usize) -> &Marker {
        &self.markers[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut Marker {
        &mut self.markers[index]
    }

    pub fn truncate(&mut self, len: usize) {
        self.markers.truncate(len);
    }

    pub fn delete(&mut self, position: usize, count: usize) {
        self.markers.drain(position..position + count);
    }

    /// Delete `delete_count` markers starting at `position`, optionally
    /// copying them into `sink`, then insert `insert` at that position.
    /// `insert` must come from a different array or be owned — the
    /// "no self-aliasing" rule from spec.md §3 is enforced by Rust's
    /// borrow checker at the call site (an overlapping `&mut self`/`&self`
    /// borrow simply does not typecheck).
    pub fn splice(
        &mut self,
        position: usize,
        delete_count: usize,
        sink: Option<&mut Vec<Marker>>,
        insert: &[Marker],
    ) {
        let end = position + delete_count;
        if let Some(sink) = sink {
            sink.extend_from_slice(&self.markers[position..end]);
        }
        self.markers.splice(position..end, insert.iter().copied());
    }

    pub fn append_slice(&mut self, insert: &[Marker]) {
        self.markers.extend_from_slice(insert);
    }

    /// Index of the nearest marker before `index` (exclusive) whose kind is
    /// not [`TokenKind::is_trivia`], or `None` if every earlier marker is
    /// trivia.
    pub fn last_significant_before(&self, index: usize) -> Option<usize> {
        (0..index)
            .rev()
            .find(|&i| !self.markers[i].kind.is_trivia())
    }

    /// Index of the nearest marker at-or-after `index` whose kind is not
    /// trivia.
    pub fn next_significant_from(&self, index: usize) -> Option<usize> {
        (index..self.markers.len()).find(|&i| !self.markers[i].kind.is_trivia())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Marker> {
        self.markers.iter()
    }
}

impl std::ops::Index<usize> for MarkerArray {
    type Output = Marker;
    fn index(&self, index: usize) -> &Marker {
        &self.markers[index]
    }
}
