//! Tag trees
//!
//! Generic recursive chunk container: every node is either a group (tag plus
//! ordered children) or a leaf (tag plus raw payload). The same tree type is
//! shared by every chunk-based format; what differs between formats lives in
//! a [`Dialect`].
//!
//! Unknown tags are never dropped. A decoded tree re-encodes to the same
//! bytes as long as nothing was edited, and edits to a subtree propagate to
//! all ancestor length fields because lengths are recomputed on encode.

mod codec;
mod dialect;
mod fourcc;

pub use codec::{decode_chunks, decode_tree, encode_tree, write_chunk, TreeDecoder};
pub use dialect::{
    ChunkIdRegistry, Classified, Dialect, DialectFlags, CHUNK_HEADER_LEN, GROUP_PREFIX_LEN,
    VENDOR_CONTAINER_TAG, VENDOR_PRESET_TAG, VENDOR_SUBITEMS_TAG,
};
pub use fourcc::FourCc;

/// Node kind; kept explicit so an empty group and a zero-length leaf differ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// Chunk with nested children
    Group,
    /// Chunk with a raw payload
    Leaf,
}

/// One node of a tag tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Four-character tag
    pub tag: FourCc,
    /// Group or leaf
    pub kind: ChunkKind,
    /// Leaf payload, or the group prefix (form type) for groups
    pub payload: Vec<u8>,
    /// Ordered children (always empty for leaves)
    pub children: Vec<Chunk>,
}

impl Chunk {
    /// Create a leaf chunk
    pub fn leaf(tag: FourCc, payload: Vec<u8>) -> Self {
        Self {
            tag,
            kind: ChunkKind::Leaf,
            payload,
            children: Vec::new(),
        }
    }

    /// Create a group chunk without a prefix
    pub fn group(tag: FourCc, children: Vec<Chunk>) -> Self {
        Self {
            tag,
            kind: ChunkKind::Group,
            payload: Vec::new(),
            children,
        }
    }

    /// Create a group chunk with a form-type prefix (RIFF `WAVE`, IFF `AIFF`, ...)
    pub fn form(tag: FourCc, form_type: FourCc, children: Vec<Chunk>) -> Self {
        Self {
            tag,
            kind: ChunkKind::Group,
            payload: form_type.0.to_vec(),
            children,
        }
    }

    /// True for group chunks
    pub fn is_group(&self) -> bool {
        self.kind == ChunkKind::Group
    }

    /// Form type of a prefixed group
    pub fn form_type(&self) -> Option<FourCc> {
        if !self.is_group() {
            return None;
        }
        let bytes: [u8; 4] = self.payload.as_slice().try_into().ok()?;
        Some(FourCc(bytes))
    }

    /// First direct child with the given tag
    pub fn child(&self, tag: FourCc) -> Option<&Chunk> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// Mutable access to the first direct child with the given tag
    pub fn child_mut(&mut self, tag: FourCc) -> Option<&mut Chunk> {
        self.children.iter_mut().find(|c| c.tag == tag)
    }

    /// Direct children of one kind
    pub fn children_of_kind(&self, kind: ChunkKind) -> impl Iterator<Item = &Chunk> {
        self.children.iter().filter(move |c| c.kind == kind)
    }

    /// Follow a path of tags through direct children, starting below `self`
    pub fn find_path(&self, path: &[FourCc]) -> Option<&Chunk> {
        path.iter().try_fold(self, |node, tag| node.child(*tag))
    }

    /// First chunk with the given tag in depth-first order, including `self`
    pub fn find(&self, tag: FourCc) -> Option<&Chunk> {
        self.walk().find_map(|event| match event {
            WalkEvent::Enter(c, _) | WalkEvent::Leaf(c, _) if c.tag == tag => Some(c),
            _ => None,
        })
    }

    /// Mutable depth-first search, including `self`
    pub fn find_mut(&mut self, tag: FourCc) -> Option<&mut Chunk> {
        if self.tag == tag {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(tag))
    }

    /// All chunks with the given tag in depth-first order
    pub fn find_all(&self, tag: FourCc) -> Vec<&Chunk> {
        self.walk()
            .filter_map(|event| match event {
                WalkEvent::Enter(c, _) | WalkEvent::Leaf(c, _) if c.tag == tag => Some(c),
                _ => None,
            })
            .collect()
    }

    /// Depth-first traversal with enter/leave/leaf events
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: vec![Frame::Visit(self, 0)],
        }
    }

    /// Number of nodes in this subtree
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Chunk::node_count).sum::<usize>()
    }

    /// Payload size of this chunk as it will be encoded in `dialect` (no framing, no pad)
    pub fn body_len(&self, dialect: &Dialect) -> u64 {
        match self.kind {
            ChunkKind::Leaf => self.payload.len() as u64,
            ChunkKind::Group => {
                let closing = if dialect.closing_tag(self.tag).is_some() {
                    CHUNK_HEADER_LEN as u64
                } else {
                    0
                };
                self.payload.len() as u64
                    + self
                        .children
                        .iter()
                        .map(|c| c.encoded_len(dialect))
                        .sum::<u64>()
                    + closing
            }
        }
    }

    /// Total encoded size including framing and padding
    pub fn encoded_len(&self, dialect: &Dialect) -> u64 {
        let body = self.body_len(dialect);
        CHUNK_HEADER_LEN as u64 + body + dialect.pad_len((body & 1) as u32) as u64
    }
}

/// Event produced by [`Chunk::walk`]; the `usize` is the nesting depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEvent<'a> {
    /// A group is entered; its children follow
    Enter(&'a Chunk, usize),
    /// All children of a group have been visited
    Leave(&'a Chunk, usize),
    /// A leaf chunk
    Leaf(&'a Chunk, usize),
}

enum Frame<'a> {
    Visit(&'a Chunk, usize),
    Leave(&'a Chunk, usize),
}

/// Iterative depth-first walk over a chunk tree
pub struct Walk<'a> {
    stack: Vec<Frame<'a>>,
}

impl<'a> Walk<'a> {
    /// Walk a sequence of sibling roots in order
    pub fn over(roots: &'a [Chunk]) -> Self {
        Walk {
            stack: roots.iter().rev().map(|c| Frame::Visit(c, 0)).collect(),
        }
    }
}

impl<'a> Iterator for Walk<'a> {
    type Item = WalkEvent<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.stack.pop()? {
            Frame::Visit(chunk, depth) => match chunk.kind {
                ChunkKind::Leaf => Some(WalkEvent::Leaf(chunk, depth)),
                ChunkKind::Group => {
                    self.stack.push(Frame::Leave(chunk, depth));
                    self.stack.extend(
                        chunk
                            .children
                            .iter()
                            .rev()
                            .map(|c| Frame::Visit(c, depth + 1)),
                    );
                    Some(WalkEvent::Enter(chunk, depth))
                }
            },
            Frame::Leave(chunk, depth) => Some(WalkEvent::Leave(chunk, depth)),
        }
    }
}
