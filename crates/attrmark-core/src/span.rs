/// Half-open range of line indexes, `start..end`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LineSpan {
    pub start: usize,
    pub end: usize,
}

/// What a top-level line range turned into.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SegmentKind {
    Blank,
    /// Reference definitions; they feed the registry and produce no block.
    Definition,
    Block,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Segment {
    pub lines: LineSpan,
    pub kind: SegmentKind,
}
