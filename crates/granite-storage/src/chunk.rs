use crate::Segment;

/// A bounded group of rows stored columnwise: one segment per table column,
/// all of the same length.
#[derive(Debug, Clone)]
pub struct Chunk {
    segments: Vec<Segment>,
}

impl Chunk {
    /// Callers (i.e. `Table::append_chunk`) validate segment lengths before
    /// constructing a chunk.
    pub(crate) fn new(segments: Vec<Segment>) -> Self {
        debug_assert!(
            segments.windows(2).all(|w| w[0].len() == w[1].len()),
            "chunk segments must have equal lengths"
        );
        Chunk { segments }
    }

    /// Number of rows in this chunk
    pub fn size(&self) -> usize {
        self.segments.first().map_or(0, |s| s.len())
    }

    pub fn column_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segment(&self, column: usize) -> &Segment {
        &self.segments[column]
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}
