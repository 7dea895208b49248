/// Position of a row in a chunked table: chunk id plus offset within the
/// chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowId {
    pub chunk_id: u32,
    pub chunk_offset: u32,
}

/// Sentinel marking "no row", used for the unmatched side of outer joins.
pub const NULL_ROW_ID: RowId = RowId { chunk_id: u32::MAX, chunk_offset: u32::MAX };

impl RowId {
    pub const fn new(chunk_id: u32, chunk_offset: u32) -> Self {
        RowId { chunk_id, chunk_offset }
    }

    pub fn is_null(self) -> bool {
        self == NULL_ROW_ID
    }
}

/// An ordered sequence of row positions. May contain `NULL_ROW_ID`.
///
/// Pos lists are shared between reference segments via `Arc`; one pos list
/// commonly drives every output segment of one side of a join chunk.
pub type PosList = Vec<RowId>;
