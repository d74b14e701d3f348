/// SplitSet is an immutable, sparse mapping from chunk index to the column at which the line
/// following that chunk begins. A missing entry means the chunk does not split. Sets are built
/// bottom-up during the search by extending the best suffix solution one split at a time, so
/// `add` is copy-on-write and the receiver is never modified.
#[derive(Debug, Clone, Default)]
pub struct SplitSet {
    columns: Vec<Option<usize>>,
}

impl SplitSet {
    /// A SplitSet with no splits.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Return a new SplitSet identical to this one except that `index` maps to `column`.
    /// Indices need not be added contiguously; the gap entries stay "no split".
    pub fn add(&self, index: usize, column: usize) -> Self {
        let mut columns = self.columns.clone();
        if index >= columns.len() {
            columns.resize(index + 1, None);
        }
        columns[index] = Some(column);
        Self { columns }
    }

    /// Return true if a new line begins after the chunk at `index`.
    pub fn should_split_at(&self, index: usize) -> bool {
        self.columns.get(index).map_or(false, |c| c.is_some())
    }

    /// The column the line following the chunk at `index` begins at. Only defined when
    /// `should_split_at(index)` is true.
    pub fn column(&self, index: usize) -> usize {
        self.columns[index].expect("no split recorded at index")
    }
}
