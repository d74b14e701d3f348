use crate::model::RuleId;

/// Index of a span in the batch facade's span list.
pub type SpanId = usize;

/// A span is a cost-carrying interval over chunks. It contributes its cost at most once per
/// solution, if any chunk it covers is split.
#[derive(Debug, Clone, Copy, Default)]
pub struct Span {
    pub cost: usize,
}

impl Span {
    pub fn new(cost: usize) -> Self {
        Self { cost }
    }
}

/// A chunk is one atomic unit of output text together with the metadata for the potential split
/// that follows it: the rule governing the split, the spans covering it, an optional nested
/// block, and the indentation the following line begins with when the split is taken.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    /// The text of this chunk
    pub(crate) text: String,

    /// The rule governing the split after this chunk. Absent only on the final sentinel chunk.
    pub(crate) rule: Option<RuleId>,

    /// Spans covering this chunk
    pub(crate) spans: Vec<SpanId>,

    /// Nested chunk sequence formatted by a recursive sub-splitter when this chunk splits, or
    /// rendered inline when it does not. Either empty or a complete batch ending in a sentinel.
    pub(crate) block_chunks: Vec<Chunk>,

    /// When the split after this chunk collapses, does a single space separate it from the next
    /// chunk?
    pub(crate) space_when_unsplit: bool,

    /// When split, emit two line endings
    pub(crate) is_double: bool,

    /// Ignore indentation on the line this chunk's split opens
    pub(crate) flush_left: bool,

    /// The split after this chunk is unconditional
    pub(crate) is_hard_split: bool,

    /// Selection offsets within `text`, passed through to absolute output offsets
    pub(crate) selection_start: Option<usize>,
    pub(crate) selection_end: Option<usize>,

    /// Horizontal width contributed by `block_chunks` when rendered inline
    pub(crate) unsplit_block_length: usize,

    /// Expression nesting depth at this chunk
    pub(crate) nesting: usize,

    /// Indentation column for the line this chunk's split opens, before nesting indent
    pub(crate) absolute_indent: usize,
}

impl Chunk {
    /// Create a chunk with the given text, governed by the given rule.
    pub fn text<T: Into<String>>(text: T, rule: RuleId) -> Self {
        Self {
            text: text.into(),
            rule: Some(rule),
            ..Self::default()
        }
    }

    /// The final chunk of a batch. Its trailing split is never decided, so it carries no rule.
    pub fn last<T: Into<String>>(text: T) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// An empty terminal chunk.
    pub fn sentinel() -> Self {
        Self::default()
    }

    /// Attach the covering spans
    pub fn with_spans(mut self, spans: Vec<SpanId>) -> Self {
        self.spans = spans;
        self
    }

    /// Attach a nested block. The inline width is derived from the block itself.
    pub fn with_block(mut self, block: Vec<Chunk>) -> Self {
        self.block_chunks = block;
        self.unsplit_block_length = self.inline_block_width();
        self
    }

    /// A space separates this chunk from the next when the split collapses
    pub fn space_when_unsplit(mut self) -> Self {
        self.space_when_unsplit = true;
        self
    }

    /// Emit two line endings when split
    pub fn double(mut self) -> Self {
        self.is_double = true;
        self
    }

    /// Ignore indentation on the following line
    pub fn flush_left(mut self) -> Self {
        self.flush_left = true;
        self
    }

    /// Mark the split after this chunk unconditional. The chunk's rule should be a
    /// [`HardSplitRule`](crate::model::HardSplitRule).
    pub fn hard(mut self) -> Self {
        self.is_hard_split = true;
        self
    }

    /// Set the expression nesting depth
    pub fn with_nesting(mut self, nesting: usize) -> Self {
        self.nesting = nesting;
        self
    }

    /// Set the indentation column for the line this chunk's split opens
    pub fn with_indent(mut self, column: usize) -> Self {
        self.absolute_indent = column;
        self
    }

    /// Record selection offsets within this chunk's text
    pub fn with_selection(mut self, start: Option<usize>, end: Option<usize>) -> Self {
        self.selection_start = start;
        self.selection_end = end;
        self
    }

    /// Width of the nested block when rendered inline: each block chunk's text plus its own
    /// inlined block, with a single space wherever a collapsed split asks for one.
    pub fn inline_block_width(&self) -> usize {
        let count = self.block_chunks.len();
        let mut width = 0;
        for (i, chunk) in self.block_chunks.iter().enumerate() {
            width += chunk.text.len() + chunk.inline_block_width();
            if i + 1 < count && chunk.space_when_unsplit {
                width += 1;
            }
        }
        width
    }
}
