use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::model::{Binding, Chunk, NestingStack, RuleId, SPACES_PER_INDENT};

/// LinePrefix describes a partial solution: how many chunks have been consumed, the column the
/// next line begins at, and the value bound to each rule still relevant at that point. Two
/// prefixes are equal iff those three fields are equal, and that equality is the memoization
/// key, so any two equal prefixes must lead to identical best suffix solutions.
///
/// The nesting stack that produced the column rides along for later splits but takes no part in
/// identity. The hash is computed once at construction since memo lookup is the hot path.
#[derive(Debug, Clone)]
pub(crate) struct LinePrefix {
    /// Number of chunks consumed; the next chunk to decide is at this index
    pub(crate) length: usize,

    /// Column the next line begins at
    pub(crate) column: usize,

    /// Rule bindings chosen or implied so far, sorted by rule id
    rule_values: Vec<(RuleId, Binding)>,

    /// Nesting levels currently owning indentation columns
    nesting: NestingStack,

    /// Cached hash over length, column and rule values
    hash: u64,
}

impl LinePrefix {
    /// The prefix before any chunk has been consumed.
    pub(crate) fn initial(indent: usize) -> Self {
        Self::new(
            0,
            indent * SPACES_PER_INDENT,
            Vec::new(),
            NestingStack::default(),
        )
    }

    pub(crate) fn new(
        length: usize,
        column: usize,
        mut rule_values: Vec<(RuleId, Binding)>,
        nesting: NestingStack,
    ) -> Self {
        rule_values.sort_by_key(|(id, _)| *id);

        let mut hasher = FxHasher::default();
        length.hash(&mut hasher);
        column.hash(&mut hasher);
        rule_values.hash(&mut hasher);
        let hash = hasher.finish();

        Self {
            length,
            column,
            rule_values,
            nesting,
            hash,
        }
    }

    /// The binding for the given rule, if the prefix has one.
    pub(crate) fn binding(&self, rule: RuleId) -> Option<Binding> {
        self.rule_values
            .iter()
            .find(|(id, _)| *id == rule)
            .map(|(_, binding)| *binding)
    }

    /// A prefix one chunk longer with the split collapsed: same column, updated rule bindings.
    pub(crate) fn extend(&self, rule_values: Vec<(RuleId, Binding)>) -> Self {
        Self::new(
            self.length + 1,
            self.column,
            rule_values,
            self.nesting.clone(),
        )
    }

    /// The prefixes one chunk longer for the case where `chunk` splits. One prefix is produced
    /// per legal assignment of nesting levels to indentation columns on the new line.
    pub(crate) fn split(&self, chunk: &Chunk, rule_values: Vec<(RuleId, Binding)>) -> Vec<Self> {
        self.nesting
            .apply_split(chunk.nesting)
            .into_iter()
            .map(|nesting| {
                let column = if chunk.flush_left {
                    0
                } else {
                    chunk.absolute_indent + nesting.indent()
                };
                Self::new(self.length + 1, column, rule_values.clone(), nesting)
            })
            .collect()
    }
}

impl PartialEq for LinePrefix {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.length == other.length
            && self.column == other.column
            && self.rule_values == other.rule_values
    }
}

impl Eq for LinePrefix {}

impl Hash for LinePrefix {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}
