use std::iter;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::model::{
    Binding, Chunk, LinePrefix, RuleId, Rules, Span, SpanId, SplitSet, Value, OVERFLOW_CHAR_COST,
    SPACES_PER_INDENT,
};

/// LineSplitter decides where a batch of chunks breaks into lines.
///
/// The search walks the batch chunk by chunk. At each chunk it enumerates the values the chunk's
/// rule may still take, recursing on the rest of the batch for each choice. A choice either
/// collapses the split (the line keeps growing) or takes it, in which case every legal
/// assignment of nesting levels to indentation columns opens its own candidate line.
///
/// The state a partial solution leaves behind is captured by a [`LinePrefix`]: chunks consumed,
/// the column the next line starts at, and the values bound to rules that cross into the
/// remaining chunks. Suffix solutions depend on nothing else, so the best [`SplitSet`] per
/// prefix is memoized and the exponential assignment space collapses to the number of distinct
/// prefixes actually reachable.
///
/// Costs are compared with [`evaluate_cost`](Self::evaluate_cost): overflow past the page width
/// is charged per character at a rate that dominates rule and span costs, so a fitting solution
/// always wins over an overflowing one while pathological input still renders rather than fail.
///
/// A splitter instance lives for exactly one batch. Its memo table and nested-block cache die
/// with it.
pub struct LineSplitter<'a> {
    /// Written between lines
    line_ending: &'a str,

    /// Target line width; overshoot is penalized, not forbidden
    page_width: usize,

    /// The batch. Never empty, and the final chunk is a sentinel whose rule and trailing split
    /// are never consulted.
    chunks: &'a [Chunk],

    /// Rule arena shared by every chunk in the batch
    rules: &'a Rules,

    /// Span list shared by every chunk in the batch
    spans: &'a [Span],

    /// Indent level the first line starts at
    indent: usize,

    /// Distinct rules appearing in chunks `[0, i)`
    prefix_rules: Vec<Vec<RuleId>>,

    /// Distinct rules appearing in chunks `[i, N-1)`; the sentinel's rule is excluded
    suffix_rules: Vec<Vec<RuleId>>,

    /// Best splits per prefix. `None` records a prefix proven unsolvable.
    memo: FxHashMap<LinePrefix, Option<SplitSet>>,

    /// Formatted nested blocks keyed by (chunk index, column)
    block_cache: FxHashMap<(usize, usize), FormattedBlock>,
}

/// Outcome of splitting one batch: the solution's cost plus any selection offsets the chunks
/// carried, as absolute positions in the output buffer after the call.
#[derive(Debug, Clone, Default)]
pub struct SplitResult {
    pub cost: usize,
    pub selection_start: Option<usize>,
    pub selection_end: Option<usize>,
}

/// A nested block rendered at a particular column, cached per batch.
struct FormattedBlock {
    text: String,
    cost: usize,
    selection_start: Option<usize>,
    selection_end: Option<usize>,
}

/// The running best solution while one prefix's candidates are enumerated. Candidates are
/// always costed from the prefix the enumeration started at, however deep the unsplit walk has
/// carried the search. Frozen into the memo once the enumeration finishes.
struct SplitSolution {
    prefix: LinePrefix,
    splits: Option<SplitSet>,
    cost: usize,
}

impl<'a> LineSplitter<'a> {
    pub fn new(
        line_ending: &'a str,
        page_width: usize,
        chunks: &'a [Chunk],
        rules: &'a Rules,
        spans: &'a [Span],
        indent: usize,
    ) -> Self {
        assert!(!chunks.is_empty(), "chunk batch must not be empty");
        let count = chunks.len();

        // prefix_rules[i] holds the rules of chunks [0, i)
        let mut prefix_rules: Vec<Vec<RuleId>> = Vec::with_capacity(count + 1);
        let mut seen: Vec<RuleId> = Vec::new();
        prefix_rules.push(Vec::new());
        for chunk in chunks {
            if let Some(rule) = chunk.rule {
                if !seen.contains(&rule) {
                    seen.push(rule);
                }
            }
            let mut sorted = seen.clone();
            sorted.sort();
            prefix_rules.push(sorted);
        }

        // suffix_rules[i] holds the rules of chunks [i, N-1); the sentinel never contributes
        let mut suffix_rules: Vec<Vec<RuleId>> = vec![Vec::new(); count + 1];
        let mut seen: Vec<RuleId> = Vec::new();
        for i in (0..count).rev() {
            if i + 1 < count {
                if let Some(rule) = chunks[i].rule {
                    if !seen.contains(&rule) {
                        seen.push(rule);
                    }
                }
            }
            let mut sorted = seen.clone();
            sorted.sort();
            suffix_rules[i] = sorted;
        }

        Self {
            line_ending,
            page_width,
            chunks,
            rules,
            spans,
            indent,
            prefix_rules,
            suffix_rules,
            memo: FxHashMap::default(),
            block_cache: FxHashMap::default(),
        }
    }

    /// Solve the batch, render the best solution into `out` and return its cost along with any
    /// selection offsets.
    pub fn apply(&mut self, out: &mut String) -> SplitResult {
        trace!("Apply: chunks={} indent={}", self.chunks.len(), self.indent);

        let prefix = LinePrefix::initial(self.indent);
        let best = self
            .find_best_splits(&prefix)
            .expect("batch has no legal rule-value assignment");
        let cost = self.evaluate_cost(&prefix, &best);
        let (selection_start, selection_end) = self.write_splits(out, &best);

        SplitResult {
            cost,
            selection_start,
            selection_end,
        }
    }

    /// The best splits for the chunks beyond `prefix`, or `None` when the prefix's bindings are
    /// unsatisfiable. Memoized per prefix.
    fn find_best_splits(&mut self, prefix: &LinePrefix) -> Option<SplitSet> {
        if let Some(cached) = self.memo.get(prefix) {
            return cached.clone();
        }
        trace!(
            "Find best splits: length={} column={}",
            prefix.length,
            prefix.column
        );

        let mut solution = SplitSolution {
            prefix: prefix.clone(),
            splits: None,
            cost: usize::MAX,
        };
        self.try_chunk_rule_values(&mut solution, prefix);

        self.memo.insert(prefix.clone(), solution.splits.clone());
        solution.splits
    }

    /// Enumerate the values the next chunk's rule may take under `prefix` and fold each into
    /// the running solution.
    fn try_chunk_rule_values(&mut self, solution: &mut SplitSolution, prefix: &LinePrefix) {
        // Only the terminal chunk remains; nothing more needs to split
        if prefix.length == self.chunks.len() - 1 {
            self.update(solution, SplitSet::empty());
            return;
        }

        let chunk = &self.chunks[prefix.length];
        let rule = chunk.rule.expect("only the terminal chunk may lack a rule");
        let num_values = self.rules[rule].num_values();

        match prefix.binding(rule) {
            None => {
                for value in 0..num_values {
                    self.try_rule_value(solution, prefix, value);
                }
            }
            Some(Binding::MustSplitAny) => {
                // The rule has to split but the value is still free; zero is off the table
                for value in 1..num_values {
                    self.try_rule_value(solution, prefix, value);
                }
            }
            Some(Binding::Bound(value)) => self.try_rule_value(solution, prefix, value),
        }
    }

    /// Try one value for the next chunk's rule: recurse on every candidate line the split opens,
    /// or extend the current line if the value collapses the split.
    fn try_rule_value(&mut self, solution: &mut SplitSolution, prefix: &LinePrefix, value: Value) {
        let chunks = self.chunks;
        let chunk = &chunks[prefix.length];
        let rule = chunk.rule.expect("only the terminal chunk may lack a rule");
        let bindings = self.advance_prefix(prefix, value);

        if self.rules[rule].is_split(value, chunk) {
            for longer in prefix.split(chunk, bindings) {
                let Some(remaining) = self.find_best_splits(&longer) else {
                    continue;
                };
                let candidate = remaining.add(prefix.length, longer.column);
                self.update(solution, candidate);
            }
        } else {
            self.try_chunk_rule_values(solution, &prefix.extend(bindings));
        }
    }

    /// Compute the rule bindings for the prefix one chunk longer. Rules straddling the new
    /// boundary keep their value across the cut, and every bound prefix rule gets a chance to
    /// constrain (or be back-constrained by) each remaining suffix rule. The last writer wins
    /// when two rules constrain the same target.
    fn advance_prefix(&self, prefix: &LinePrefix, value: Value) -> Vec<(RuleId, Binding)> {
        let boundary = prefix.length + 1;
        let chunk_rule = self.chunks[prefix.length]
            .rule
            .expect("only the terminal chunk may lack a rule");

        let mut updated: Vec<(RuleId, Binding)> = Vec::new();
        for &rule in &self.prefix_rules[boundary] {
            let binding = if rule == chunk_rule {
                Some(Binding::Bound(value))
            } else {
                prefix.binding(rule)
            };

            if self.suffix_rules[boundary].binary_search(&rule).is_ok() {
                if let Some(binding) = binding {
                    set_binding(&mut updated, rule, binding);
                }
            }

            // An unbound rule places no constraint on the suffix
            let Some(binding) = binding else {
                continue;
            };

            for &other in &self.suffix_rules[boundary] {
                if other == rule {
                    continue;
                }
                let constraint = self.rules[rule]
                    .constrain(binding, other)
                    .or_else(|| self.rules[other].reverse_constrain(binding, rule));
                if let Some(constraint) = constraint {
                    set_binding(&mut updated, rule, binding);
                    set_binding(&mut updated, other, constraint);
                }
            }
        }
        updated
    }

    /// Fold a candidate split set into the running solution if it is cheaper than the best so
    /// far.
    fn update(&mut self, solution: &mut SplitSolution, candidate: SplitSet) {
        let prefix = solution.prefix.clone();
        let cost = self.evaluate_cost(&prefix, &candidate);
        if cost < solution.cost {
            solution.cost = cost;
            solution.splits = Some(candidate);
        }
    }

    /// Cost of rendering the chunks beyond `prefix` with the given splits: overflow per
    /// character past the page width, each split rule's cost once, each span covering a split
    /// chunk once, and the cost of every nested block formatted at its split column.
    fn evaluate_cost(&mut self, prefix: &LinePrefix, splits: &SplitSet) -> usize {
        let chunks = self.chunks;
        let last = chunks.len() - 1;

        let mut cost = 0;
        let mut length = prefix.column;
        let mut split_spans: FxHashSet<SpanId> = FxHashSet::default();
        let mut counted_rules: FxHashSet<RuleId> = FxHashSet::default();

        for (index, chunk) in chunks.iter().enumerate().skip(prefix.length) {
            length += chunk.text.len();
            if index >= last {
                continue;
            }

            if splits.should_split_at(index) {
                cost += self.overflow_cost(length);
                split_spans.extend(chunk.spans.iter().copied());

                if let Some(rule) = chunk.rule {
                    if counted_rules.insert(rule) {
                        cost += self.rules[rule].cost();
                    }
                }
                if !chunk.block_chunks.is_empty() {
                    cost += self.format_block(index, splits.column(index)).cost;
                }

                length = splits.column(index);
            } else {
                if chunk.space_when_unsplit {
                    length += 1;
                }
                length += chunk.unsplit_block_length;
            }
        }

        // The final line pays overflow too, then spans covering any split chunk charge once
        cost += self.overflow_cost(length);
        for span in split_spans {
            cost += self.spans[span].cost;
        }
        cost
    }

    fn overflow_cost(&self, length: usize) -> usize {
        length.saturating_sub(self.page_width) * OVERFLOW_CHAR_COST
    }

    /// The chunk's nested block formatted at the given column, cached per (chunk, column).
    fn format_block(&mut self, index: usize, column: usize) -> &FormattedBlock {
        let key = (index, column);
        if !self.block_cache.contains_key(&key) {
            let block = self.render_block(index, column);
            self.block_cache.insert(key, block);
        }
        &self.block_cache[&key]
    }

    /// Run a sub-splitter over the chunk's nested block. The block sees the page width that
    /// remains right of its column and renders with a leading line ending, every non-empty line
    /// indented to the column.
    fn render_block(&self, index: usize, column: usize) -> FormattedBlock {
        let chunk = &self.chunks[index];
        trace!("Render block: index={} column={}", index, column);

        let mut splitter = LineSplitter::new(
            self.line_ending,
            self.page_width.saturating_sub(column),
            &chunk.block_chunks,
            self.rules,
            self.spans,
            if chunk.flush_left { 0 } else { 1 },
        );
        let mut text = String::new();
        let result = splitter.apply(&mut text);

        let mut formatted = String::new();
        let mut selection_start = None;
        let mut selection_end = None;
        let mut offset = 0;
        for line in text.split(self.line_ending) {
            formatted.push_str(self.line_ending);
            if !line.is_empty() {
                formatted.reserve(column);
                formatted.extend(iter::repeat(' ').take(column));
            }

            let line_out = formatted.len();
            formatted.push_str(line);

            // Selection offsets reported by the sub-splitter shift with the indentation
            if let Some(sel) = result.selection_start {
                if sel >= offset && sel <= offset + line.len() {
                    selection_start = Some(line_out + (sel - offset));
                }
            }
            if let Some(sel) = result.selection_end {
                if sel >= offset && sel <= offset + line.len() {
                    selection_end = Some(line_out + (sel - offset));
                }
            }
            offset += line.len() + self.line_ending.len();
        }

        FormattedBlock {
            text: formatted,
            cost: result.cost,
            selection_start,
            selection_end,
        }
    }

    /// Render the solved splits: each chunk's text, nested blocks inline or at their split
    /// column, line endings (doubled where asked) with the following line's indentation, and a
    /// single space wherever a collapsed split requests one. No whitespace follows the final
    /// chunk.
    fn write_splits(
        &mut self,
        out: &mut String,
        splits: &SplitSet,
    ) -> (Option<usize>, Option<usize>) {
        trace!("Write splits");

        let chunks = self.chunks;
        let last = chunks.len() - 1;
        let mut selection_start = None;
        let mut selection_end = None;

        push_spaces(out, self.indent * SPACES_PER_INDENT);

        for (index, chunk) in chunks.iter().enumerate() {
            if let Some(sel) = chunk.selection_start {
                selection_start = Some(out.len() + sel);
            }
            if let Some(sel) = chunk.selection_end {
                selection_end = Some(out.len() + sel);
            }
            out.push_str(&chunk.text);

            if !chunk.block_chunks.is_empty() {
                if splits.should_split_at(index) {
                    let block = self.format_block(index, splits.column(index));
                    if let Some(sel) = block.selection_start {
                        selection_start = Some(out.len() + sel);
                    }
                    if let Some(sel) = block.selection_end {
                        selection_end = Some(out.len() + sel);
                    }
                    out.push_str(&block.text);
                } else {
                    write_inline_block(out, chunk, &mut selection_start, &mut selection_end);
                }
            }

            if index < last {
                if splits.should_split_at(index) {
                    out.push_str(self.line_ending);
                    if chunk.is_double {
                        out.push_str(self.line_ending);
                    }
                    push_spaces(out, splits.column(index));
                } else if chunk.space_when_unsplit {
                    out.push(' ');
                }
            }
        }

        (selection_start, selection_end)
    }
}

/// Bind `rule` in the list, overwriting any existing entry.
fn set_binding(bindings: &mut Vec<(RuleId, Binding)>, rule: RuleId, binding: Binding) {
    match bindings.iter_mut().find(|(id, _)| *id == rule) {
        Some(entry) => entry.1 = binding,
        None => bindings.push((rule, binding)),
    }
}

/// Emit a block's chunks on the current line, with a space wherever a collapsed split asks for
/// one.
fn write_inline_block(
    out: &mut String,
    chunk: &Chunk,
    selection_start: &mut Option<usize>,
    selection_end: &mut Option<usize>,
) {
    let count = chunk.block_chunks.len();
    for (i, block_chunk) in chunk.block_chunks.iter().enumerate() {
        if let Some(sel) = block_chunk.selection_start {
            *selection_start = Some(out.len() + sel);
        }
        if let Some(sel) = block_chunk.selection_end {
            *selection_end = Some(out.len() + sel);
        }
        out.push_str(&block_chunk.text);

        if !block_chunk.block_chunks.is_empty() {
            write_inline_block(out, block_chunk, selection_start, selection_end);
        }
        if i + 1 < count && block_chunk.space_when_unsplit {
            out.push(' ');
        }
    }
}

fn push_spaces(out: &mut String, count: usize) {
    out.reserve(count);
    out.extend(iter::repeat(' ').take(count));
}
