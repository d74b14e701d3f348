use std::io;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::engine::{LineSplitter, SplitResult};
use crate::model::{
    Binding, Chunk, Config, Error, HardSplitRule, Result, RuleId, Rules, Span,
    PREEMPTION_THRESHOLD,
};

/// LineWriter owns the chunk stream for one logical statement or top-level construct and feeds
/// it through [`LineSplitter`] in independent pieces.
///
/// A hard split that is not trapped inside an expression nesting, a nested block or an open
/// rule is a safe cut point: no split decision can reach across it, so the chunks on either
/// side solve independently. Each resulting batch has its nesting depths flattened to ranks
/// (shrinking the nesting search space without changing any solution) and may have oversized
/// rules preempted into hard splits before a fresh splitter runs on it.
///
/// The writer is consumed by [`write`](Self::write); re-entrant use of a stream is not a thing.
pub struct LineWriter {
    config: Config,
    chunks: Vec<Chunk>,
    rules: Rules,
    spans: Vec<Span>,

    /// Indent level every batch starts at
    indent: usize,
}

impl LineWriter {
    pub fn new(
        config: Config,
        chunks: Vec<Chunk>,
        rules: Rules,
        spans: Vec<Span>,
        indent: usize,
    ) -> Self {
        Self {
            config,
            chunks,
            rules,
            spans,
            indent,
        }
    }

    /// Split the whole stream, append the rendered text to `out` and return the accumulated
    /// cost plus any selection offsets.
    pub fn write(mut self, out: &mut String) -> SplitResult {
        trace!("Write: chunks={}", self.chunks.len());
        assert!(!self.chunks.is_empty(), "chunk stream must not be empty");

        self.set_rule_bounds();
        self.harden_split_rules();

        // Cut the stream into batches ending at each safe cut point. The terminal chunk of a
        // batch renders but its trailing split is never decided; for interior batches that
        // chunk is the cut itself and the stitching below supplies its line ending.
        let last = self.chunks.len() - 1;
        let mut batches: Vec<(usize, usize)> = Vec::new();
        let mut start = 0;
        for cut in self.find_cut_points() {
            batches.push((start, cut));
            start = cut + 1;
        }
        if start <= last {
            batches.push((start, last));
        }
        trace!("Batches: {:?}", batches);

        let mut result = SplitResult::default();
        for i in 0..batches.len() {
            if i > 0 {
                let cut = batches[i - 1].1;
                out.push_str(&self.config.line_ending);
                if self.chunks[cut].is_double {
                    out.push_str(&self.config.line_ending);
                }
            }

            let (start, end) = batches[i];
            self.flatten_nesting(start, end);
            self.preempt(start, end);

            let mut splitter = LineSplitter::new(
                &self.config.line_ending,
                self.config.page_width,
                &self.chunks[start..=end],
                &self.rules,
                &self.spans,
                self.indent,
            );
            let batch = splitter.apply(out);

            result.cost += batch.cost;
            if batch.selection_start.is_some() {
                result.selection_start = batch.selection_start;
            }
            if batch.selection_end.is_some() {
                result.selection_end = batch.selection_end;
            }
        }
        result
    }

    /// Split the stream and write the rendered text to the given writer.
    pub fn write_to<T: io::Write>(self, writer: &mut T) -> Result<SplitResult> {
        let mut out = String::new();
        let result = self.write(&mut out);
        writer
            .write_all(out.as_bytes())
            .map_err(|e| Error::new("failed to write formatted output").wrap_io(e))?;
        Ok(result)
    }

    /// Record each rule's first and last owned chunk index. Set once before any splitting or
    /// preemption looks at rule ranges.
    fn set_rule_bounds(&mut self) {
        let mut bounds: FxHashMap<RuleId, (usize, usize)> = FxHashMap::default();
        for (index, chunk) in self.chunks.iter().enumerate() {
            if let Some(rule) = chunk.rule {
                bounds.entry(rule).or_insert((index, index)).1 = index;
            }
        }
        for (rule, (start, end)) in bounds {
            self.rules.set_bounds(rule, start, end);
        }
    }

    /// A hard split inside a rule's range means the rule cannot hold its line together, so the
    /// innermost rule spanning each hard chunk is hardened too, unless it opts out via
    /// `splits_on_inner_rules`. Outer rules follow through the constraint recursion in
    /// [`harden_rule`](Self::harden_rule).
    fn harden_split_rules(&mut self) {
        let mut hardened = FxHashSet::default();
        for index in 0..self.chunks.len() {
            if !self.chunks[index].is_hard_split {
                continue;
            }
            let innermost = self
                .rules
                .ids()
                .filter(|&rule| {
                    if self.rules[rule].is_hard() {
                        return false;
                    }
                    let (start, end) = self.rules.bounds(rule);
                    start <= index && index < end
                })
                .max_by_key(|&rule| self.rules.bounds(rule).0);

            if let Some(rule) = innermost {
                if self.rules[rule].splits_on_inner_rules() {
                    self.harden_rule(rule, &mut hardened);
                }
            }
        }
    }

    /// A hard split at top-level nesting with no nested block and no rule spanning past it cuts
    /// the stream; nothing the splitter decides can reach across such a chunk.
    fn find_cut_points(&self) -> Vec<usize> {
        let mut cuts = Vec::new();
        for (index, chunk) in self.chunks.iter().enumerate() {
            if !chunk.is_hard_split || chunk.nesting != 0 || !chunk.block_chunks.is_empty() {
                continue;
            }
            let open = self.rules.ids().any(|rule| {
                let (start, end) = self.rules.bounds(rule);
                start <= index && index < end
            });
            if !open {
                cuts.push(index);
            }
        }
        cuts
    }

    /// Renumber the batch's non-zero nesting depths to their ascending rank. Order is
    /// preserved and gaps disappear, so the set of legal indentation assignments shrinks
    /// without losing any distinct solution.
    fn flatten_nesting(&mut self, start: usize, end: usize) {
        let mut depths: Vec<usize> = self.chunks[start..=end]
            .iter()
            .map(|c| c.nesting)
            .filter(|&n| n != 0)
            .collect();
        depths.sort();
        depths.dedup();

        for chunk in &mut self.chunks[start..=end] {
            if chunk.nesting != 0 {
                chunk.nesting = depths.binary_search(&chunk.nesting).unwrap() + 1;
            }
        }
    }

    /// When the batch's rule-value space is too large to search tractably, harden every rule
    /// whose chunk range is already wider than the page, since such a rule will all but
    /// certainly split anyway.
    fn preempt(&mut self, start: usize, end: usize) {
        if !self.config.preemption() {
            return;
        }

        let mut batch_rules: Vec<RuleId> = Vec::new();
        for chunk in &self.chunks[start..=end] {
            if let Some(rule) = chunk.rule {
                if !self.rules[rule].is_hard() && !batch_rules.contains(&rule) {
                    batch_rules.push(rule);
                }
            }
        }

        let mut product: usize = 1;
        for &rule in &batch_rules {
            product = product.saturating_mul(self.rules[rule].num_values());
        }
        if product < PREEMPTION_THRESHOLD {
            return;
        }
        trace!("Preempt: product={}", product);

        let mut hardened = FxHashSet::default();
        for rule in batch_rules {
            let (rule_start, rule_end) = self.rules.bounds(rule);
            let width: usize = self.chunks[rule_start + 1..=rule_end]
                .iter()
                .map(|c| c.text.len() + c.unsplit_block_length)
                .sum();
            if width > self.config.page_width {
                self.harden_rule(rule, &mut hardened);
            }
        }
    }

    /// Convert every chunk owned by the rule into a hard split governed by a fresh hard rule,
    /// and drag along every rule whose full split this rule's full split forces. The hardened
    /// set cuts constraint cycles.
    fn harden_rule(&mut self, rule: RuleId, hardened: &mut FxHashSet<RuleId>) {
        if !hardened.insert(rule) {
            return;
        }
        trace!("Harden rule: {:?}", rule);

        let hard = self.rules.add(HardSplitRule);
        let (start, end) = self.rules.bounds(rule);
        self.rules.set_bounds(hard, start, end);

        for chunk in &mut self.chunks {
            if chunk.rule == Some(rule) {
                chunk.rule = Some(hard);
                chunk.is_hard_split = true;
            }
        }

        let fully = Binding::Bound(self.rules[rule].fully_split_value());
        let others: Vec<RuleId> = self
            .rules
            .ids()
            .filter(|&other| other != rule && !self.rules[other].is_hard())
            .collect();
        for other in others {
            let forced = self.rules[rule].constrain(fully, other);
            if forced == Some(Binding::Bound(self.rules[other].fully_split_value())) {
                self.harden_rule(other, hardened);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SimpleRule, OVERFLOW_CHAR_COST};

    fn write(config: Config, chunks: Vec<Chunk>, rules: Rules) -> (String, SplitResult) {
        let mut out = String::new();
        let result = LineWriter::new(config, chunks, rules, Vec::new(), 0).write(&mut out);
        (out, result)
    }

    #[test]
    fn statements_cut_into_separate_batches() {
        let mut rules = Rules::new();
        let wrap = rules.add(SimpleRule::new(1));
        let end = rules.add(HardSplitRule);
        let tail = rules.add(SimpleRule::new(1));
        let chunks = vec![
            Chunk::text("p".repeat(30), wrap),
            Chunk::text("q".repeat(30), end).hard(),
            Chunk::text("r".repeat(5), tail),
            Chunk::last("s".repeat(5)),
        ];

        let (out, result) = write(Config::new().with_page_width(40), chunks, rules);
        assert_eq!(
            out,
            format!(
                "{}\n{}\n{}{}",
                "p".repeat(30),
                "q".repeat(30),
                "r".repeat(5),
                "s".repeat(5)
            )
        );
        assert_eq!(result.cost, 1);
    }

    #[test]
    fn no_cut_while_a_rule_spans_the_hard_split() {
        let mut rules = Rules::new();
        let wrap = rules.add(SimpleRule::new(1).without_inner_splits());
        let end = rules.add(HardSplitRule);
        let chunks = vec![
            Chunk::text("a", wrap),
            Chunk::text(";", end).hard(),
            Chunk::text("b", wrap),
            Chunk::last("c"),
        ];

        let (out, _) = write(Config::new().with_page_width(40), chunks, rules);
        assert_eq!(out, "a;\nbc");
    }

    #[test]
    fn hard_split_inside_a_rule_hardens_it() {
        let mut rules = Rules::new();
        let wrap = rules.add(SimpleRule::new(1));
        let end = rules.add(HardSplitRule);
        let chunks = vec![
            Chunk::text("a", wrap),
            Chunk::text(";", end).hard(),
            Chunk::text("b", wrap),
            Chunk::last("c"),
        ];

        let (out, _) = write(Config::new().with_page_width(40), chunks, rules);
        assert_eq!(out, "a\n;\nb\nc");
    }

    #[test]
    fn nesting_depths_flatten_to_ranks() {
        let build = |nesting: usize| {
            let mut rules = Rules::new();
            let wrap = rules.add(SimpleRule::new(1));
            let chunks = vec![
                Chunk::text("a".repeat(30), wrap)
                    .with_indent(2)
                    .with_nesting(nesting),
                Chunk::last("b".repeat(20)),
            ];
            (chunks, rules)
        };

        let (chunks, rules) = build(3);
        let (deep, _) = write(Config::new().with_page_width(40), chunks, rules);
        let (chunks, rules) = build(1);
        let (flat, _) = write(Config::new().with_page_width(40), chunks, rules);

        assert_eq!(deep, flat);
        assert_eq!(deep, format!("{}\n    {}", "a".repeat(30), "b".repeat(20)));
    }

    #[test]
    fn preemption_hardens_oversized_rules() {
        let build = || {
            let mut rules = Rules::new();
            let big = rules.add(SimpleRule::new(1).with_values(4096));
            let chunks = vec![
                Chunk::text("a".repeat(50), big),
                Chunk::text("b".repeat(50), big),
                Chunk::last("c".repeat(20)),
            ];
            (chunks, rules)
        };

        let (chunks, rules) = build();
        let (out, result) = write(Config::new().with_page_width(40), chunks, rules);
        assert_eq!(out.lines().count(), 3);
        // Hardened rules carry no cost of their own; only the overflow remains
        assert_eq!(result.cost, 20 * OVERFLOW_CHAR_COST);

        let (chunks, rules) = build();
        let (full, full_result) = write(
            Config::new().with_page_width(40).with_no_preemption(),
            chunks,
            rules,
        );
        assert_eq!(full, out);
        assert_eq!(full_result.cost, 20 * OVERFLOW_CHAR_COST + 1);
    }

    #[test]
    fn hardening_follows_full_split_constraints() {
        let mut rules = Rules::new();
        let follower = rules.add(SimpleRule::new(1));
        let big = rules.add(
            SimpleRule::new(1)
                .with_values(4096)
                .with_constraint(4095, follower, Binding::Bound(1)),
        );
        let chunks = vec![
            Chunk::text("a".repeat(50), big),
            Chunk::text("b".repeat(50), big),
            Chunk::text("c".repeat(10), follower),
            Chunk::last("d".repeat(10)),
        ];

        let (out, _) = write(Config::new().with_page_width(40), chunks, rules);
        assert_eq!(out.lines().count(), 4);
    }

    #[test]
    fn indent_prefixes_every_batch() {
        let mut rules = Rules::new();
        let end = rules.add(HardSplitRule);
        let chunks = vec![Chunk::text("a;", end).hard(), Chunk::last("b;")];

        let mut out = String::new();
        LineWriter::new(Config::new(), chunks, rules, Vec::new(), 2).write(&mut out);
        assert_eq!(out, "    a;\n    b;");
    }

    #[test]
    fn custom_line_ending() {
        let mut rules = Rules::new();
        let end = rules.add(HardSplitRule);
        let chunks = vec![Chunk::text("a;", end).hard(), Chunk::last("b;")];

        let (out, _) = write(Config::new().with_line_ending("\r\n"), chunks, rules);
        assert_eq!(out, "a;\r\nb;");
    }
}
