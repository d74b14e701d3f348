mod engine;
mod model;
mod writer;

use std::io;

pub use engine::{LineSplitter, SplitResult};
pub use model::*;
pub use writer::LineWriter;

/// Split the given chunk stream and return the rendered text along with the split outcome.
pub fn split_to_string(
    config: Config,
    chunks: Vec<Chunk>,
    rules: Rules,
    spans: Vec<Span>,
    indent: usize,
) -> (String, SplitResult) {
    let mut out = String::new();
    let result = LineWriter::new(config, chunks, rules, spans, indent).write(&mut out);
    (out, result)
}

/// Split the given chunk stream and write the rendered text to the given writer.
pub fn split_to<T: io::Write>(
    writer: &mut T,
    config: Config,
    chunks: Vec<Chunk>,
    rules: Rules,
    spans: Vec<Span>,
    indent: usize,
) -> Result<SplitResult> {
    LineWriter::new(config, chunks, rules, spans, indent).write_to(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use tracing_test::traced_test;

    fn config() -> Config {
        Config::new().with_page_width(40)
    }

    fn run(chunks: Vec<Chunk>, rules: Rules) -> (String, SplitResult) {
        split_to_string(config(), chunks, rules, Vec::new(), 0)
    }

    #[test]
    fn unsplit_when_everything_fits() {
        let mut rules = Rules::new();
        let args = rules.add(SimpleRule::new(1));
        let chunks = vec![
            Chunk::text("a(", args).with_indent(2),
            Chunk::text("b, ", args).with_indent(2),
            Chunk::last("c)"),
        ];

        let (out, result) = run(chunks, rules);
        assert_eq!(out, "a(b, c)");
        assert_eq!(result.cost, 0);
    }

    #[traced_test]
    #[test]
    fn splits_every_argument_when_the_line_overflows() {
        let mut rules = Rules::new();
        let args = rules.add(SimpleRule::new(1));
        let chunks = vec![
            Chunk::text(format!("{}(", "a".repeat(20)), args).with_indent(2),
            Chunk::text(format!("{},", "b".repeat(20)), args).with_indent(2),
            Chunk::last(format!("{})", "c".repeat(20))),
        ];

        let (out, result) = run(chunks, rules);
        assert_eq!(
            out,
            indoc! {"
                aaaaaaaaaaaaaaaaaaaa(
                  bbbbbbbbbbbbbbbbbbbb,
                  cccccccccccccccccccc)"
            }
        );
        assert_eq!(result.cost, 1);
    }

    #[test]
    fn double_split_leaves_a_blank_line_between_statements() {
        let mut rules = Rules::new();
        let end = rules.add(HardSplitRule);
        let chunks = vec![Chunk::text("a;", end).hard().double(), Chunk::last("b;")];

        let (out, result) = run(chunks, rules);
        assert_eq!(out, "a;\n\nb;");
        assert_eq!(result.cost, 0);
    }

    #[test]
    fn block_inlined_when_it_fits() {
        let mut rules = Rules::new();
        let list = rules.add(SimpleRule::new(1));
        let items = rules.add(SimpleRule::new(1));
        let block = vec![
            Chunk::text("1,", items).space_when_unsplit().with_indent(2),
            Chunk::last("2"),
        ];
        let chunks = vec![Chunk::text("[", list).with_block(block), Chunk::last("]")];

        let (out, result) = run(chunks, rules);
        assert_eq!(out, "[1, 2]");
        assert_eq!(result.cost, 0);
    }

    #[test]
    fn block_split_runs_the_sub_splitter() {
        let mut rules = Rules::new();
        let list = rules.add(SimpleRule::new(1));
        let items = rules.add(SimpleRule::new(1));
        let block = vec![
            Chunk::text("aaaa,", items).space_when_unsplit().with_indent(2),
            Chunk::last("bbbb"),
        ];
        let chunks = vec![Chunk::text("[", list).with_block(block), Chunk::last("]")];

        let (out, result) =
            split_to_string(Config::new().with_page_width(10), chunks, rules, Vec::new(), 0);
        assert_eq!(
            out,
            indoc! {"
                [
                  aaaa,
                  bbbb
                ]"
            }
        );
        // The outer rule and the block's inner rule each charge once
        assert_eq!(result.cost, 2);
    }

    #[test]
    fn forward_constraint_binds_the_second_rule() {
        let mut rules = Rules::new();
        let inner = rules.add(SimpleRule::new(5));
        let outer = rules.add(SimpleRule::new(1).with_constraint(1, inner, Binding::Bound(1)));
        let chunks = vec![
            Chunk::text("x".repeat(30), outer),
            Chunk::text("y".repeat(30), inner),
            Chunk::last("zzzzz"),
        ];

        let (out, result) = run(chunks, rules);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "x".repeat(30));
        assert_eq!(lines[1], "y".repeat(30));
        assert_eq!(lines[2], "zzzzz");
        assert_eq!(result.cost, 6);
    }

    #[test]
    fn reverse_constraint_binds_the_second_rule() {
        let mut rules = Rules::new();
        let outer = rules.add(SimpleRule::new(1));
        let inner =
            rules.add(SimpleRule::new(5).with_reverse_constraint(1, outer, Binding::Bound(1)));
        let chunks = vec![
            Chunk::text("x".repeat(30), outer),
            Chunk::text("y".repeat(30), inner),
            Chunk::last("zzzzz"),
        ];

        let (out, result) = run(chunks, rules);
        assert_eq!(out.lines().count(), 3);
        assert_eq!(result.cost, 6);
    }

    #[test]
    fn must_split_constraint_leaves_the_value_free() {
        let mut rules = Rules::new();
        let inner = rules.add(SimpleRule::new(0).with_values(3));
        let outer = rules.add(SimpleRule::new(0).with_constraint(1, inner, Binding::MustSplitAny));
        let chunks = vec![
            Chunk::text("x".repeat(30), outer),
            Chunk::text("y".repeat(30), inner),
            Chunk::last("zzzzz"),
        ];

        let (out, _) = run(chunks, rules);
        assert_eq!(out.lines().count(), 3);
    }

    #[test]
    fn span_cost_charges_once_per_solution() {
        let mut rules = Rules::new();
        let wrap = rules.add(SimpleRule::new(1));
        let spans = vec![Span::new(7)];
        let chunks = vec![
            Chunk::text("x".repeat(30), wrap).with_spans(vec![0]),
            Chunk::text("y".repeat(30), wrap).with_spans(vec![0]),
            Chunk::last("zzzzz"),
        ];

        let (out, result) = split_to_string(config(), chunks, rules, spans, 0);
        assert_eq!(out.lines().count(), 3);
        // Both split chunks are covered by the same span; it still charges once
        assert_eq!(result.cost, 1 + 7);
    }

    #[test]
    fn identical_inputs_render_identically() {
        let build = || {
            let mut rules = Rules::new();
            let args = rules.add(SimpleRule::new(1));
            let chunks = vec![
                Chunk::text(format!("{}(", "f".repeat(18)), args).with_indent(2),
                Chunk::text("alpha, ", args).with_indent(2),
                Chunk::text("beta, ", args).with_indent(2),
                Chunk::last("gamma)"),
            ];
            (chunks, rules)
        };

        let (chunks, rules) = build();
        let (first, first_result) = run(chunks, rules);
        let (chunks, rules) = build();
        let (second, second_result) = run(chunks, rules);

        assert_eq!(first, second);
        assert_eq!(first_result.cost, second_result.cost);
    }

    #[test]
    fn safe_cut_points_split_into_independent_batches() {
        let mut rules = Rules::new();
        let wrap = rules.add(SimpleRule::new(1));
        let end = rules.add(HardSplitRule);
        let tail = rules.add(SimpleRule::new(1));
        let chunks = vec![
            Chunk::text("p".repeat(30), wrap),
            Chunk::text("q".repeat(30), end).hard(),
            Chunk::text("r".repeat(30), tail),
            Chunk::last("s".repeat(30)),
        ];
        let (full, _) = run(chunks, rules);

        let mut rules = Rules::new();
        let wrap = rules.add(SimpleRule::new(1));
        let first = vec![
            Chunk::text("p".repeat(30), wrap),
            Chunk::last("q".repeat(30)),
        ];
        let (head, _) = run(first, rules);

        let mut rules = Rules::new();
        let tail = rules.add(SimpleRule::new(1));
        let second = vec![
            Chunk::text("r".repeat(30), tail),
            Chunk::last("s".repeat(30)),
        ];
        let (rest, _) = run(second, rules);

        assert_eq!(full, format!("{}\n{}", head, rest));
    }

    #[test]
    fn selection_offsets_are_absolute_in_the_buffer() {
        let mut rules = Rules::new();
        let glue = rules.add(SimpleRule::new(1));
        let chunks = vec![
            Chunk::text("hello ", glue).with_selection(Some(2), None),
            Chunk::last("world").with_selection(None, Some(3)),
        ];

        let (out, result) = split_to_string(config(), chunks, rules, Vec::new(), 1);
        assert_eq!(out, "  hello world");
        assert_eq!(result.selection_start, Some(4));
        assert_eq!(result.selection_end, Some(11));
    }

    #[test]
    fn selection_offsets_survive_block_indentation() {
        let mut rules = Rules::new();
        let list = rules.add(SimpleRule::new(1));
        let items = rules.add(SimpleRule::new(1));
        let block = vec![
            Chunk::text("aaaa,", items)
                .space_when_unsplit()
                .with_indent(2)
                .with_selection(Some(1), None),
            Chunk::last("bbbb"),
        ];
        let chunks = vec![Chunk::text("[", list).with_block(block), Chunk::last("]")];

        let (out, result) =
            split_to_string(Config::new().with_page_width(10), chunks, rules, Vec::new(), 0);
        // The selected character is the second 'a' of the indented first block line
        assert_eq!(&out[result.selection_start.unwrap()..][..1], "a");
        assert_eq!(result.selection_start, Some(5));
    }

    #[test]
    fn split_to_writes_through_io() {
        let mut rules = Rules::new();
        let glue = rules.add(SimpleRule::new(1));
        let chunks = vec![Chunk::text("a", glue), Chunk::last("b")];

        let mut buf: Vec<u8> = Vec::new();
        let result = split_to(&mut buf, Config::new(), chunks, rules, Vec::new(), 0).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "ab");
        assert_eq!(result.cost, 0);
    }
}
