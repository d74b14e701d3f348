use crate::model::SPACES_PER_INDENT;

/// NestingStack tracks which expression nesting depths have been assigned their own indentation
/// column on the current line. Depths are strictly increasing from outermost to innermost and a
/// depth of zero is never stored; it denotes "outside any expression".
///
/// When a line splits inside nested expressions, each enclosing nesting level between the
/// stack's top and the split's depth may or may not claim an indentation column of its own. The
/// splitter explores every combination and keeps whichever leads to the cheapest solution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct NestingStack {
    depths: Vec<usize>,
}

impl NestingStack {
    /// Total indentation contributed by the nesting levels on the stack.
    pub(crate) fn indent(&self) -> usize {
        self.depths.len() * SPACES_PER_INDENT
    }

    /// Enumerate the stacks the following line may begin with, given a split at a chunk whose
    /// nesting depth is `nesting`. Depths deeper than the split are discarded since those
    /// expressions have ended. Intermediate depths between the remaining top and the split's
    /// depth may each independently claim a column, so one stack is produced per combination.
    pub(crate) fn apply_split(&self, nesting: usize) -> Vec<NestingStack> {
        let base: Vec<usize> = self
            .depths
            .iter()
            .copied()
            .take_while(|&d| d <= nesting)
            .collect();
        let top = base.last().copied().unwrap_or(0);

        // Already tracking this depth, or the split is at the top level
        if top == nesting || nesting == 0 {
            return vec![NestingStack { depths: base }];
        }

        let intermediates: Vec<usize> = (top + 1..nesting).collect();
        let mut stacks = Vec::with_capacity(1 << intermediates.len());
        for mask in 0u32..(1 << intermediates.len()) {
            let mut depths = base.clone();
            for (bit, &depth) in intermediates.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    depths.push(depth);
                }
            }
            depths.push(nesting);
            stacks.push(NestingStack { depths });
        }
        stacks
    }
}
