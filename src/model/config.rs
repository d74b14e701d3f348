/// Number of spaces written per level of indentation.
pub const SPACES_PER_INDENT: usize = 2;

/// Cost charged per character that a line runs past the page width. Large enough to dominate any
/// practical sum of rule and span costs, so a solution that fits always beats one that does not
/// while overflowing solutions stay comparable to each other.
pub const OVERFLOW_CHAR_COST: usize = 10_000;

/// Preemption kicks in once the product of rule value counts in a batch reaches this threshold.
pub(crate) const PREEMPTION_THRESHOLD: usize = 4096;

#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) page_width: usize,      // Target line width before overflow cost accrues
    pub(crate) line_ending: String,    // Written between lines, e.g. "\n"

    /// Enable or disable features
    preemption: bool,
}

/// Default implementation
impl Default for Config {
    fn default() -> Self {
        Self {
            page_width: 80,
            line_ending: "\n".to_string(),
            preemption: true,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page width
    pub fn with_page_width(mut self, width: usize) -> Self {
        self.page_width = width;
        self
    }

    /// Set the line ending
    pub fn with_line_ending<T: Into<String>>(mut self, ending: T) -> Self {
        self.line_ending = ending.into();
        self
    }

    /// Disable rule preemption. Preemption bounds the search on pathological input but can settle
    /// for a worse rendering than the full search would find.
    pub fn with_no_preemption(mut self) -> Self {
        self.preemption = false;
        self
    }

    /// Return true if preemption is enabled
    pub fn preemption(&self) -> bool {
        self.preemption
    }
}
