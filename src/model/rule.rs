use std::fmt;
use std::ops::Index;

use crate::model::Chunk;

/// A rule value. Value zero always means "do not split".
pub type Value = usize;

/// The value bound to a rule within a line prefix. Absence from the prefix means the rule is
/// still unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Binding {
    /// The rule is pinned to a specific value.
    Bound(Value),

    /// The rule must split but the exact non-zero value has not been chosen yet. The search
    /// tries every non-zero value when it reaches a chunk owned by the rule.
    MustSplitAny,
}

/// Identifies a rule in the [`Rules`] arena. Rules are shared by reference across chunks and
/// the id provides the equality and hashing used to key rule-value maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub(crate) usize);

/// A rule is a shared decision variable governing a family of chunks. Assigning one of its
/// `num_values` integer values decides, per owned chunk, whether that chunk splits.
pub trait Rule: fmt::Debug {
    /// Number of legal values, at least 1. Value 0 means no split.
    fn num_values(&self) -> usize;

    /// Cost charged once per solution when any chunk owned by this rule splits.
    fn cost(&self) -> usize;

    /// Does assigning `value` cause `chunk` to end its line?
    fn is_split(&self, value: Value, chunk: &Chunk) -> bool;

    /// Given that this rule holds `value`, the binding forced onto `other`, if any.
    fn constrain(&self, _value: Binding, _other: RuleId) -> Option<Binding> {
        None
    }

    /// Given that `other` holds `value`, the binding forced onto this rule, if any.
    fn reverse_constrain(&self, _value: Binding, _other: RuleId) -> Option<Binding> {
        None
    }

    /// Whether a hard split inside this rule's chunk range forces this rule to split too.
    fn splits_on_inner_rules(&self) -> bool {
        true
    }

    /// The value representing "split at every owned chunk".
    fn fully_split_value(&self) -> Value;

    /// True only for [`HardSplitRule`].
    fn is_hard(&self) -> bool {
        false
    }
}

/// A rule that always splits. Chunks carrying a hard rule are unconditional line breaks and are
/// excluded from the search's value enumeration by having a single value.
#[derive(Debug, Clone, Copy, Default)]
pub struct HardSplitRule;

impl Rule for HardSplitRule {
    fn num_values(&self) -> usize {
        1
    }

    fn cost(&self) -> usize {
        0
    }

    fn is_split(&self, _value: Value, _chunk: &Chunk) -> bool {
        true
    }

    fn splits_on_inner_rules(&self) -> bool {
        false
    }

    fn fully_split_value(&self) -> Value {
        0
    }

    fn is_hard(&self) -> bool {
        true
    }
}

/// A rule where any non-zero value splits every chunk it owns. Constraints on other rules are
/// declared as triples at construction time; the common case is an outer rule forcing an inner
/// rule to follow its split decision.
#[derive(Debug)]
pub struct SimpleRule {
    num_values: usize,
    cost: usize,
    splits_on_inner: bool,

    // (my value, other rule, binding forced onto the other rule)
    constraints: Vec<(Value, RuleId, Binding)>,

    // (other rule's value, other rule, binding forced onto me)
    reverse_constraints: Vec<(Value, RuleId, Binding)>,
}

impl SimpleRule {
    pub fn new(cost: usize) -> Self {
        Self {
            num_values: 2,
            cost,
            splits_on_inner: true,
            constraints: Vec::new(),
            reverse_constraints: Vec::new(),
        }
    }

    /// Set the number of legal values
    pub fn with_values(mut self, num_values: usize) -> Self {
        assert!(num_values >= 1, "a rule needs at least one value");
        self.num_values = num_values;
        self
    }

    /// When this rule holds `value`, force `binding` onto `other`
    pub fn with_constraint(mut self, value: Value, other: RuleId, binding: Binding) -> Self {
        self.constraints.push((value, other, binding));
        self
    }

    /// When `other` holds `value`, force `binding` onto this rule
    pub fn with_reverse_constraint(
        mut self,
        value: Value,
        other: RuleId,
        binding: Binding,
    ) -> Self {
        self.reverse_constraints.push((value, other, binding));
        self
    }

    /// Opt out of splitting when a hard split lands inside this rule's range
    pub fn without_inner_splits(mut self) -> Self {
        self.splits_on_inner = false;
        self
    }
}

impl Rule for SimpleRule {
    fn num_values(&self) -> usize {
        self.num_values
    }

    fn cost(&self) -> usize {
        self.cost
    }

    fn is_split(&self, value: Value, _chunk: &Chunk) -> bool {
        value != 0
    }

    fn constrain(&self, value: Binding, other: RuleId) -> Option<Binding> {
        let Binding::Bound(value) = value else {
            return None;
        };
        self.constraints
            .iter()
            .find(|(v, id, _)| *v == value && *id == other)
            .map(|(_, _, binding)| *binding)
    }

    fn reverse_constrain(&self, value: Binding, other: RuleId) -> Option<Binding> {
        let Binding::Bound(value) = value else {
            return None;
        };
        self.reverse_constraints
            .iter()
            .find(|(v, id, _)| *v == value && *id == other)
            .map(|(_, _, binding)| *binding)
    }

    fn splits_on_inner_rules(&self) -> bool {
        self.splits_on_inner
    }

    fn fully_split_value(&self) -> Value {
        self.num_values - 1
    }
}

/// Arena of the rules referenced by a chunk stream. Chunks hold [`RuleId`]s; the trait objects
/// stay immutable once splitting begins while the `start`/`end` bookkeeping beside them is set
/// by the batch facade beforehand.
#[derive(Debug, Default)]
pub struct Rules {
    entries: Vec<RuleEntry>,
}

#[derive(Debug)]
struct RuleEntry {
    rule: Box<dyn Rule>,

    // First and last chunk index owned by this rule, facade bookkeeping only
    start: usize,
    end: usize,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the given rule to the arena and return its id.
    pub fn add<R: Rule + 'static>(&mut self, rule: R) -> RuleId {
        let id = RuleId(self.entries.len());
        self.entries.push(RuleEntry {
            rule: Box::new(rule),
            start: 0,
            end: 0,
        });
        id
    }

    /// Iterate over every rule id in the arena.
    pub fn ids(&self) -> impl Iterator<Item = RuleId> {
        (0..self.entries.len()).map(RuleId)
    }

    /// The chunk index range `[start, end]` owned by the rule.
    pub(crate) fn bounds(&self, id: RuleId) -> (usize, usize) {
        let entry = &self.entries[id.0];
        (entry.start, entry.end)
    }

    pub(crate) fn set_bounds(&mut self, id: RuleId, start: usize, end: usize) {
        let entry = &mut self.entries[id.0];
        entry.start = start;
        entry.end = end;
    }
}

impl Index<RuleId> for Rules {
    type Output = dyn Rule;

    fn index(&self, id: RuleId) -> &Self::Output {
        self.entries[id.0].rule.as_ref()
    }
}
