use log::debug;
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};
use crate::probability::{Category, ProbabilityTable};

/// Maximum distance from 1 tolerated for the probability sum.
pub const SUM_TOLERANCE: f64 = 1e-6;

/// The slice `[lower, upper]` of the raw-value range assigned to one
/// category. A category whose probability floors to nothing gets an empty
/// slot (`upper() == None`) that still holds its place in the table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntervalEntry {
    pub category: Category,
    lower: u64,
    end: u64,
}

impl IntervalEntry {
    pub fn lower(&self) -> u64 {
        self.lower
    }

    /// Inclusive upper bound, `None` for an empty slot.
    pub fn upper(&self) -> Option<u64> {
        self.end.checked_sub(1).filter(|&u| u >= self.lower)
    }

    /// Number of raw values mapped to this category (`upper - lower + 1`).
    pub fn len(&self) -> u64 {
        self.end - self.lower
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.lower
    }

    pub fn contains(&self, raw: u64) -> bool {
        self.lower <= raw && raw < self.end
    }
}

#[derive(Serialize)]
struct IntervalRow<'a> {
    category: &'a Category,
    lower: u64,
    upper: Option<u64>,
    width: u64,
}

impl Serialize for IntervalEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        IntervalRow {
            category: &self.category,
            lower: self.lower,
            upper: self.upper(),
            width: self.len(),
        }
        .serialize(serializer)
    }
}

/// Contiguous partition of `[0, scale)` for inverse-transform sampling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IntervalTable {
    scale: u64,
    entries: Vec<IntervalEntry>,
}

impl IntervalTable {
    /// Walks the categories in table order with a running cumulative
    /// probability `cum`: `lower = floor(cum * scale)`, then
    /// `upper = floor((cum + p) * scale) - 1`. The final category's upper
    /// bound is forced to `scale - 1` so rounding can never leave a gap.
    pub fn build(probabilities: &ProbabilityTable, scale: u64) -> Result<Self> {
        if scale == 0 {
            return Err(Error::invalid_input("interval scale must be greater than 0"));
        }
        if probabilities.is_empty() {
            return Err(Error::invalid_input(
                "cannot build intervals from an empty probability table",
            ));
        }
        let sum = probabilities.sum();
        if !((sum - 1.0).abs() <= SUM_TOLERANCE) {
            return Err(Error::invalid_input(format!(
                "probabilities sum to {}, expected 1 within {}",
                sum, SUM_TOLERANCE
            )));
        }

        let bound = |cum: f64| -> u64 {
            let scaled = libm::floor(cum * scale as f64);
            if scaled <= 0.0 {
                0
            } else if scaled >= scale as f64 {
                scale
            } else {
                scaled as u64
            }
        };

        let last = probabilities.len() - 1;
        let mut cum = 0.0;
        let mut entries = Vec::with_capacity(probabilities.len());
        for (i, entry) in probabilities.entries().iter().enumerate() {
            let lower = bound(cum);
            cum += entry.probability;
            let end = if i == last { scale } else { bound(cum) };
            entries.push(IntervalEntry {
                category: entry.category.clone(),
                lower,
                end: end.max(lower),
            });
        }

        debug!(
            "built {} intervals over [0, {})",
            entries.len(),
            scale
        );
        Ok(IntervalTable { scale, entries })
    }

    /// Table with hand-picked `[lower, end)` slots, gaps allowed.
    #[cfg(test)]
    pub(crate) fn from_bounds(scale: u64, slots: &[(&str, u64, u64)]) -> Self {
        IntervalTable {
            scale,
            entries: slots
                .iter()
                .map(|&(name, lower, end)| IntervalEntry {
                    category: Category::from(name),
                    lower,
                    end,
                })
                .collect(),
        }
    }

    pub fn scale(&self) -> u64 {
        self.scale
    }

    pub fn entries(&self) -> &[IntervalEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, category: &Category) -> Option<&IntervalEntry> {
        self.entries.iter().find(|e| &e.category == category)
    }

    /// The entry whose slot contains `raw`, or `None` when `raw >= scale`.
    ///
    /// Slot ends are non-decreasing, so the first entry ending after `raw`
    /// is the one containing it; empty slots are skipped automatically.
    pub fn lookup(&self, raw: u64) -> Option<&IntervalEntry> {
        let i = self.entries.partition_point(|e| e.end <= raw);
        self.entries.get(i).filter(|e| e.contains(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probability::Histogram;

    fn three_to_one() -> IntervalTable {
        let histogram = Histogram::from_counts(vec![("A", 3), ("B", 1)]).unwrap();
        let probabilities = ProbabilityTable::build(&histogram).unwrap();
        IntervalTable::build(&probabilities, 100).unwrap()
    }

    #[test]
    fn test_three_to_one_bounds() {
        let table = three_to_one();
        let a = table.get(&"A".into()).unwrap();
        let b = table.get(&"B".into()).unwrap();
        assert_eq!((a.lower(), a.upper()), (0, Some(74)));
        assert_eq!((b.lower(), b.upper()), (75, Some(99)));
    }

    #[test]
    fn test_lookup() {
        let table = three_to_one();
        assert_eq!(table.lookup(6).unwrap().category, Category::from("A"));
        assert_eq!(table.lookup(74).unwrap().category, Category::from("A"));
        assert_eq!(table.lookup(75).unwrap().category, Category::from("B"));
        assert_eq!(table.lookup(99).unwrap().category, Category::from("B"));
        assert!(table.lookup(100).is_none());
    }

    #[test]
    fn test_empty_slot_keeps_position() {
        let probabilities =
            ProbabilityTable::from_probabilities(vec![("A", 0.5), ("B", 0.0), ("C", 0.5)]).unwrap();
        let table = IntervalTable::build(&probabilities, 10).unwrap();
        let b = table.get(&"B".into()).unwrap();
        assert!(b.is_empty());
        assert_eq!(b.upper(), None);
        assert_eq!(b.lower(), 5);
        assert_eq!(table.lookup(5).unwrap().category, Category::from("C"));
        assert_eq!(table.lookup(4).unwrap().category, Category::from("A"));
    }

    #[test]
    fn test_leading_empty_slot() {
        let probabilities =
            ProbabilityTable::from_probabilities(vec![("A", 0.0), ("B", 1.0)]).unwrap();
        let table = IntervalTable::build(&probabilities, 100).unwrap();
        assert_eq!(table.get(&"A".into()).unwrap().upper(), None);
        assert_eq!(table.lookup(0).unwrap().category, Category::from("B"));
    }

    #[test]
    fn test_rounding_absorbed_by_last() {
        let probabilities = ProbabilityTable::from_probabilities(vec![
            ("A", 1.0 / 3.0),
            ("B", 1.0 / 3.0),
            ("C", 1.0 / 3.0),
        ])
        .unwrap();
        let table = IntervalTable::build(&probabilities, 100).unwrap();
        let widths: Vec<u64> = table.entries().iter().map(|e| e.len()).collect();
        assert_eq!(widths.iter().sum::<u64>(), 100);
        assert_eq!(table.entries()[2].upper(), Some(99));
    }

    #[test]
    fn test_rejects_bad_sum_and_scale() {
        let short = ProbabilityTable::from_probabilities(vec![("A", 0.5), ("B", 0.4)]).unwrap();
        assert!(matches!(
            IntervalTable::build(&short, 100),
            Err(Error::InvalidInput(_))
        ));
        let fine = ProbabilityTable::from_probabilities(vec![("A", 1.0)]).unwrap();
        assert!(IntervalTable::build(&fine, 0).is_err());
        let empty = ProbabilityTable::from_probabilities(Vec::<(&str, f64)>::new()).unwrap();
        assert!(IntervalTable::build(&empty, 100).is_err());
    }

    #[test]
    fn test_rebuild_is_identical() {
        let histogram = Histogram::from_counts(vec![("A", 7), ("B", 11), ("C", 13)]).unwrap();
        let probabilities = ProbabilityTable::build(&histogram).unwrap();
        let first = IntervalTable::build(&probabilities, 1000).unwrap();
        let second = IntervalTable::build(&probabilities, 1000).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_serialized_row() {
        let table = three_to_one();
        let json = serde_json::to_value(&table.entries()[1]).unwrap();
        assert_eq!(json["category"], "B");
        assert_eq!(json["lower"], 75);
        assert_eq!(json["upper"], 99);
        assert_eq!(json["width"], 25);
    }
}
