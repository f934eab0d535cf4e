use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tolerance used when checking that probabilities are non-negative or at
/// most one after floating-point division.
const PROBABILITY_SLACK: f64 = 1e-12;

/// A named outcome of the simulation, e.g. a region such as "Kuningan".
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Category(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(name: &str) -> Self {
        Category::new(name)
    }
}

impl From<String> for Category {
    fn from(name: String) -> Self {
        Category(name)
    }
}

pub(crate) fn check_unique(categories: &[Category]) -> Result<()> {
    for (i, category) in categories.iter().enumerate() {
        if category.name().trim().is_empty() {
            return Err(Error::invalid_input("category names must not be empty"));
        }
        if categories[..i].contains(category) {
            return Err(Error::invalid_input(format!(
                "duplicate category '{}'",
                category
            )));
        }
    }
    Ok(())
}

/// Frequency counts per category, in declared order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Histogram {
    categories: Vec<Category>,
    counts: Vec<u64>,
}

impl Histogram {
    /// Empty histogram over the given categories. The order given here is
    /// the order every derived table uses.
    pub fn new(categories: Vec<Category>) -> Result<Self> {
        check_unique(&categories)?;
        let counts = vec![0; categories.len()];
        Ok(Histogram { categories, counts })
    }

    pub fn from_counts<C, I>(counts: I) -> Result<Self>
    where
        C: Into<Category>,
        I: IntoIterator<Item = (C, u64)>,
    {
        let (categories, counts): (Vec<Category>, Vec<u64>) =
            counts.into_iter().map(|(c, n)| (c.into(), n)).unzip();
        check_unique(&categories)?;
        Ok(Histogram { categories, counts })
    }

    pub fn add(&mut self, category: &Category, count: u64) -> Result<()> {
        let slot = self
            .categories
            .iter()
            .position(|c| c == category)
            .ok_or_else(|| Error::invalid_input(format!("unknown category '{}'", category)))?;
        self.counts[slot] = self.counts[slot].saturating_add(count);
        Ok(())
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn count(&self, category: &Category) -> Option<u64> {
        self.categories
            .iter()
            .position(|c| c == category)
            .map(|i| self.counts[i])
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().fold(0u64, |acc, &n| acc.saturating_add(n))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Category, u64)> + '_ {
        self.categories.iter().zip(self.counts.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProbabilityEntry {
    pub category: Category,
    pub count: u64,
    pub probability: f64,
    pub cumulative: f64,
}

/// Empirical probability per category, in declared order.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProbabilityTable {
    entries: Vec<ProbabilityEntry>,
}

impl ProbabilityTable {
    /// `probability[c] = count[c] / total`. Categories with a zero count stay
    /// in the table with probability 0 so that every category keeps a slot.
    pub fn build(histogram: &Histogram) -> Result<Self> {
        let total = histogram.total();
        if total == 0 {
            return Err(Error::invalid_input(
                "histogram total is 0; cannot derive probabilities",
            ));
        }
        let mut cumulative = 0.0;
        let entries = histogram
            .iter()
            .map(|(category, count)| {
                let probability = count as f64 / total as f64;
                cumulative += probability;
                ProbabilityEntry {
                    category: category.clone(),
                    count,
                    probability,
                    cumulative,
                }
            })
            .collect();
        let table = ProbabilityTable { entries };
        debug!(
            "built probability table over {} categories from {} observations",
            table.len(),
            total
        );
        Ok(table)
    }

    /// A table from probabilities computed elsewhere. Values must be finite
    /// and within `[0, 1]`; whether they sum to 1 is checked by the interval
    /// builder.
    pub fn from_probabilities<C, I>(probabilities: I) -> Result<Self>
    where
        C: Into<Category>,
        I: IntoIterator<Item = (C, f64)>,
    {
        let mut cumulative = 0.0;
        let mut entries = Vec::new();
        for (category, probability) in probabilities {
            let category = category.into();
            if !probability.is_finite()
                || probability < -PROBABILITY_SLACK
                || probability > 1.0 + PROBABILITY_SLACK
            {
                return Err(Error::invalid_input(format!(
                    "probability {} for '{}' is outside [0, 1]",
                    probability, category
                )));
            }
            let probability = probability.clamp(0.0, 1.0);
            cumulative += probability;
            entries.push(ProbabilityEntry {
                category,
                count: 0,
                probability,
                cumulative,
            });
        }
        let categories: Vec<Category> = entries.iter().map(|e| e.category.clone()).collect();
        check_unique(&categories)?;
        Ok(ProbabilityTable { entries })
    }

    pub fn entries(&self) -> &[ProbabilityEntry] {
        &self.entries
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> + '_ {
        self.entries.iter().map(|e| &e.category)
    }

    pub fn probability(&self, category: &Category) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| &e.category == category)
            .map(|e| e.probability)
    }

    pub fn sum(&self) -> f64 {
        self.entries.iter().map(|e| e.probability).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
