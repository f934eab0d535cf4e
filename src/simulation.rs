use std::iter::FusedIterator;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::interval::IntervalTable;
use crate::probability::{Category, ProbabilityTable};
use crate::rng::{Lcg, LcgParams};

/// One simulated event: the `index`-th draw (0-based), the simulated period
/// it falls in, the raw generator output and the category it maps to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Draw {
    pub index: u64,
    pub period: u64,
    pub raw: u64,
    pub category: Category,
}

/// Settings for turning generator output into draws.
#[derive(Clone, Copy, Debug)]
pub struct Simulation<'a> {
    intervals: &'a IntervalTable,
    period_length: Option<u64>,
}

impl<'a> Simulation<'a> {
    pub fn new(intervals: &'a IntervalTable) -> Self {
        Simulation {
            intervals,
            period_length: None,
        }
    }

    /// Groups every `draws` consecutive draws into one simulated period.
    /// Without this the whole run is a single period.
    pub fn with_period_length(mut self, draws: u64) -> Self {
        self.period_length = Some(draws);
        self
    }

    /// Starts a run of `n_draws` draws taken from `lcg`.
    ///
    /// The returned iterator holds the generator for its whole lifetime and
    /// can only be consumed once; running again continues the generator where
    /// this run left it, so independent runs need their own seeded `Lcg`.
    pub fn run<'g>(&self, lcg: &'g mut Lcg, n_draws: u64) -> Result<Draws<'g>>
    where
        'a: 'g,
    {
        let period_length = match self.period_length {
            Some(0) => {
                return Err(Error::configuration("period length must be greater than 0"))
            }
            Some(k) => k,
            None => n_draws.max(1),
        };
        if lcg.modulus() > self.intervals.scale() {
            return Err(Error::configuration(format!(
                "LCG modulus {} exceeds interval scale {}; values in [{}, {}) map to no category",
                lcg.modulus(),
                self.intervals.scale(),
                self.intervals.scale(),
                lcg.modulus()
            )));
        }
        info!(
            "Simulating {} draws in periods of {} with {:?}",
            n_draws, period_length, lcg
        );
        Ok(Draws {
            lcg,
            intervals: self.intervals,
            period_length,
            next_index: 0,
            n_draws,
            done: false,
        })
    }
}

/// Shorthand for `Simulation::new(intervals).run(lcg, n_draws)`.
pub fn run<'g>(lcg: &'g mut Lcg, intervals: &'g IntervalTable, n_draws: u64) -> Result<Draws<'g>> {
    Simulation::new(intervals).run(lcg, n_draws)
}

/// Lazy, finite sequence of draws. Yields `Err` at most once, after which it
/// is exhausted.
pub struct Draws<'g> {
    lcg: &'g mut Lcg,
    intervals: &'g IntervalTable,
    period_length: u64,
    next_index: u64,
    n_draws: u64,
    done: bool,
}

impl<'g> Iterator for Draws<'g> {
    type Item = Result<Draw>;

    fn next(&mut self) -> Option<Result<Draw>> {
        if self.done || self.next_index >= self.n_draws {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;
        let raw = self.lcg.next_value();
        match self.intervals.lookup(raw) {
            Some(entry) => Some(Ok(Draw {
                index,
                period: index / self.period_length,
                raw,
                category: entry.category.clone(),
            })),
            None => {
                self.done = true;
                Some(Err(Error::logic(format!(
                    "draw {} produced {} which lies in no interval of [0, {})",
                    index,
                    raw,
                    self.intervals.scale()
                ))))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        let left = (self.n_draws - self.next_index) as usize;
        (0, Some(left))
    }
}

impl<'g> FusedIterator for Draws<'g> {}

/// A completed run. Built once from `Draws` and never modified.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SimulationRun {
    draws: Vec<Draw>,
}

impl SimulationRun {
    pub fn draws(&self) -> &[Draw] {
        &self.draws
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    pub fn raw_values(&self) -> impl Iterator<Item = u64> + '_ {
        self.draws.iter().map(|d| d.raw)
    }
}

impl FromIterator<Draw> for SimulationRun {
    fn from_iter<I: IntoIterator<Item = Draw>>(iter: I) -> Self {
        SimulationRun {
            draws: iter.into_iter().collect(),
        }
    }
}

impl<'r> IntoIterator for &'r SimulationRun {
    type Item = &'r Draw;
    type IntoIter = std::slice::Iter<'r, Draw>;

    fn into_iter(self) -> Self::IntoIter {
        self.draws.iter()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TallyRow {
    pub period: u64,
    pub category: Category,
    pub count: u64,
}

/// Simulated counts per period and category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tally {
    categories: Vec<Category>,
    /// `counts[period][category]`
    counts: Vec<Vec<u64>>,
}

impl Tally {
    /// Aggregates `run` over `categories` (usually the interval table's
    /// order). Periods without draws are kept with zero counts.
    ///
    /// A period index is never larger than its draw's position in the run,
    /// which holds for every run produced by `Draws`.
    pub fn from_run(run: &SimulationRun, categories: &[Category]) -> Result<Self> {
        if let Some(draw) = run.draws().iter().find(|d| d.period >= run.len() as u64) {
            return Err(Error::invalid_input(format!(
                "draw {} has period {} beyond the {} draws of the run",
                draw.index,
                draw.period,
                run.len()
            )));
        }
        let periods = run.draws().iter().map(|d| d.period + 1).max().unwrap_or(0);
        let mut counts = vec![vec![0u64; categories.len()]; periods as usize];
        for draw in run {
            let slot = categories
                .iter()
                .position(|c| c == &draw.category)
                .ok_or_else(|| {
                    Error::invalid_input(format!(
                        "draw {} has category '{}' outside the tally",
                        draw.index, draw.category
                    ))
                })?;
            counts[draw.period as usize][slot] += 1;
        }
        Ok(Tally {
            categories: categories.to_vec(),
            counts,
        })
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn periods(&self) -> usize {
        self.counts.len()
    }

    pub fn count(&self, period: usize, category: &Category) -> Option<u64> {
        let slot = self.categories.iter().position(|c| c == category)?;
        self.counts.get(period).map(|row| row[slot])
    }

    /// Count per category summed over every period.
    pub fn totals(&self) -> Vec<u64> {
        let mut totals = vec![0u64; self.categories.len()];
        for row in &self.counts {
            for (total, n) in totals.iter_mut().zip(row) {
                *total += n;
            }
        }
        totals
    }

    pub fn draws(&self) -> u64 {
        self.totals().iter().sum()
    }

    /// Fraction of all draws per category; zeros for an empty tally.
    pub fn shares(&self) -> Vec<f64> {
        let draws = self.draws();
        self.totals()
            .into_iter()
            .map(|n| if draws == 0 { 0.0 } else { n as f64 / draws as f64 })
            .collect()
    }

    /// Long format, period-major.
    pub fn rows(&self) -> Vec<TallyRow> {
        self.counts
            .iter()
            .enumerate()
            .flat_map(|(period, row)| {
                self.categories
                    .iter()
                    .zip(row)
                    .map(move |(category, &count)| TallyRow {
                        period: period as u64,
                        category: category.clone(),
                        count,
                    })
            })
            .collect()
    }
}

/// Runs one replication per seed, each with its own freshly seeded
/// generator. Replications are spread over the rayon pool; the result is in
/// seed order and equal to running them one after another.
pub fn replicate(
    params: LcgParams,
    seeds: &[u64],
    intervals: &IntervalTable,
    n_draws: u64,
    period_length: Option<u64>,
) -> Result<Vec<Tally>> {
    let categories: Vec<Category> = intervals.entries().iter().map(|e| e.category.clone()).collect();
    let mut simulation = Simulation::new(intervals);
    if let Some(k) = period_length {
        simulation = simulation.with_period_length(k);
    }
    seeds
        .par_iter()
        .map(|&seed| {
            let mut lcg = Lcg::new(params, seed)?;
            let run = simulation
                .run(&mut lcg, n_draws)?
                .collect::<Result<SimulationRun>>()?;
            debug!("replication with seed {} finished {} draws", seed, run.len());
            Tally::from_run(&run, &categories)
        })
        .collect()
}

/// `count` seeds in `[0, modulus)` derived reproducibly from `master`.
/// The first seed is always `master` itself (reduced modulo `modulus`).
pub fn replication_seeds(master: u64, count: usize, modulus: u64) -> Result<Vec<u64>> {
    if modulus == 0 {
        return Err(Error::configuration("LCG modulus must be greater than 0"));
    }
    let mut rng = StdRng::seed_from_u64(master);
    Ok((0..count)
        .map(|i| {
            if i == 0 {
                master % modulus
            } else {
                rng.gen_range(0..modulus)
            }
        })
        .collect())
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategorySummary {
    pub category: Category,
    pub probability: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub min: u64,
    pub max: u64,
    pub mean_share: f64,
    pub share_error: f64,
}

/// Statistics of the per-category totals across replications, next to the
/// empirical probability each category was drawn with.
pub fn summarize(tallies: &[Tally], probabilities: &ProbabilityTable) -> Result<Vec<CategorySummary>> {
    let first = tallies
        .first()
        .ok_or_else(|| Error::invalid_input("no replications to summarise"))?;
    let categories = first.categories();
    if tallies.iter().any(|t| t.categories() != categories) {
        return Err(Error::invalid_input(
            "replications disagree on category order",
        ));
    }
    let totals: Vec<Vec<u64>> = tallies.iter().map(Tally::totals).collect();
    let shares: Vec<Vec<f64>> = tallies.iter().map(Tally::shares).collect();
    let runs = tallies.len() as f64;

    Ok(categories
        .iter()
        .enumerate()
        .map(|(slot, category)| {
            let values: Vec<u64> = totals.iter().map(|t| t[slot]).collect();
            let mean = values.iter().sum::<u64>() as f64 / runs;
            let variance = values
                .iter()
                .map(|&v| (v as f64 - mean).powi(2))
                .sum::<f64>()
                / runs;
            let mean_share = shares.iter().map(|s| s[slot]).sum::<f64>() / runs;
            let probability = probabilities.probability(category).unwrap_or(0.0);
            CategorySummary {
                category: category.clone(),
                probability,
                mean,
                std_dev: variance.sqrt(),
                min: values.iter().copied().min().unwrap_or(0),
                max: values.iter().copied().max().unwrap_or(0),
                mean_share,
                share_error: (mean_share - probability).abs(),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probability::Histogram;

    fn intervals(scale: u64) -> (ProbabilityTable, IntervalTable) {
        let histogram = Histogram::from_counts(vec![("A", 3), ("B", 1)]).unwrap();
        let probabilities = ProbabilityTable::build(&histogram).unwrap();
        let intervals = IntervalTable::build(&probabilities, scale).unwrap();
        (probabilities, intervals)
    }

    #[test]
    fn test_draws_follow_generator() {
        let (_, table) = intervals(16);
        let mut lcg = Lcg::new(LcgParams::new(5, 3, 16).unwrap(), 7).unwrap();
        let run: SimulationRun = run(&mut lcg, &table, 3)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        let raws: Vec<u64> = run.raw_values().collect();
        assert_eq!(raws, vec![6, 1, 8]);
        // A covers [0, 11], B covers [12, 15]
        assert!(run.draws().iter().all(|d| d.category == Category::from("A")));
        assert_eq!(run.draws()[2].index, 2);
    }

    #[test]
    fn test_raw_value_six_maps_to_a() {
        let (_, table) = intervals(100);
        assert_eq!(table.lookup(6).unwrap().category, Category::from("A"));
    }

    #[test]
    fn test_periods() {
        let (_, table) = intervals(100);
        let mut lcg = Lcg::new(LcgParams::new(21, 37, 100).unwrap(), 42).unwrap();
        let run: SimulationRun = Simulation::new(&table)
            .with_period_length(4)
            .run(&mut lcg, 10)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        let periods: Vec<u64> = run.draws().iter().map(|d| d.period).collect();
        assert_eq!(periods, vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2]);
        let tally = Tally::from_run(&run, &[Category::from("A"), Category::from("B")]).unwrap();
        assert_eq!(tally.periods(), 3);
        assert_eq!(tally.draws(), 10);
        assert_eq!(tally.rows().len(), 6);
    }

    #[test]
    fn test_value_in_gap_stops_run() {
        // 5..8 belongs to no category.
        let table = IntervalTable::from_bounds(10, &[("A", 0, 5), ("B", 8, 10)]);
        let mut lcg = Lcg::new(LcgParams::new(1, 1, 10).unwrap(), 3).unwrap();
        let mut draws = run(&mut lcg, &table, 6).unwrap();
        let first = draws.next().unwrap().unwrap();
        assert_eq!((first.raw, first.category), (4, Category::from("A")));
        assert!(matches!(draws.next(), Some(Err(Error::Logic(_)))));
        assert!(draws.next().is_none());
        assert!(draws.next().is_none());
        assert_eq!(draws.size_hint(), (0, Some(0)));

        let mut lcg = Lcg::new(LcgParams::new(1, 1, 10).unwrap(), 3).unwrap();
        let collected = run(&mut lcg, &table, 6).unwrap().collect::<Result<SimulationRun>>();
        assert!(matches!(collected, Err(Error::Logic(_))));
    }

    #[test]
    fn test_tally_rejects_period_beyond_run() {
        let run: SimulationRun = vec![Draw {
            index: 0,
            period: u64::MAX - 1,
            raw: 0,
            category: Category::from("A"),
        }]
        .into_iter()
        .collect();
        assert!(matches!(
            Tally::from_run(&run, &[Category::from("A")]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_zero_period_length_rejected() {
        let (_, table) = intervals(100);
        let mut lcg = Lcg::new(LcgParams::new(21, 37, 100).unwrap(), 42).unwrap();
        let result = Simulation::new(&table).with_period_length(0).run(&mut lcg, 10);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_modulus_larger_than_scale_rejected() {
        let (_, table) = intervals(100);
        let mut lcg = Lcg::new(LcgParams::new(21, 37, 1000).unwrap(), 42).unwrap();
        assert!(matches!(
            run(&mut lcg, &table, 10),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_runs_continue_the_generator() {
        let (_, table) = intervals(100);
        let params = LcgParams::new(21, 37, 100).unwrap();
        let mut lcg = Lcg::new(params, 42).unwrap();
        let first: SimulationRun = run(&mut lcg, &table, 5).unwrap().collect::<Result<_>>().unwrap();
        let second: SimulationRun = run(&mut lcg, &table, 5).unwrap().collect::<Result<_>>().unwrap();
        assert_ne!(
            first.raw_values().collect::<Vec<_>>(),
            second.raw_values().collect::<Vec<_>>()
        );
        let mut fresh = Lcg::new(params, 42).unwrap();
        let again: SimulationRun = run(&mut fresh, &table, 5).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_zero_draws() {
        let (_, table) = intervals(100);
        let mut lcg = Lcg::new(LcgParams::new(21, 37, 100).unwrap(), 42).unwrap();
        let run: SimulationRun = run(&mut lcg, &table, 0).unwrap().collect::<Result<_>>().unwrap();
        assert!(run.is_empty());
        assert_eq!(lcg.state(), 42);
        let tally = Tally::from_run(&run, &[Category::from("A"), Category::from("B")]).unwrap();
        assert_eq!(tally.periods(), 0);
        assert_eq!(tally.shares(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_replicate_matches_sequential() {
        let (probabilities, table) = intervals(100);
        let params = LcgParams::new(21, 37, 100).unwrap();
        let seeds = replication_seeds(42, 8, 100).unwrap();
        assert_eq!(seeds[0], 42);
        let tallies = replicate(params, &seeds, &table, 200, Some(50)).unwrap();
        assert_eq!(tallies.len(), 8);
        for (seed, tally) in seeds.iter().zip(&tallies) {
            let mut lcg = Lcg::new(params, *seed).unwrap();
            let run: SimulationRun = Simulation::new(&table)
                .with_period_length(50)
                .run(&mut lcg, 200)
                .unwrap()
                .collect::<Result<_>>()
                .unwrap();
            let expected = Tally::from_run(&run, &[Category::from("A"), Category::from("B")]).unwrap();
            assert_eq!(tally, &expected);
        }
        let summary = summarize(&tallies, &probabilities).unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].probability, 0.75);
        // A full-period generator over 200 draws visits every value twice.
        assert_eq!(summary[0].mean, 150.0);
        assert_eq!(summary[0].std_dev, 0.0);
        assert!(summary[1].share_error < 1e-12);
    }

    #[test]
    fn test_replication_seeds_reproducible() {
        let a = replication_seeds(7, 5, 1000).unwrap();
        let b = replication_seeds(7, 5, 1000).unwrap();
        assert_eq!(a, b);
        assert!(a.iter().all(|&s| s < 1000));
        assert!(replication_seeds(7, 5, 0).is_err());
    }

    #[test]
    fn test_summarize_requires_tallies() {
        let (probabilities, _) = intervals(100);
        assert!(summarize(&[], &probabilities).is_err());
    }
}
