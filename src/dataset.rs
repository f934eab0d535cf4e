use std::fmt;

use log::debug;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::probability::{check_unique, Category, Histogram};

const MONTH_NAMES: [(&str, &str); 12] = [
    ("januari", "january"),
    ("februari", "february"),
    ("maret", "march"),
    ("april", "april"),
    ("mei", "may"),
    ("juni", "june"),
    ("juli", "july"),
    ("agustus", "august"),
    ("september", "september"),
    ("oktober", "october"),
    ("november", "november"),
    ("desember", "december"),
];

/// One observation row: a year and a month in `1..=12`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Period {
    pub year: i32,
    pub month: u8,
}

impl Period {
    pub fn new(year: i32, month: u8) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::invalid_input(format!(
                "month {} is outside 1..=12",
                month
            )));
        }
        Ok(Period { year, month })
    }

    /// Parses a month given as a number or as an Indonesian or English name
    /// (full or three-letter prefix, any case).
    pub fn parse_month(text: &str) -> Result<u8> {
        let text = text.trim();
        if let Ok(n) = text.parse::<u8>() {
            if (1..=12).contains(&n) {
                return Ok(n);
            }
        }
        let lower = text.to_lowercase();
        if lower.chars().count() >= 3 {
            for (i, (id, en)) in MONTH_NAMES.iter().enumerate() {
                if id.starts_with(&lower) || en.starts_with(&lower) {
                    return Ok(i as u8 + 1);
                }
            }
        }
        Err(Error::invalid_input(format!("unrecognised month '{}'", text)))
    }

    /// Indonesian month name, `"?"` for a month outside `1..=12`.
    pub fn month_name(&self) -> &'static str {
        const NAMES: [&str; 12] = [
            "Januari", "Februari", "Maret", "April", "Mei", "Juni", "Juli", "Agustus",
            "September", "Oktober", "November", "Desember",
        ];
        usize::from(self.month)
            .checked_sub(1)
            .and_then(|i| NAMES.get(i))
            .copied()
            .unwrap_or("?")
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.month_name(), self.year)
    }
}

/// `(period, category) -> count`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HistoricalRecord {
    pub period: Period,
    pub category: Category,
    pub count: u64,
}

/// All counts observed in one period, in the dataset's category order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeriodRow {
    pub period: Period,
    /// The historical random-number column ("Angka Acak"), when present.
    pub random: Option<u64>,
    pub counts: Vec<u64>,
}

/// Monthly visit counts per region, with the region order made explicit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dataset {
    categories: Vec<Category>,
    rows: Vec<PeriodRow>,
}

impl Dataset {
    pub fn new(categories: Vec<Category>) -> Result<Self> {
        check_unique(&categories)?;
        Ok(Dataset {
            categories,
            rows: Vec::new(),
        })
    }

    pub fn push_row(&mut self, row: PeriodRow) -> Result<()> {
        if row.counts.len() != self.categories.len() {
            return Err(Error::invalid_input(format!(
                "row for {} has {} counts, expected {}",
                row.period,
                row.counts.len(),
                self.categories.len()
            )));
        }
        if self.rows.iter().any(|r| r.period == row.period) {
            return Err(Error::invalid_input(format!(
                "duplicate period {}",
                row.period
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Builds a dataset from long-format records. Categories appear in the
    /// order given; periods in order of first appearance.
    pub fn from_records(categories: Vec<Category>, records: &[HistoricalRecord]) -> Result<Self> {
        let mut dataset = Dataset::new(categories)?;
        for record in records {
            let slot = dataset
                .categories
                .iter()
                .position(|c| c == &record.category)
                .ok_or_else(|| {
                    Error::invalid_input(format!("unknown category '{}'", record.category))
                })?;
            let row = match dataset.rows.iter().position(|r| r.period == record.period) {
                Some(i) => &mut dataset.rows[i],
                None => {
                    dataset.rows.push(PeriodRow {
                        period: record.period,
                        random: None,
                        counts: vec![0; dataset.categories.len()],
                    });
                    let last = dataset.rows.len() - 1;
                    &mut dataset.rows[last]
                }
            };
            row.counts[slot] = row.counts[slot].saturating_add(record.count);
        }
        Ok(dataset)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn rows(&self) -> &[PeriodRow] {
        &self.rows
    }

    pub fn periods(&self) -> impl Iterator<Item = Period> + '_ {
        self.rows.iter().map(|r| r.period)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Long format: one record per period and category.
    pub fn records(&self) -> impl Iterator<Item = HistoricalRecord> + '_ {
        self.rows.iter().flat_map(move |row| {
            self.categories
                .iter()
                .zip(row.counts.iter())
                .map(move |(category, &count)| HistoricalRecord {
                    period: row.period,
                    category: category.clone(),
                    count,
                })
        })
    }

    /// Total visits per category across every period.
    pub fn histogram(&self) -> Result<Histogram> {
        let mut histogram = Histogram::new(self.categories.clone())?;
        for record in self.records() {
            histogram.add(&record.category, record.count)?;
        }
        debug!(
            "histogram over {} periods, {} visits",
            self.rows.len(),
            histogram.total()
        );
        Ok(histogram)
    }

    /// Keeps only the given years. An empty filter keeps everything.
    pub fn restrict_years(&self, years: &[i32]) -> Dataset {
        if years.is_empty() {
            return self.clone();
        }
        Dataset {
            categories: self.categories.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| years.contains(&r.period.year))
                .cloned()
                .collect(),
        }
    }

    /// Keeps only the named categories, in dataset order. An empty filter
    /// keeps everything.
    pub fn restrict_categories(&self, names: &[String]) -> Result<Dataset> {
        if names.is_empty() {
            return Ok(self.clone());
        }
        for name in names {
            if !self.categories.iter().any(|c| c.name() == name) {
                return Err(Error::invalid_input(format!("unknown category '{}'", name)));
            }
        }
        let keep: Vec<usize> = self
            .categories
            .iter()
            .enumerate()
            .filter(|(_, c)| names.iter().any(|n| n == c.name()))
            .map(|(i, _)| i)
            .collect();
        Ok(Dataset {
            categories: keep.iter().map(|&i| self.categories[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| PeriodRow {
                    period: r.period,
                    random: r.random,
                    counts: keep.iter().map(|&i| r.counts[i]).collect(),
                })
                .collect(),
        })
    }

    /// Smallest power of ten strictly above every historical random number,
    /// e.g. values in 0..=99 give 100.
    pub fn suggested_scale(&self) -> Option<u64> {
        let max = self.rows.iter().filter_map(|r| r.random).max()?;
        let mut scale: u64 = 10;
        while scale <= max {
            scale = scale.checked_mul(10)?;
        }
        Some(scale)
    }
}
