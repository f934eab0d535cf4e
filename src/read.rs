//! Loading the historical visit table.
//!
//! The expected layout is the spreadsheet export used by the hospital
//! dashboards: a few free-text lines, then a header row with `tahun` (year)
//! and `bulan` (month), an optional `Angka Acak` (random number) column and
//! one column per region.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::{info, warn};

use crate::dataset::{Dataset, Period, PeriodRow};
use crate::error::{Error, Result};
use crate::probability::Category;

const YEAR_COLUMN: &str = "tahun";
const MONTH_COLUMN: &str = "bulan";
const RANDOM_COLUMN: &str = "angka acak";
/// Row totals and numbering that sheets carry next to the region columns.
const AGGREGATE_COLUMNS: [&str; 5] = ["jumlah", "total", "no", "no.", "nomor"];

struct Layout {
    year: usize,
    month: usize,
    random: Option<usize>,
    regions: Vec<(usize, Category)>,
}

impl Layout {
    fn from_header(header: &csv::StringRecord) -> Option<Layout> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let year = find(YEAR_COLUMN)?;
        let month = find(MONTH_COLUMN)?;
        let random = find(RANDOM_COLUMN);
        let regions = header
            .iter()
            .enumerate()
            .filter(|(i, h)| {
                let h = h.trim();
                *i != year
                    && *i != month
                    && Some(*i) != random
                    && !h.is_empty()
                    && !AGGREGATE_COLUMNS.iter().any(|a| h.eq_ignore_ascii_case(a))
            })
            .map(|(i, h)| (i, Category::new(h.trim())))
            .collect();
        Some(Layout {
            year,
            month,
            random,
            regions,
        })
    }
}

pub fn read_dataset(path: &Path) -> Result<Dataset> {
    info!("Reading visit data from {:?}", path);
    let file = File::open(path)?;
    read_dataset_from(file)
}

pub fn read_dataset_from<R: Read>(reader: R) -> Result<Dataset> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut layout: Option<Layout> = None;
    let mut dataset: Option<Dataset> = None;

    for (line_num, result) in csv_reader.records().enumerate() {
        let record = result?;
        if layout.is_none() {
            // Still in the preamble; look for the header row.
            if let Some(found) = Layout::from_header(&record) {
                if found.regions.is_empty() {
                    return Err(Error::invalid_input("header has no region columns"));
                }
                info!(
                    "Header on line {} with regions {:?}",
                    line_num + 1,
                    found.regions.iter().map(|(_, c)| c.name()).collect::<Vec<_>>()
                );
                dataset = Some(Dataset::new(
                    found.regions.iter().map(|(_, c)| c.clone()).collect(),
                )?);
                layout = Some(found);
            }
            continue;
        }
        let (layout, dataset) = match (layout.as_ref(), dataset.as_mut()) {
            (Some(l), Some(d)) => (l, d),
            _ => continue,
        };

        let cell = |i: usize| record.get(i).map(str::trim).unwrap_or("");
        let (year_text, month_text) = (cell(layout.year), cell(layout.month));
        if year_text.is_empty() || month_text.is_empty() {
            continue;
        }
        let year = parse_count(year_text)
            .and_then(|y| i32::try_from(y).ok())
            .ok_or_else(|| {
                Error::invalid_input(format!("invalid year '{}' on line {}", year_text, line_num + 1))
            })?;
        let month = Period::parse_month(month_text)?;

        let random = layout.random.and_then(|i| parse_count(cell(i)));
        let mut counts = Vec::with_capacity(layout.regions.len());
        for (i, category) in &layout.regions {
            let text = cell(*i);
            if text.starts_with('-') && text.len() > 1 {
                return Err(Error::invalid_input(format!(
                    "negative count '{}' for {} on line {}",
                    text,
                    category,
                    line_num + 1
                )));
            }
            let count = match parse_count(text) {
                Some(n) => n,
                None => {
                    warn!(
                        "line {}: count '{}' for {} is not a number, using 0",
                        line_num + 1,
                        text,
                        category
                    );
                    0
                }
            };
            counts.push(count);
        }

        dataset.push_row(PeriodRow {
            period: Period::new(year, month)?,
            random,
            counts,
        })?;
    }

    let dataset = dataset.ok_or_else(|| {
        Error::invalid_input(format!(
            "no header row with '{}' and '{}' columns found",
            YEAR_COLUMN, MONTH_COLUMN
        ))
    })?;
    info!(
        "Loaded {} periods over {} regions",
        dataset.len(),
        dataset.categories().len()
    );
    Ok(dataset)
}

/// Non-negative integer cell. Accepts thousands separators ("1.234",
/// "1,234") and integral floats ("12.0").
fn parse_count(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(n) = text.parse::<u64>() {
        return Some(n);
    }
    // Thousands separators first: "1.000" is one thousand, not 1.0.
    let groups: Vec<&str> = text.split(|c: char| c == '.' || c == ',').collect();
    let grouped = groups.len() > 1
        && (1..=3).contains(&groups[0].len())
        && groups[1..].iter().all(|g| g.len() == 3)
        && groups.iter().all(|g| g.chars().all(|c| c.is_ascii_digit()));
    if grouped {
        return groups.concat().parse::<u64>().ok();
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => Some(f as u64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Data Kunjungan Pasien Rawat Inap,,,,,
RS Gunung Jati,,,,,
tahun,bulan,Angka Acak,Kota Cirebon,Kuningan,Lain-lain
2022,Januari,12,120,30,4
2022,Februari,55,\"1.034\",,2
,,,,,
2022,3,87,110,25,x
";

    #[test]
    fn test_reads_layout_with_preamble() {
        let dataset = read_dataset_from(SAMPLE.as_bytes()).unwrap();
        let names: Vec<&str> = dataset.categories().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["Kota Cirebon", "Kuningan", "Lain-lain"]);
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.rows()[0].random, Some(12));
        assert_eq!(dataset.rows()[1].counts, vec![1034, 0, 2]);
        assert_eq!(dataset.rows()[2].period, Period::new(2022, 3).unwrap());
        assert_eq!(dataset.rows()[2].counts, vec![110, 25, 0]);
        assert_eq!(dataset.suggested_scale(), Some(100));
    }

    #[test]
    fn test_missing_header() {
        let err = read_dataset_from("a,b\n1,2\n".as_bytes());
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_negative_count_rejected() {
        let data = "tahun,bulan,A\n2022,1,-4\n";
        assert!(read_dataset_from(data.as_bytes()).is_err());
    }

    #[test]
    fn test_duplicate_period_rejected() {
        let data = "tahun,bulan,A\n2022,1,4\n2022,Januari,5\n";
        assert!(matches!(
            read_dataset_from(data.as_bytes()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_dotted_thousands_in_cells() {
        let data = "tahun,bulan,A,B\n2022,1,\"1.000\",\"1.500\"\n";
        let dataset = read_dataset_from(data.as_bytes()).unwrap();
        assert_eq!(dataset.rows()[0].counts, vec![1000, 1500]);
    }

    #[test]
    fn test_total_columns_are_not_regions() {
        let data = "No,tahun,bulan,Kuningan,Majalengka,Jumlah\n1,2022,1,3,1,4\n";
        let dataset = read_dataset_from(data.as_bytes()).unwrap();
        let names: Vec<&str> = dataset.categories().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["Kuningan", "Majalengka"]);
        assert_eq!(dataset.histogram().unwrap().total(), 4);
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("42"), Some(42));
        assert_eq!(parse_count("12.0"), Some(12));
        assert_eq!(parse_count("1,234"), Some(1234));
        assert_eq!(parse_count("1.000"), Some(1000));
        assert_eq!(parse_count("12.000"), Some(12000));
        assert_eq!(parse_count("1.500"), Some(1500));
        assert_eq!(parse_count("1.000.000"), Some(1_000_000));
        assert_eq!(parse_count("12.5"), None);
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("n/a"), None);
    }
}
