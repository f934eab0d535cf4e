use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use log::{info, warn, LevelFilter};

use kunjungan_sim::config::SimulationConfig;
use kunjungan_sim::dataset::Dataset;
use kunjungan_sim::interval::IntervalTable;
use kunjungan_sim::probability::ProbabilityTable;
use kunjungan_sim::rng::{self, Lcg};
use kunjungan_sim::simulation::{self, Simulation, SimulationRun, Tally};
use kunjungan_sim::write::{self, Format};
use kunjungan_sim::{read, Result};

#[derive(Parser)]
#[command(name = "kunjungan-sim", about = "Monte Carlo simulation of hospital visits per region")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the random-number sequence of a linear congruential generator
    Lcg {
        #[command(flatten)]
        lcg: LcgArgs,
        /// Number of values to generate
        #[arg(short = 'n', long, default_value_t = 20)]
        count: usize,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Print the empirical probability of each region
    Probabilities {
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Print the random-number interval assigned to each region
    Intervals {
        #[command(flatten)]
        data: DataArgs,
        /// Width of the random-number range (default: from the "Angka Acak"
        /// column, else the default modulus)
        #[arg(long)]
        scale: Option<u64>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Run the simulation
    Simulate {
        #[command(flatten)]
        data: DataArgs,
        /// JSON configuration file; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        lcg: LcgArgs,
        /// Width of the random-number range (default: from the "Angka Acak"
        /// column, else the modulus)
        #[arg(long)]
        scale: Option<u64>,
        /// Number of draws per replication
        #[arg(short = 'n', long)]
        draws: Option<u64>,
        /// Draws per simulated period
        #[arg(long)]
        period_length: Option<u64>,
        /// Independent replications, seeded from --seed
        #[arg(short, long)]
        replications: Option<usize>,
        /// Write the per-category summary across replications here
        #[arg(long)]
        summary: Option<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args)]
struct DataArgs {
    /// Visit data CSV (header row with tahun, bulan and one column per region)
    input: PathBuf,
    /// Only use these years
    #[arg(long = "year")]
    years: Vec<i32>,
    /// Only use these regions
    #[arg(long = "region")]
    regions: Vec<String>,
}

#[derive(Args)]
struct LcgArgs {
    #[arg(short, long)]
    seed: Option<u64>,
    /// Multiplier a
    #[arg(short = 'a', long)]
    multiplier: Option<u64>,
    /// Increment c
    #[arg(short = 'c', long)]
    increment: Option<u64>,
    /// Modulus m
    #[arg(short = 'm', long)]
    modulus: Option<u64>,
}

#[derive(Args)]
struct OutputArgs {
    /// Also write the table to this file
    #[arg(short, long)]
    out: Option<PathBuf>,
    /// csv or json (default: from the file extension)
    #[arg(short, long)]
    format: Option<Format>,
}

impl LcgArgs {
    fn apply(&self, config: &mut SimulationConfig) {
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(a) = self.multiplier {
            config.multiplier = a;
        }
        if let Some(c) = self.increment {
            config.increment = c;
        }
        if let Some(m) = self.modulus {
            config.modulus = m;
        }
    }
}

impl DataArgs {
    fn load(&self) -> Result<Dataset> {
        let dataset = read::read_dataset(&self.input)?;
        let dataset = dataset.restrict_years(&self.years);
        if dataset.is_empty() {
            warn!("No periods left after filtering years {:?}", self.years);
        }
        dataset.restrict_categories(&self.regions)
    }
}

fn main() {
    env_logger::Builder::new()
        .filter(Some("kunjungan_sim"), LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Lcg { lcg, count, output } => {
            let mut config = SimulationConfig::default();
            lcg.apply(&mut config);
            let params = config.lcg_params()?;
            if !params.has_full_period() {
                warn!("Parameters do not reach the full period {}", params.modulus);
            }
            let rows = rng::sequence(params, config.seed, count)?;
            println!("{:>6} {:>12} {:>10}", "i", "x_i", "u_i");
            for row in &rows {
                println!("{:>6} {:>12} {:>10.4}", row.index, row.value, row.uniform);
            }
            export(&output, &rows)
        }
        Command::Probabilities { data, output } => {
            let dataset = data.load()?;
            let probabilities = ProbabilityTable::build(&dataset.histogram()?)?;
            print_probabilities(&probabilities);
            export(&output, probabilities.entries())
        }
        Command::Intervals { data, scale, output } => {
            let dataset = data.load()?;
            let probabilities = ProbabilityTable::build(&dataset.histogram()?)?;
            let mut config = SimulationConfig {
                scale,
                ..SimulationConfig::default()
            };
            config.resolve_scale(dataset.suggested_scale());
            let intervals = IntervalTable::build(&probabilities, config.scale())?;
            print_intervals(&intervals);
            export(&output, intervals.entries())
        }
        Command::Simulate {
            data,
            config,
            lcg,
            scale,
            draws,
            period_length,
            replications,
            summary,
            output,
        } => {
            let dataset = data.load()?;
            let mut config = match &config {
                Some(path) => SimulationConfig::from_file(path)?,
                None => SimulationConfig::default(),
            };
            lcg.apply(&mut config);
            if scale.is_some() {
                config.scale = scale;
            }
            if let Some(n) = draws {
                config.n_draws = n;
            }
            if period_length.is_some() {
                config.period_length = period_length;
            }
            if let Some(r) = replications {
                config.replications = r;
            }
            config.resolve_scale(dataset.suggested_scale());
            config.validate()?;
            simulate(&dataset, &config, &output, summary.as_deref())
        }
    }
}

fn simulate(
    dataset: &Dataset,
    config: &SimulationConfig,
    output: &OutputArgs,
    summary_path: Option<&Path>,
) -> Result<()> {
    let probabilities = ProbabilityTable::build(&dataset.histogram()?)?;
    let intervals = IntervalTable::build(&probabilities, config.scale())?;
    print_probabilities(&probabilities);
    print_intervals(&intervals);

    let params = config.lcg_params()?;
    let mut lcg = Lcg::new(params, config.seed)?;
    let mut sim = Simulation::new(&intervals);
    if let Some(k) = config.period_length {
        sim = sim.with_period_length(k);
    }
    let run = sim
        .run(&mut lcg, config.n_draws)?
        .collect::<Result<SimulationRun>>()?;
    let categories: Vec<_> = intervals.entries().iter().map(|e| e.category.clone()).collect();
    let tally = Tally::from_run(&run, &categories)?;
    print_tally(&tally);
    export(output, run.draws())?;

    if config.replications > 1 || summary_path.is_some() {
        let seeds = simulation::replication_seeds(config.seed, config.replications, params.modulus)?;
        info!("Running {} replications", seeds.len());
        let tallies = simulation::replicate(
            params,
            &seeds,
            &intervals,
            config.n_draws,
            config.period_length,
        )?;
        let summary = simulation::summarize(&tallies, &probabilities)?;
        println!();
        println!(
            "{:<20} {:>8} {:>10} {:>10} {:>8} {:>8} {:>8}",
            "region", "p", "mean", "std dev", "min", "max", "share"
        );
        for row in &summary {
            println!(
                "{:<20} {:>8.4} {:>10.2} {:>10.2} {:>8} {:>8} {:>8.4}",
                row.category.name(),
                row.probability,
                row.mean,
                row.std_dev,
                row.min,
                row.max,
                row.mean_share
            );
        }
        if let Some(path) = summary_path {
            write::rows_to_file(path, &summary, output.format)?;
        }
    }
    Ok(())
}

fn export<T: serde::Serialize>(output: &OutputArgs, rows: &[T]) -> Result<()> {
    match &output.out {
        Some(path) => write::rows_to_file(path, rows, output.format),
        None => Ok(()),
    }
}

fn print_probabilities(table: &ProbabilityTable) {
    println!("{:<20} {:>10} {:>12} {:>12}", "region", "visits", "probability", "cumulative");
    for entry in table.entries() {
        println!(
            "{:<20} {:>10} {:>12.4} {:>12.4}",
            entry.category.name(),
            entry.count,
            entry.probability,
            entry.cumulative
        );
    }
}

fn print_intervals(table: &IntervalTable) {
    println!("{:<20} {:>8} {:>8}", "region", "lower", "upper");
    for entry in table.entries() {
        let upper = entry
            .upper()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<20} {:>8} {:>8}", entry.category.name(), entry.lower(), upper);
    }
}

fn print_tally(tally: &Tally) {
    print!("{:>6}", "period");
    for category in tally.categories() {
        print!(" {:>14}", category.name());
    }
    println!();
    for period in 0..tally.periods() {
        print!("{:>6}", period + 1);
        for category in tally.categories() {
            print!(" {:>14}", tally.count(period, category).unwrap_or(0));
        }
        println!();
    }
    print!("{:>6}", "total");
    for total in tally.totals() {
        print!(" {:>14}", total);
    }
    println!();
}
