use kunjungan_sim::dataset::Period;
use kunjungan_sim::rng::{Lcg, LcgParams};

const REGIONS: [(&str, u64); 6] = [
    ("Kota Cirebon", 110),
    ("Kab. Cirebon", 170),
    ("Kuningan", 30),
    ("Indramayu", 40),
    ("Majalengka", 25),
    ("Lain-lain", 10),
];

fn main() -> kunjungan_sim::Result<()> {
    let known_seed = 12345;
    let mut rng = Lcg::new(LcgParams::new(1103515245, 12345, 1 << 31)?, known_seed)?;
    let mut random_column = Lcg::new(LcgParams::new(21, 37, 100)?, 42)?;

    println!("Data Kunjungan Pasien Rawat Inap (generated from seed {}),,,,,,,,", known_seed);
    println!(",,,,,,,,");
    let names: Vec<&str> = REGIONS.iter().map(|(name, _)| *name).collect();
    println!("tahun,bulan,Angka Acak,{}", names.join(","));

    for year in 2021..=2023 {
        for month in 1..=12u8 {
            let period = Period::new(year, month)?;
            let counts: Vec<String> = REGIONS
                .iter()
                .map(|(_, base)| {
                    // +-20% around the regional base
                    let spread = base * 2 / 5 + 1;
                    (base - base / 5 + rng.next_value() % spread).to_string()
                })
                .collect();
            println!(
                "{},{},{},{}",
                period.year,
                period.month_name(),
                random_column.next_value(),
                counts.join(",")
            );
        }
    }
    Ok(())
}
