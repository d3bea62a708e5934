//! Replay synthetic branch patterns through a TAGE predictor.

use clap::{ Parser, ValueEnum };
use rand::prelude::*;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use thiserror::Error;

use tage::{ ArchState, BranchRecord, ConditionalPredictor, Outcome, TAGEConfig };
use tage::stats::BranchStats;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Pattern {
    /// Every branch is always taken
    AlwaysTaken,
    /// Every branch alternates between taken and not-taken
    Alternating,
    /// Every branch is taken 'period - 1' times and then not-taken once
    Loop,
    /// Every outcome is drawn at random
    Random,
}

#[derive(Parser, Debug)]
#[command(about = "Evaluate a TAGE predictor on synthetic branch patterns")]
struct Args {
    /// Outcome pattern followed by each branch
    #[arg(long, value_enum, default_value_t = Pattern::Loop)]
    pattern: Pattern,

    /// Number of times each branch is executed
    #[arg(long, default_value_t = 10_000)]
    iterations: usize,

    /// Number of distinct branch addresses
    #[arg(long, default_value_t = 4)]
    branches: usize,

    /// Loop trip count used by the 'loop' pattern
    #[arg(long, default_value_t = 8)]
    period: usize,

    /// Predictor configuration [JSON]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for the predictor and the 'random' pattern
    #[arg(long)]
    seed: Option<u64>,
}

/// Reasons a configuration file couldn't be loaded.
#[derive(Debug, Error)]
enum LoadError {
    #[error("couldn't open {}: {source}", path.display())]
    Open { path: PathBuf, source: std::io::Error },

    #[error("couldn't parse {}: {source}", path.display())]
    Parse { path: PathBuf, source: serde_json::Error },
}

fn load_config(path: Option<&PathBuf>) -> Result<TAGEConfig, LoadError> {
    let Some(path) = path else {
        return Ok(TAGEConfig::default());
    };
    let f = File::open(path).map_err(|source| {
        LoadError::Open { path: path.clone(), source }
    })?;
    serde_json::from_reader(BufReader::new(f)).map_err(|source| {
        LoadError::Parse { path: path.clone(), source }
    })
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let mut cfg = match load_config(args.config.as_ref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("[!] {}", e);
            return ExitCode::FAILURE;
        },
    };
    if args.seed.is_some() {
        cfg.seed = args.seed;
    }
    if args.period < 2 {
        eprintln!("[!] --period must be at least 2");
        return ExitCode::FAILURE;
    }

    println!("[*] TAGE configuration:");
    println!("      Entries (in total): {}", cfg.total_entries());
    println!("        {} entries (base component)", cfg.base.size());
    for (idx, len) in cfg.history_lengths().iter().enumerate() {
        println!("        {} entries (tagged component {}, {} history bits)",
            1usize << cfg.index_bits, idx, len
        );
    }
    let storage_bits = cfg.storage_bits();
    println!("      Storage bits: {}b, {:.2}KiB",
        storage_bits, storage_bits as f64 / 1024.0 / 8.0
    );

    let mut tage = match cfg.build() {
        Ok(tage) => tage,
        Err(e) => {
            eprintln!("[!] Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        },
    };

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let records: Vec<BranchRecord> = (0..args.branches)
        .map(|i| BranchRecord::conditional(0x1000_0000 + i * 0x14, 0x0fff_0000))
        .collect();
    let state = ArchState::default();
    let mut stats = BranchStats::new();

    let start = Instant::now();
    for iter in 0..args.iterations {
        for record in records.iter() {
            let outcome = match args.pattern {
                Pattern::AlwaysTaken => Outcome::T,
                Pattern::Alternating => Outcome::from(iter % 2 == 0),
                Pattern::Loop => Outcome::from(iter % args.period != args.period - 1),
                Pattern::Random => Outcome::from(rng.gen::<bool>()),
            };
            let prediction = tage.predict_branch(record);
            stats.update(record, prediction, outcome);
            tage.update_branch(record, &state, outcome);
        }
    }
    let done = start.elapsed();
    log::info!("simulated {} branches in {:.3?}", stats.global_brns(), done);

    println!("[*] Global statistics ({:?}):", args.pattern);
    println!("      Unique branches: {}", stats.num_unique_branches());
    println!("      Global hit rate: {}/{} ({:.2}% correct) ({} misses)",
        stats.global_hits(), stats.global_brns(),
        stats.hit_rate() * 100.0, stats.global_miss()
    );
    println!();

    println!("[*] Per-component statistics ({}):", tage.name());
    println!("      Base component: {} predictions", tage.stat.base_provided);
    for (idx, comp) in tage.comp.iter().enumerate() {
        println!("      Component[{}] (GHR[0..{}]): {} predictions, {} useful entries",
            idx, comp.history_len(), tage.stat.comp_provided[idx],
            comp.num_useful_entries()
        );
    }
    println!("      {} allocations, {} failed, {} aging events",
        tage.stat.alcs, tage.stat.failed_alcs, tage.stat.resets
    );

    let low = stats.get_low_rate_branches(8, 0.55);
    if !low.is_empty() {
        println!("[*] Low hit-rate branches:");
        for (pc, data) in low {
            println!("      {:016x} {:8}/{:8} {:.4}",
                pc, data.hits, data.occ, data.hit_rate()
            );
        }
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    fn scratch_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir()
            .join(format!("evaluate-tage-{}-{}", std::process::id(), name));
        let mut f = File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn missing_config_uses_default() {
        assert_eq!(load_config(None).unwrap(), TAGEConfig::default());
    }

    #[test]
    fn config_file_is_loaded() {
        let path = scratch_file("ok.json", r#"{ "num_banks": 2, "seed": 3 }"#);
        let cfg = load_config(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(cfg.num_banks, 2);
        assert_eq!(cfg.seed, Some(3));
    }

    #[test]
    fn load_errors_name_the_file() {
        let missing = std::env::temp_dir().join("evaluate-tage-no-such-file.json");
        let err = load_config(Some(&missing)).unwrap_err();
        assert!(matches!(err, LoadError::Open { .. }));
        assert!(err.to_string().contains("no-such-file"));

        let path = scratch_file("bad.json", "{ num_banks: ");
        let err = load_config(Some(&path)).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, LoadError::Parse { .. }));
        assert!(err.to_string().starts_with("couldn't parse"));
    }
}
