use clap::{Parser, Subcommand, ValueEnum};
use petri_net_analysis::optimize::{parse_weights, MarkingOptimizer, OptimizeMode};
use petri_net_analysis::{
    explicit, xml_parsing, AnalysisError, CancellationToken, DeadlockDetector, PetriNet,
    SymbolicReachability,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "petri-net-analysis", version, about = "Analysis of 1-safe Petri nets")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable informational output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a PNML file and report the net structure.
    Parse { file: PathBuf },
    /// Compute the reachable markings by explicit breadth-first search.
    Explicit { file: PathBuf },
    /// Compute the reachable markings symbolically.
    Bdd { file: PathBuf },
    /// Search for a reachable deadlock.
    Deadlock { file: PathBuf },
    /// Maximize a weighted token sum over the reachable markings.
    Optimize {
        file: PathBuf,
        /// Manual weights, e.g. `p1=10,p2=-5`; places not listed get 0.
        #[arg(long)]
        weights: Option<String>,
        /// Weight strategy used when no manual weights are given.
        #[arg(long, value_enum, default_value_t = WeightStrategy::Uniform)]
        strategy: WeightStrategy,
        /// Use the greedy heuristic instead of the exact search.
        #[arg(long)]
        greedy: bool,
    },
    /// Compare explicit and symbolic reachability on the same net.
    Compare { file: PathBuf },
    /// Run every analysis in sequence.
    Full { file: PathBuf },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum WeightStrategy {
    /// `+1, -2, +3, -4, ...` over the sorted places.
    Alternating,
    /// Weight 1 for every place.
    Uniform,
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .init();

    if let Err(error) = run(&cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), AnalysisError> {
    match &cli.command {
        Command::Parse { file } => run_parse(file, cli.verbose),
        Command::Explicit { file } => run_explicit(file, cli.verbose),
        Command::Bdd { file } => run_bdd(file, cli.verbose),
        Command::Deadlock { file } => run_deadlock(file),
        Command::Optimize {
            file,
            weights,
            strategy,
            greedy,
        } => {
            let net = xml_parsing::pnml::parse_file(file)?;
            let weights = resolve_weights(&net, weights.as_deref(), *strategy);
            let mode = if *greedy {
                OptimizeMode::Greedy
            } else {
                OptimizeMode::Exact
            };
            run_optimize(&net, &weights, mode)
        }
        Command::Compare { file } => run_compare(file),
        Command::Full { file } => run_full(file, cli.verbose),
    }
}

fn run_parse(file: &Path, verbose: bool) -> Result<(), AnalysisError> {
    let net = xml_parsing::pnml::parse_file(file)?;
    println!(
        "parsed net: {} places, {} transitions",
        net.places().len(),
        net.transitions().len()
    );
    if verbose {
        println!("{net}");
    }
    Ok(())
}

fn run_explicit(file: &Path, verbose: bool) -> Result<(), AnalysisError> {
    let net = xml_parsing::pnml::parse_file(file)?;
    let start = Instant::now();
    let graph = explicit::explore(&net, net.initial_marking())?;
    let elapsed = start.elapsed();
    println!("explicit reachability: {} markings", graph.len());
    println!("time: {elapsed:.2?}");
    if verbose {
        for marking in graph.markings.iter().take(10) {
            println!("  {marking}");
        }
    }
    Ok(())
}

fn run_bdd(file: &Path, verbose: bool) -> Result<(), AnalysisError> {
    let net = xml_parsing::pnml::parse_file(file)?;
    let start = Instant::now();
    let engine = computed_engine(&net)?;
    let elapsed = start.elapsed();
    println!(
        "symbolic reachability: {} markings",
        engine.count_markings_exact()?
    );
    println!("time: {elapsed:.2?}");
    if verbose {
        for marking in engine.extract_markings()?.iter().take(10) {
            println!("  {marking}");
        }
    }
    Ok(())
}

fn run_deadlock(file: &Path) -> Result<(), AnalysisError> {
    let net = xml_parsing::pnml::parse_file(file)?;
    let engine = computed_engine(&net)?;
    let detector = DeadlockDetector::new(&net, &engine);
    let start = Instant::now();
    let deadlock = detector.detect(&CancellationToken::new())?;
    let elapsed = start.elapsed();
    match deadlock {
        Some(marking) => println!("deadlock found: {marking}"),
        None => println!("no deadlock found"),
    }
    println!("time: {elapsed:.2?}");
    Ok(())
}

fn run_optimize(
    net: &PetriNet,
    weights: &BTreeMap<String, i64>,
    mode: OptimizeMode,
) -> Result<(), AnalysisError> {
    println!("weights: {weights:?}");
    let engine = computed_engine(net)?;
    let optimizer = MarkingOptimizer::new(&engine);
    let start = Instant::now();
    let optimum = optimizer.maximize(weights, mode, &CancellationToken::new())?;
    let elapsed = start.elapsed();
    match optimum {
        Some(optimum) => {
            println!("optimal value: {}", optimum.value);
            println!("optimal marking: {}", optimum.marking);
        }
        None => println!("no reachable marking to optimize over"),
    }
    println!("time: {elapsed:.2?}");
    Ok(())
}

fn run_compare(file: &Path) -> Result<(), AnalysisError> {
    let net = xml_parsing::pnml::parse_file(file)?;

    let start = Instant::now();
    let graph = explicit::explore(&net, net.initial_marking())?;
    let explicit_time = start.elapsed();
    println!("explicit: {} markings in {explicit_time:.2?}", graph.len());

    let start = Instant::now();
    let engine = computed_engine(&net)?;
    let symbolic_time = start.elapsed();
    let states = engine.count_markings_exact()?;
    let nodes = engine.reachable()?.size();
    println!("symbolic: {states} markings in {symbolic_time:.2?}");
    println!("BDD nodes: {nodes}");
    println!(
        "compression: 1 node ~ {:.1} markings",
        engine.count_markings()? / nodes as f64
    );
    Ok(())
}

fn run_full(file: &Path, verbose: bool) -> Result<(), AnalysisError> {
    run_parse(file, verbose)?;
    println!();
    run_explicit(file, verbose)?;
    println!();
    run_bdd(file, verbose)?;
    println!();
    run_deadlock(file)?;
    println!();
    let net = xml_parsing::pnml::parse_file(file)?;
    let weights = resolve_weights(&net, None, WeightStrategy::Uniform);
    run_optimize(&net, &weights, OptimizeMode::Exact)
}

fn computed_engine(net: &PetriNet) -> Result<SymbolicReachability<'_>, AnalysisError> {
    let mut engine = SymbolicReachability::new(net);
    engine.compute_reachability(net.initial_marking(), &CancellationToken::new())?;
    Ok(engine)
}

fn resolve_weights(
    net: &PetriNet,
    manual: Option<&str>,
    strategy: WeightStrategy,
) -> BTreeMap<String, i64> {
    if let Some(manual) = manual {
        return parse_weights(manual);
    }
    match strategy {
        WeightStrategy::Alternating => net
            .places()
            .iter()
            .enumerate()
            .map(|(i, place)| {
                let position = (i + 1) as i64;
                let sign = if position % 2 == 0 { -1 } else { 1 };
                (place.clone(), sign * position)
            })
            .collect(),
        WeightStrategy::Uniform => net.places().iter().map(|p| (p.clone(), 1)).collect(),
    }
}
