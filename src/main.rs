use clap::Parser;
use colored::Colorize;
use miette::Result;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use class_shrinker::report::{JsonReporter, TerminalReporter};
use class_shrinker::session::{RunOutcome, ShrinkSession};
use class_shrinker::watch::ClassWatcher;
use class_shrinker::Config;

/// class-shrinker - Remove unreachable methods from JVM class files
#[derive(Parser, Debug)]
#[command(name = "class-shrinker")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project directory used to find a default configuration file
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the persisted graph, fingerprints and usage reports
    #[arg(long, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    /// Patterns to exclude (can be specified multiple times)
    #[arg(short, long)]
    exclude: Vec<String>,

    /// Worker threads (0 = one per core)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Only reprocess class files changed since the last run
    #[arg(long)]
    incremental: bool,

    /// Delete the saved graph and fingerprints before running
    #[arg(long)]
    clear_state: bool,

    /// Watch mode - shrink incrementally whenever class files change
    #[arg(long)]
    watch: bool,

    /// Quiet period in milliseconds before a watch-mode rerun
    #[arg(long, value_name = "MS", default_value_t = 500)]
    debounce_ms: u64,

    /// Output format for the run summary
    #[arg(short, long, value_enum, default_value = "terminal")]
    format: OutputFormat,

    /// Output file (for json format)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// List removed classes and methods in the terminal summary
    #[arg(long)]
    show_removed: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode - only output results
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug, Default)]
enum OutputFormat {
    #[default]
    Terminal,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    info!("class-shrinker v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli)?;

    if cli.clear_state {
        ShrinkSession::new(&config).clear_state()?;
    }

    if cli.watch {
        run_watch_mode(&config, &cli)?;
    } else {
        let outcome = run_once(&config, cli.incremental, &cli)?;
        print_outcome(&outcome, &cli)?;
    }

    Ok(())
}

fn run_once(config: &Config, incremental: bool, cli: &Cli) -> Result<RunOutcome> {
    let start_time = Instant::now();
    let session = ShrinkSession::new(config);

    let outcome = if incremental {
        session.run_incremental()?
    } else {
        session.run_full()?
    };

    if !cli.quiet && matches!(cli.format, OutputFormat::Terminal) {
        let mode = if outcome.incremental { "Incremental" } else { "Full" };
        println!(
            "{}",
            format!("{} shrink finished in {:.2?}", mode, start_time.elapsed()).green()
        );
    }
    Ok(outcome)
}

fn print_outcome(outcome: &RunOutcome, cli: &Cli) -> Result<()> {
    match cli.format {
        OutputFormat::Terminal => {
            if !cli.quiet {
                TerminalReporter::new()
                    .with_removed(cli.show_removed)
                    .report(&outcome.summary, &outcome.usage);
            }
            Ok(())
        }
        OutputFormat::Json => JsonReporter::new(cli.output.clone()).report(&outcome.summary, outcome.incremental),
    }
}

fn run_watch_mode(config: &Config, cli: &Cli) -> Result<()> {
    let roots: Vec<PathBuf> = config.streams.iter().map(|s| s.root.clone()).collect();
    let mut ignored = config.output_dirs();
    ignored.push(config.state_dir.clone());

    let watcher = ClassWatcher::new()
        .with_debounce_ms(cli.debounce_ms)
        .with_ignored_dirs(ignored);

    // The first pass honours --incremental, later passes always are
    let mut incremental = cli.incremental;
    watcher
        .watch(&roots, |_changed| {
            match run_once(config, incremental, cli).and_then(|outcome| print_outcome(&outcome, cli)) {
                Ok(()) => {
                    println!();
                    println!("{}", "Shrink complete. Waiting for changes...".green());
                }
                Err(e) => {
                    eprintln!("{}: {:?}", "Shrink error".red(), e);
                }
            }
            incremental = true;
            true
        })
        .map_err(|e| miette::miette!("Watch error: {}", e))?;

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        Config::from_default_locations(&cli.path)?
    };

    if let Some(state_dir) = &cli.state_dir {
        config.state_dir = state_dir.clone();
    }
    if let Some(threads) = cli.threads {
        config.threads = threads;
    }
    if !cli.exclude.is_empty() {
        config.exclude.extend(cli.exclude.clone());
    }

    config.validate()?;
    Ok(config)
}
