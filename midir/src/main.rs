//! midir CLI

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use midir::analysis::{compute_dominators, find_loops, format_loops, summarize_loops};
use midir::{Config, Function, OptLevel, OptimizationPipeline, Program};

#[derive(Parser)]
#[command(name = "midir", version, about = "Compiler middle-end IR toolkit")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the built-in sample functions
    List,
    /// Print the IR of the samples
    Dump {
        /// Include predecessor/successor sets
        #[arg(long)]
        cfg: bool,
        /// Only this function
        #[arg(short, long)]
        function: Option<String>,
    },
    /// Print dominator sets
    Dominators {
        #[arg(short, long)]
        function: Option<String>,
    },
    /// Print natural loops and their nesting
    Loops {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
        #[arg(short, long)]
        function: Option<String>,
    },
    /// Run the optimization pipeline and print the result
    Optimize {
        /// Overrides the level from the config file
        #[arg(short, long, value_enum)]
        level: Option<LevelArg>,
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        function: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LevelArg {
    Debug,
    Release,
}

impl From<LevelArg> for OptLevel {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Debug => OptLevel::Debug,
            LevelArg::Release => OptLevel::Release,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::List => list(),
        Command::Dump { cfg, function } => dump(cfg, function.as_deref()),
        Command::Dominators { function } => dominators(function.as_deref()),
        Command::Loops { json, function } => loops(json, function.as_deref()),
        Command::Optimize {
            level,
            config,
            function,
        } => optimize(level, config, function.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Sample functions, optionally narrowed to one by name
fn selected(program: &Program, name: Option<&str>) -> Result<Vec<Function>, Box<dyn std::error::Error>> {
    match name {
        None => Ok(program.functions().to_vec()),
        Some(name) => program
            .function_by_name(name)
            .map(|f| vec![f.clone()])
            .ok_or_else(|| format!("no sample function named `{name}`").into()),
    }
}

fn list() -> Result<(), Box<dyn std::error::Error>> {
    let program = midir::samples::program()?;
    for func in program.functions() {
        println!(
            "{:<24} {} blocks, {} instructions",
            func.name(),
            func.num_blocks(),
            func.num_insts()
        );
    }
    Ok(())
}

fn dump(with_cfg: bool, name: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let program = midir::samples::program()?;
    let mut selection = Program::new();
    for func in selected(&program, name)? {
        selection.push_function(func);
    }

    if with_cfg {
        println!("{}", selection.dump_with_cfg());
    } else {
        println!("{}", selection.dump());
    }
    Ok(())
}

fn dominators(name: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let program = midir::samples::program()?;

    for func in selected(&program, name)? {
        let doms = compute_dominators(&func);
        println!("Dominators for {}:", func.name());
        for (block, info) in func.blocks() {
            match doms.dominators(block) {
                Some(set) => {
                    let names: Vec<_> = set.iter().map(|&d| func.block_name(d)).collect();
                    println!("  {}: {}", info.name(), names.join(" "));
                }
                None => println!("  {}: (unreachable)", info.name()),
            }
        }
        println!();
    }
    Ok(())
}

fn loops(json: bool, name: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let program = midir::samples::program()?;
    let functions = selected(&program, name)?;

    if json {
        let report: Vec<_> = functions
            .iter()
            .map(|func| {
                serde_json::json!({
                    "function": func.name(),
                    "loops": summarize_loops(func, &find_loops(func)),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for func in &functions {
            print!("{}", format_loops(func, &find_loops(func)));
            println!();
        }
    }
    Ok(())
}

fn optimize(
    level: Option<LevelArg>,
    config: Option<PathBuf>,
    name: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(level) = level {
        config.opt.level = level.into();
    }

    let program = midir::samples::program()?;
    let mut selection = Program::new();
    for func in selected(&program, name)? {
        selection.push_function(func);
    }

    let pipeline = OptimizationPipeline::from_config(&config.opt);
    let stats = pipeline.optimize(&mut selection);

    println!("{}", selection.dump());
    let mut passes: Vec<_> = stats.pass_counts.iter().collect();
    passes.sort();
    println!("Iterations: {}", stats.iterations);
    for (pass, count) in passes {
        println!("  {pass}: {count}");
    }
    Ok(())
}
