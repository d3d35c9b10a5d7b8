use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::fs;
use std::io::{stdin, stdout, Read, Write};
use std::path::PathBuf;
use wasm_scramble::{TierStrategy, WasmScramble};

/// A structure-aware WebAssembly test case scrambler.
///
/// `wasm-scramble` takes in an existing Wasm module and applies a
/// pseudo-random, format-aware perturbation to it, producing a new module
/// whose container structure is still internally consistent. The output can
/// be fed as a test input to your Wasm parser, validator, compiler, or any
/// other Wasm-consuming tool.
///
/// ## Example
///
/// Perform a random mutation on an existing Wasm module:
///
/// $ wasm-scramble ./input.wasm --seed 1234 -o output.wasm
///
/// ## Exit Codes
///
/// * 0: Success
///
/// * 1: An unexpected failure occurred.
///
/// * 4: The input could not be parsed as a Wasm module.
#[derive(Parser)]
#[command(version)]
struct Options {
    /// The input WebAssembly binary that will be mutated.
    ///
    /// `stdin` is used if this argument is not supplied.
    input: Option<PathBuf>,

    /// The output file path, where the new, mutated WebAssembly module is
    /// placed.
    ///
    /// `stdout` is used if this argument is not supplied.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// The RNG seed used to choose what to mutate.
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// How many mutation iterations to apply.
    #[arg(short = 'n', long, default_value_t = 1)]
    iterations: u32,

    /// How a granularity tier is chosen on each iteration.
    #[arg(long, value_enum, default_value = "uniform")]
    strategy: Strategy,

    /// Print iteration and failure tallies to stderr when done.
    #[arg(long)]
    stats: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    Uniform,
    Roulette,
    EpsilonGreedy,
    Thompson,
}

impl From<Strategy> for TierStrategy {
    fn from(strategy: Strategy) -> TierStrategy {
        match strategy {
            Strategy::Uniform => TierStrategy::Uniform,
            Strategy::Roulette => TierStrategy::Roulette(vec![1.0; 5]),
            Strategy::EpsilonGreedy => TierStrategy::EpsilonGreedy {
                epsilon: 0.1,
                adaptive: true,
            },
            Strategy::Thompson => TierStrategy::Thompson { adaptive: true },
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opts = Options::parse();

    let stdin = stdin();
    let (mut input, input_name): (Box<dyn Read>, _) = match &opts.input {
        Some(f) => {
            let input = Box::new(
                fs::File::open(f).with_context(|| format!("failed to open '{}'", f.display()))?,
            );
            (input, f.display().to_string())
        }
        None => {
            let input = Box::new(stdin.lock());
            (input, "<stdin>".to_string())
        }
    };

    let mut wasm = vec![];
    input
        .read_to_end(&mut wasm)
        .with_context(|| format!("failed to read '{}'", input_name))?;

    let mut scramble = WasmScramble::default();
    scramble
        .seed(opts.seed)
        .tier_strategy(opts.strategy.into());

    for iteration in 0..opts.iterations {
        wasm = match scramble.run(&wasm) {
            Ok(mutated) => mutated,
            Err(e) => {
                log::debug!("iteration {iteration} failed: {e}");
                eprintln!("{e}");
                std::process::exit(4);
            }
        };
    }

    if opts.stats {
        eprint!("{}", scramble.stats());
    }

    let stdout = stdout();
    let (mut output, output_name): (Box<dyn Write>, _) = match &opts.output {
        Some(f) => {
            let output = Box::new(
                fs::File::create(f)
                    .with_context(|| format!("failed to create '{}'", f.display()))?,
            );
            (output, f.display().to_string())
        }
        None => {
            let output = Box::new(stdout.lock());
            (output, "<stdout>".to_string())
        }
    };

    output
        .write_all(&wasm)
        .with_context(|| format!("failed to write to '{}'", output_name))?;

    Ok(())
}
