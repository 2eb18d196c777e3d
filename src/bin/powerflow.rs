use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use powerflow::{load_case, runpf, save_case, Alg, GenQLimits, MPOpt, PFOptBuilder, RLU};
use std::path::PathBuf;

/// Power flow simulation.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Power Flow
    #[clap(name = "pf")]
    PowerFlow(PfArgs),
}

#[derive(Args)]
struct PfArgs {
    /// The input case file (JSON)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file for the solved case
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Power flow algorithm (nr, fdxb, fdbx, gs or dc).
    #[arg(long)]
    alg: Option<Alg>,

    /// Termination tolerance on per unit P & Q mismatch.
    #[arg(long)]
    tol: Option<f64>,

    /// Maximum number of iterations.
    #[arg(long)]
    max_it: Option<usize>,

    /// Enforce gen reactive power limits at expense of |V|
    /// (off, simultaneous or one-at-a-time).
    #[arg(long)]
    qlim: Option<GenQLimits>,

    /// Print progress info, repeat for per-iteration output.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    let Commands::PowerFlow(args) = &cli.command;
    let level = match args.verbose {
        0 | 1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_level(false)
        .format_target(false)
        .format_timestamp(None)
        .init();

    match execute(&cli) {
        Ok(true) => {
            std::process::exit(0);
        }
        Ok(false) => {
            eprintln!("power flow did not converge");
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("error: {:#}", err);
            std::process::exit(2);
        }
    }
}

fn execute(cli: &Cli) -> Result<bool> {
    let Commands::PowerFlow(args) = &cli.command;

    let mpc = load_case(&args.input)?;

    let mut pf = PFOptBuilder::default();
    if let Some(alg) = args.alg {
        pf.algorithm(alg);
    }
    if let Some(tol) = args.tol {
        pf.tolerance(tol);
    }
    if let Some(max_it) = args.max_it {
        pf.max_it(Some(max_it));
    }
    if let Some(qlim) = args.qlim {
        pf.enforce_q_limits(qlim);
    }
    let mpopt = MPOpt {
        pf: pf.build()?,
        verbose: args.verbose as usize + 1,
    };

    let solver = RLU::default();

    let (mpc, success) = runpf(&mpc, &mpopt, &solver)?;

    if let Some(out_path) = &args.output {
        save_case(out_path, &mpc)?;
    }

    Ok(success)
}
