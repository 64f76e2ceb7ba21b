use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{BufWriter, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod model;
mod render;
mod sample;
mod symbols;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "callcount-report")]
#[command(about = "Symbolized function call-count report", long_about = None)]
struct Cli {
    /// Instrumented binary, built with debug info.
    #[arg(long)]
    binary: PathBuf,

    /// Raw count file (`<address> <count> <thread>` per line).
    #[arg(long)]
    input: PathBuf,

    /// Report output file.
    #[arg(long)]
    output: PathBuf,

    /// Sum all threads into a single table.
    #[arg(long)]
    sum: bool,

    /// One table per thread.
    #[arg(long)]
    threaded: bool,

    /// Also write the ranked report as JSON.
    #[arg(long)]
    json: Option<PathBuf>,

    /// addr2line-compatible tool used for symbol lookup.
    #[arg(long, default_value = "addr2line")]
    resolver: PathBuf,

    /// Print mangled names.
    #[arg(long)]
    no_demangle: bool,

    /// Strip directories from file names.
    #[arg(long)]
    basenames: bool,

    /// Seconds to wait for the resolver; 0 waits forever.
    #[arg(long, default_value_t = 60)]
    resolver_timeout: u64,

    #[arg(long, value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    /// Whether log lines on stderr may carry ANSI escapes.
    fn ansi_logs(self, stderr_is_terminal: bool) -> bool {
        match self {
            ColorChoice::Auto => stderr_is_terminal,
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(cli.color.ansi_logs(std::io::stderr().is_terminal()))
        .init();

    // 1) Validate mode before touching any file.
    let mode = model::Mode::from_flags(cli.sum, cli.threaded)?;

    match cli.color {
        ColorChoice::Auto => {}
        ColorChoice::Always => colored::control::set_override(true),
        ColorChoice::Never => colored::control::set_override(false),
    }

    // 2) Parse + aggregate samples.
    let partitions = model::aggregate(mode, sample::read_samples(&cli.input)?)?;

    // 3) Resolve every address in one batch.
    let timeout = (cli.resolver_timeout > 0).then(|| Duration::from_secs(cli.resolver_timeout));
    let resolver = symbols::Addr2Line::new(&cli.resolver)?
        .demangle(!cli.no_demangle)
        .basenames(cli.basenames)
        .timeout(timeout);
    let table = symbols::build_symbol_table(&resolver, &cli.binary, &partitions);

    // 4) Rank + render.
    let reports: Vec<model::PartitionReport> = partitions
        .iter()
        .map(|p| model::rank(p, &table))
        .collect();

    let file = File::create(&cli.output)
        .with_context(|| format!("create report file {}", cli.output.display()))?;
    render::write_report(&mut BufWriter::new(file), &mut std::io::stdout().lock(), &reports)
        .with_context(|| format!("write report {}", cli.output.display()))?;

    if let Some(json) = &cli.json {
        render::write_json_report(
            json,
            &render::JsonReport {
                binary: &cli.binary,
                mode,
                partitions: &reports,
            },
        )?;
    }

    println!("Report saved to {}", cli.output.display());
    Ok(())
}
