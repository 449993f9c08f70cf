use anyhow::Context as _;
use clap::Parser;
use fsmc::compile::{compile_file, Artifacts, Compiled, OutputPaths};
use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
    time::Instant,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The directory where the generated files are written.
    /// Defaults to the directory of the input file.
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Only parse and validate the input, write nothing.
    #[arg(long)]
    check: bool,

    /// Do not generate the .dot file.
    #[arg(long)]
    no_graph: bool,

    /// The path of state machine definition file.
    input: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    tracing::debug!("parsed CLI args = {:?}", args);

    match process_file(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // compile diagnostics are already formatted as `path:line: message`.
            match err.downcast_ref::<fsmc::Error>() {
                Some(diag) => eprintln!("{}", diag),
                None => eprintln!("error: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}

fn process_file(args: &Args) -> anyhow::Result<()> {
    let s = Instant::now();
    let Compiled { in_file, artifacts } = compile_file(&args.input)?;
    tracing::info!("compile: {:?} elapsed", s.elapsed());

    if args.check {
        return Ok(());
    }

    let out_dir = args.out_dir.as_deref();
    if let Some(out_dir) = out_dir {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("failed to create {}", out_dir.display()))?;
    }
    let paths = OutputPaths::new(&in_file, out_dir)?;

    let s = Instant::now();
    write_outputs(&paths, &artifacts, !args.no_graph)?;
    tracing::info!("write outputs: {:?} elapsed", s.elapsed());

    Ok(())
}

fn write_outputs(paths: &OutputPaths, artifacts: &Artifacts, graph: bool) -> anyhow::Result<()> {
    write_output(&paths.header, &artifacts.header)?;
    write_output(&paths.source, &artifacts.source)?;
    if graph {
        write_output(&paths.graph, &artifacts.graph)?;
    }
    Ok(())
}

fn write_output(out_file: &Path, contents: &str) -> anyhow::Result<()> {
    if out_file.exists() {
        let mut backup_file = out_file.as_os_str().to_owned();
        backup_file.push(".bak");
        let backup_file = PathBuf::from(backup_file);
        fs::copy(out_file, &backup_file).with_context(|| {
            anyhow::anyhow!(
                "failed to backup the output file to {}",
                backup_file.display()
            )
        })?;
    }
    fs::write(out_file, contents)
        .with_context(|| anyhow::anyhow!("failed to write {}", out_file.display()))?;
    tracing::debug!("wrote {}", out_file.display());
    Ok(())
}
