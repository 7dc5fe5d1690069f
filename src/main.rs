mod compiler;
mod dataset;
mod kernel;
mod packets;
mod svg;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::builder::ValueHint;
use clap::{Parser, Subcommand};
use tempfile::NamedTempFile;
use tracing::info;
use tracing_subscriber::EnvFilter;

use compiler::Workspace;
use dataset::Dataset;
use kernel::config::{self, Config};
use kernel::{Node, Runtime, catalog};
use svg::SvgDocument;

#[derive(Parser, Debug)]
#[command(name = "chartly_rs", about = "Compile and run block-built chart programs")]
struct Args {
    /// Log at debug level (overrides CHARTLY_LOG and the config file)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile an editor workspace into a serialized program
    Compile {
        #[arg(value_name = "blocks", value_hint = ValueHint::FilePath)]
        blocks: PathBuf,
        #[arg(short, long, value_name = "program", value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },
    /// Run a serialized program and write the resulting SVG
    Run {
        #[arg(value_name = "program", value_hint = ValueHint::FilePath)]
        program: PathBuf,
        #[arg(short, long, value_name = "dataset", value_hint = ValueHint::FilePath)]
        data: Option<PathBuf>,
        #[arg(short, long, value_name = "svg", value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },
    /// Compile an editor workspace and run it in one go
    Render {
        #[arg(value_name = "blocks", value_hint = ValueHint::FilePath)]
        blocks: PathBuf,
        #[arg(short, long, value_name = "dataset", value_hint = ValueHint::FilePath)]
        data: Option<PathBuf>,
        #[arg(short, long, value_name = "svg", value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },
    /// List the available operations, or show the category of one
    Ops {
        #[arg(value_name = "opcode")]
        name: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = config::load(project_dir(&args.command).as_deref());
    init_logging(args.verbose, &cfg);

    match args.command {
        Command::Compile { blocks, output } => {
            let program = compile_file(&blocks)?;
            let json = program.as_ref().map(Node::to_json).unwrap_or_default();
            emit(output.as_deref(), &serde_json::to_string_pretty(&json)?)
        }
        Command::Run { program, data, output } => {
            let src = std::fs::read_to_string(&program)
                .with_context(|| format!("reading program {}", program.display()))?;
            let node = Node::parse(&src)?;
            let svg = render(node.as_ref(), data.as_deref(), cfg)?;
            emit(output.as_deref(), &svg)
        }
        Command::Render { blocks, data, output } => {
            let node = compile_file(&blocks)?;
            let svg = render(node.as_ref(), data.as_deref(), cfg)?;
            emit(output.as_deref(), &svg)
        }
        Command::Ops { name } => {
            list_ops(name.as_deref());
            Ok(())
        }
    }
}

// the config file is looked up next to the input
fn project_dir(command: &Command) -> Option<PathBuf> {
    let input = match command {
        Command::Compile { blocks, .. } | Command::Render { blocks, .. } => blocks,
        Command::Run { program, .. } => program,
        Command::Ops { .. } => return None,
    };
    input.parent().map(Path::to_path_buf)
}

fn init_logging(verbose: bool, cfg: &Config) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(cfg.log_level.as_deref().unwrap_or("warn"))
    };
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn compile_file(path: &Path) -> Result<Option<Node>> {
    let src = std::fs::read_to_string(path)
        .with_context(|| format!("reading workspace {}", path.display()))?;
    let program = Workspace::from_json(&src)?.compile()?;
    info!(path = %path.display(), empty = program.is_none(), "compiled workspace");
    Ok(program)
}

fn render(program: Option<&Node>, data: Option<&Path>, cfg: Config) -> Result<String> {
    let dataset = match data {
        Some(path) => Dataset::load(path)?,
        None => Dataset::default(),
    };
    let mut doc = SvgDocument::new(cfg.width, cfg.height);
    {
        let mut rt = Runtime::new(&mut doc, dataset, cfg);
        let last = rt.run(program)?;
        info!(result = %last.to_json(), frames = rt.scopes.depth(), "program finished");
    }
    doc.to_svg()
}

/// Write to `path` through a temp file in the same directory, or to stdout.
fn emit(path: Option<&Path>, contents: &str) -> Result<()> {
    let Some(path) = path else {
        print!("{contents}");
        return Ok(());
    };
    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.persist(path)?;
    info!(path = %path.display(), bytes = contents.len(), "wrote output");
    Ok(())
}

fn list_ops(name: Option<&str>) {
    if let Some(op) = name {
        match catalog::category_of(op) {
            Some(cat) => println!("{op}: {}", cat.label()),
            None => match catalog::suggest_opcode(op) {
                Some(hint) => println!("{op}: unknown (did you mean '{hint}'?)"),
                None => println!("{op}: unknown"),
            },
        }
        return;
    }
    for (label, ops) in catalog::palette() {
        println!("{label}: {}", ops.join(", "));
    }
}
