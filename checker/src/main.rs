use clap::Parser;
use std::path::PathBuf;

use nsc::connect::{validate_against, ProposedEdge, ValidationResult};
use nsc::load::{load_path, SourceFormat};

#[derive(Debug, Clone, clap::ValueEnum)]
enum EmitStage {
    Summary,
    Json,
    Dot,
    Fingerprint,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum FormatArg {
    Json,
    Sketch,
}

impl From<FormatArg> for SourceFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Json => SourceFormat::Json,
            FormatArg::Sketch => SourceFormat::Sketch,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "nsc",
    version,
    about = "Neural Shape Checker — infers tensor shapes through a block graph and validates connections"
)]
struct Cli {
    /// Graph file (.json document or .ncg sketch)
    source: PathBuf,

    /// Input format (default: from the file extension)
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Summary)]
    emit: EmitStage,

    /// Check a proposed connection SRC[.HANDLE]=TGT[.HANDLE] (repeatable)
    #[arg(long = "connect", value_name = "EDGE")]
    connect: Vec<ProposedEdge>,

    /// Log engine activity to stderr
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "nsc=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if cli.verbose {
        eprintln!("nsc: source = {}", cli.source.display());
        eprintln!("nsc: emit   = {:?}", cli.emit);
    }

    // ── Load ──
    let graph = match load_path(&cli.source, cli.format.map(SourceFormat::from)) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("nsc: error: {}", e);
            for line in e.details() {
                eprintln!("{}", line);
            }
            std::process::exit(2);
        }
    };

    if cli.verbose {
        eprintln!(
            "nsc: loaded {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );
    }

    // ── Check ──
    let result = nsc::recompute(&graph);
    let checked: Vec<(ProposedEdge, ValidationResult)> = cli
        .connect
        .iter()
        .map(|p| (p.clone(), validate_against(&graph, &result, p)))
        .collect();

    // ── Emit ──
    match cli.emit {
        EmitStage::Summary => {
            print!("{}", nsc::report::render_summary(&graph, &result));
            for (proposal, verdict) in &checked {
                println!("{}", nsc::report::render_validation(proposal, verdict));
            }
        }
        EmitStage::Json => match nsc::report::render_json(&result, &checked) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("nsc: error: {}", e);
                std::process::exit(2);
            }
        },
        EmitStage::Dot => print!("{}", nsc::dot::emit_dot(&graph, &result)),
        EmitStage::Fingerprint => match result.fingerprint() {
            Ok(hex) => println!("{}", hex),
            Err(e) => {
                eprintln!("nsc: error: {}", e);
                std::process::exit(2);
            }
        },
    }

    let blocked = result.blocked().count();
    let rejected = checked.iter().filter(|(_, v)| !v.valid).count();
    if cli.verbose {
        eprintln!("nsc: {} blocked, {} rejected", blocked, rejected);
    }
    if blocked > 0 || rejected > 0 {
        std::process::exit(1);
    }
}
