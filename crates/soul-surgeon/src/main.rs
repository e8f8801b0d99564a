//! Canonicalize an expression and report its soul and cost change.
//!
//! Reads stdin when no file is given. Exits 1 when the soul is provisional or
//! optimization changed it.

mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use soul_core::EngineConfig;
use soul_ir::{parse, print, ExprArena, OptimizationReport, SoulHasher};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "soul-surgeon")]
#[command(version, about = "Optimize an expression without changing its soul")]
struct Cli {
    /// Engine configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also write the report as JSON to this path
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Expression file; stdin when omitted
    input: Option<PathBuf>,
}

/// Result of one surgery
#[derive(Debug, Serialize)]
struct Outcome {
    /// The term the report's costs describe
    optimized: String,
    #[serde(flatten)]
    report: OptimizationReport,
    provisional: bool,
    /// The optimized term has the input's soul
    preserved: bool,
}

impl Outcome {
    fn success(&self) -> bool {
        self.preserved && !self.provisional
    }
}

fn operate(source: &str, config: &EngineConfig) -> Result<Outcome> {
    let mut arena = ExprArena::new();
    let root = parse(&mut arena, source)?;
    let hasher = SoulHasher::new(config.soul.clone());

    let before = hasher.soul(&mut arena, root);
    debug!(soul = %before.id, provisional = before.provisional, "input hashed");

    let optimized = hasher.optimize(&mut arena, root);
    let after = hasher.soul(&mut arena, optimized.result);

    let size = arena.tree_size(optimized.result);
    let term = if size > config.soul.max_tree_size {
        format!("<{} nodes>", size)
    } else {
        print(&arena, optimized.result)
    };

    Ok(Outcome {
        optimized: term,
        preserved: after.id == before.id,
        provisional: before.provisional || after.provisional,
        report: OptimizationReport::new(&optimized, after.id),
    })
}

fn read_source(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .context("failed to read stdin")?;
            Ok(source)
        }
    }
}

fn write_report(path: &Path, outcome: &Outcome) -> Result<()> {
    let json = serde_json::to_string_pretty(outcome)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    debug!(path = %path.display(), "report written");
    Ok(())
}

fn run(cli: Cli) -> Result<bool> {
    let config = EngineConfig::load(cli.config.as_deref())?;
    let source = read_source(cli.input.as_ref())?;

    let outcome = operate(&source, &config)?;
    println!("Optimized: {}", outcome.optimized);
    print!("{}", outcome.report);

    if let Some(path) = &cli.report {
        write_report(path, &outcome)?;
    }

    if outcome.provisional {
        warn!("soul is provisional; limits were reached before a fixpoint");
    }
    if !outcome.preserved {
        error!("optimization changed the soul");
    }
    info!(soul = %outcome.report.semantic_hash, "surgery complete");
    Ok(outcome.success())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = telemetry::init_telemetry() {
        eprintln!("failed to initialize logging: {:#}", e);
    }

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use soul_core::SoulConfig;

    #[test]
    fn test_cli_arguments() {
        Cli::command().debug_assert();

        let cli = Cli::try_parse_from(["soul-surgeon"]).unwrap();
        assert!(cli.config.is_none() && cli.report.is_none() && cli.input.is_none());

        let cli = Cli::try_parse_from([
            "soul-surgeon",
            "--config",
            "engine.json",
            "-r",
            "report.json",
            "gene.sx",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("engine.json")));
        assert_eq!(cli.report, Some(PathBuf::from("report.json")));
        assert_eq!(cli.input, Some(PathBuf::from("gene.sx")));

        assert!(Cli::try_parse_from(["soul-surgeon", "--config"]).is_err());
        assert!(Cli::try_parse_from(["soul-surgeon", "--verbose"]).is_err());
        assert!(Cli::try_parse_from(["soul-surgeon", "a", "b"]).is_err());
    }

    #[test]
    fn test_map_fusion_report() {
        let outcome = operate("(map f (map g xs))", &EngineConfig::default()).unwrap();
        assert!(outcome.success());
        assert_eq!(outcome.optimized, "(map (compose f g) xs)");

        let lines = outcome.report.lines();
        assert!(lines[0].starts_with("Semantic hash: λ"));
        assert_eq!(lines[1], "Initial cost: 9");
        assert_eq!(lines[2], "Final cost: 7");
        assert_eq!(lines[3], "Speedup: 1.29x");
        assert!(lines[4].starts_with("Iterations: "));
        assert_eq!(lines[5], "Rules applied: map_fusion (1)");
    }

    #[test]
    fn test_beta_then_rewrite() {
        let outcome = operate("((lam x (add x 4)) 3)", &EngineConfig::default()).unwrap();
        assert!(outcome.success());
        assert_eq!(outcome.optimized, "7");
        assert_eq!(outcome.report.final_cost, 1);
    }

    #[test]
    fn test_printed_term_matches_report() {
        // Canonical form costs more than the input, so the input is kept
        let outcome = operate(
            "((lam x (add x (add x x))) (map f xs))",
            &EngineConfig::default(),
        )
        .unwrap();
        assert!(outcome.success());
        assert_eq!(outcome.optimized, "((lam x0 (add x0 (add x0 x0))) (map f xs))");
        assert_eq!(outcome.report.initial_cost, outcome.report.final_cost);
        assert_eq!(outcome.report.rules_summary(), "none");
    }

    #[test]
    fn test_divergent_input_fails() {
        let config = EngineConfig {
            soul: SoulConfig {
                normalize_budget: 50,
                max_rounds: 2,
                max_passes: 8,
                ..SoulConfig::default()
            },
            ..EngineConfig::default()
        };
        let outcome = operate("((lam x (x x)) (lam x (x x)))", &config).unwrap();
        assert!(outcome.provisional);
        assert!(!outcome.success());
    }

    #[test]
    fn test_json_report() {
        let outcome = operate("(map f (map g xs))", &EngineConfig::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_report(&path, &outcome).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains('\n'));
        let json: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(json["optimized"], "(map (compose f g) xs)");
        assert_eq!(json["initial_cost"], 9);
        assert_eq!(json["final_cost"], 7);
        assert_eq!(json["rules_applied"]["map_fusion"], 1);
        assert_eq!(json["preserved"], true);
    }

    #[test]
    fn test_parse_error() {
        assert!(operate("(map f", &EngineConfig::default()).is_err());
    }
}
