use anyhow::{bail, Context};
use chrono::Utc;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde_json::json;
use skill_core::{EngineConfig, MemoryGraphStore, ReplayOracle, SkillTreeService};
use skill_graph::subtree::{ancestors, subtree};
use skill_graph::{check_forest, Graph, GraphId, GraphSnapshot, NodeId, UserId};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn snapshot_arg() -> Arg {
    Arg::new("snapshot")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Graph snapshot JSON file ({\"nodes\": [...], \"edges\": [...]})")
}

fn cli() -> Command {
    Command::new("skilltree")
        .version(skill_core::VERSION)
        .about("Skill tree engine tools over JSON graph snapshots")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML engine configuration"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .help("Log filter, overrides RUST_LOG"),
        )
        .subcommand(
            Command::new("layout")
                .about("Assign positions to every node")
                .arg(snapshot_arg())
                .arg(
                    Arg::new("report")
                        .long("report")
                        .action(ArgAction::SetTrue)
                        .help("Print the strategy used and the closest node pair"),
                ),
        )
        .subcommand(
            Command::new("unlock")
                .about("List lock-state changes")
                .arg(snapshot_arg()),
        )
        .subcommand(
            Command::new("check")
                .about("Report single-parent and single-center violations")
                .arg(snapshot_arg()),
        )
        .subcommand(
            Command::new("goal")
                .about("Replay a recorded oracle response as a goal resolution")
                .arg(snapshot_arg())
                .arg(
                    Arg::new("goal")
                        .long("goal")
                        .required(true)
                        .help("Goal text"),
                )
                .arg(
                    Arg::new("response")
                        .long("response")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("File holding the oracle's raw response"),
                ),
        )
        .subcommand(
            Command::new("subtree")
                .about("List a node's subtree and ancestors")
                .arg(snapshot_arg())
                .arg(
                    Arg::new("node")
                        .long("node")
                        .required(true)
                        .value_parser(value_parser!(NodeId))
                        .help("Root node id"),
                ),
        )
}

fn init_tracing(level: Option<&String>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_snapshot(path: &Path) -> anyhow::Result<GraphSnapshot> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing snapshot {}", path.display()))
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn snapshot_path(args: &ArgMatches) -> anyhow::Result<&PathBuf> {
    args.get_one::<PathBuf>("snapshot").context("missing snapshot path")
}

async fn replay_goal(config: EngineConfig, args: &ArgMatches) -> anyhow::Result<()> {
    let snapshot = read_snapshot(snapshot_path(args)?)?;
    let goal = args.get_one::<String>("goal").context("missing --goal")?;
    let response_path = args.get_one::<PathBuf>("response").context("missing --response")?;
    let response = std::fs::read_to_string(response_path)
        .with_context(|| format!("reading {}", response_path.display()))?;

    let graph_id = snapshot.nodes.first().map_or_else(GraphId::new, |n| n.graph_id);
    let user = UserId::new();
    let now = Utc::now();
    let graph = Graph {
        id: graph_id,
        user_id: user,
        version: 1,
        created_at: now,
        updated_at: now,
    };

    let store = Arc::new(MemoryGraphStore::from_snapshot(graph, snapshot));
    let service = SkillTreeService::new(store, Arc::new(ReplayOracle::new([response])), config);
    let outcome = match service.resolve_goal(user, graph_id, goal).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Goal resolution failed ({}): {}", e.status_code(), e);
            bail!("{}", e.user_message());
        }
    };
    let snapshot = service.snapshot(graph_id).await?;

    print_json(&json!({
        "goal": outcome.goal,
        "goalNode": outcome.goal_node,
        "currentNode": outcome.current_node,
        "createdNewCenter": outcome.created_new_center(),
        "newNodes": outcome.new_nodes(),
        "pathStepsCount": outcome.path_steps,
        "skippedSteps": outcome.skipped_steps,
        "reasoning": outcome.reasoning,
        "snapshot": snapshot,
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_one::<String>("log-level"));

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => EngineConfig::load(path)?,
        None => {
            let mut config = EngineConfig::default();
            config.apply_env_overrides()?;
            config
        }
    };

    match matches.subcommand() {
        Some(("layout", args)) => {
            let snapshot = read_snapshot(snapshot_path(args)?)?;
            let outcome = config
                .layout_engine()
                .layout_with_report(&snapshot.nodes, &snapshot.edges);
            if args.get_flag("report") {
                print_json(&json!({
                    "strategy": outcome.strategy,
                    "minPairwiseDistance": skill_graph::layout::min_pairwise_distance(&outcome.nodes),
                    "nodes": outcome.nodes,
                }))?;
            } else {
                print_json(&outcome.nodes)?;
            }
        }
        Some(("unlock", args)) => {
            let snapshot = read_snapshot(snapshot_path(args)?)?;
            let report = config.unlock_engine().compute(&snapshot.nodes, &snapshot.edges);
            print_json(&json!({
                "updatedCount": report.updates.len(),
                "updates": report.updates,
                "newlyUnlocked": report.newly_unlocked,
            }))?;
        }
        Some(("check", args)) => {
            let snapshot = read_snapshot(snapshot_path(args)?)?;
            let violations = check_forest(&snapshot.nodes, &snapshot.edges);
            print_json(&violations)?;
            if !violations.is_empty() {
                std::process::exit(1);
            }
        }
        Some(("goal", args)) => replay_goal(config, args).await?,
        Some(("subtree", args)) => {
            let snapshot = read_snapshot(snapshot_path(args)?)?;
            let node = *args.get_one::<NodeId>("node").context("missing --node")?;
            if snapshot.node(node).is_none() {
                bail!("node {node} is not in the snapshot");
            }
            print_json(&json!({
                "subtree": subtree(node, &snapshot.edges),
                "ancestors": ancestors(node, &snapshot.edges),
            }))?;
        }
        _ => cli().print_help()?,
    }

    Ok(())
}
