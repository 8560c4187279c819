//! Permnode CLI
//!
//! Builds a permission collection from `--grant` flags and an optional JSON
//! file, then runs one operation against it.
//!
//! # Usage
//!
//! ```bash
//! permnode -g 'chat.*' -g '-chat.ban.*' check chat.ban.user
//! permnode --file perms.json --json clean
//! ```
//!
//! `check` exits with 0 for allow, 1 for deny and 2 for unknown.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use permnode::{Insertable, Outcome, Permission, PermissionCollection, PermissionEntry};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "permnode")]
#[command(about = "Evaluate and reshape permission node sets")]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Owner recorded on the collection
    #[arg(long, default_value = "cli")]
    owner: String,

    /// Permission to add; prefix with '-' to negate. Repeatable.
    #[arg(short, long = "grant", value_name = "PERMISSION", allow_hyphen_values = true)]
    grants: Vec<String>,

    /// JSON file holding an array of entries
    #[arg(short, long)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a permission to allow, deny or unknown
    Check {
        #[arg(allow_hyphen_values = true)]
        probe: String,
    },
    /// Print the entries with duplicates and subsumed entries removed
    Clean,
    /// Print the entries in canonical order
    Sort,
    /// Print the entries with every sign flipped
    Inverse,
    /// Print the entries with every leaf broadened to its parent group
    ForceGroup,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let filter = if args.verbose {
        "permnode=trace,permnode_cli=debug"
    } else {
        "permnode=warn,permnode_cli=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let collection = load(&args)?;
    info!(owner = collection.owner(), entries = collection.len(), "loaded collection");

    match &args.command {
        Command::Check { probe } => {
            let probe =
                Permission::parse(probe).with_context(|| format!("invalid probe {probe:?}"))?;
            let outcome = collection.evaluate(&probe);
            debug!(%probe, matched = ?collection.find(&probe).map(ToString::to_string), "checked");
            if args.json {
                let report = serde_json::json!({
                    "probe": probe.to_string(),
                    "outcome": outcome.to_string(),
                });
                println!("{report}");
            } else {
                println!("{outcome}");
            }
            return Ok(exit_code(outcome));
        }
        Command::Clean => print_entries(&collection.cleaned(), args.json)?,
        Command::Sort => print_entries(&collection.sorted(), args.json)?,
        Command::Inverse => print_entries(&collection.inverted(), args.json)?,
        Command::ForceGroup => print_entries(&collection.forced_groups(), args.json)?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Builds the collection: file entries first, then `--grant` flags in order.
fn load(args: &Args) -> Result<PermissionCollection> {
    let mut items: Vec<Insertable> = Vec::new();
    if let Some(path) = &args.file {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        items.extend(parse_entries(&text)?.into_iter().map(Insertable::from));
    }
    items.extend(args.grants.iter().map(|grant| Insertable::from(grant.as_str())));

    let (collection, failed) = PermissionCollection::seeded(args.owner.clone(), items);
    if !failed.is_empty() {
        bail!("invalid permission(s): {}", failed.join(", "));
    }
    Ok(collection)
}

fn parse_entries(json: &str) -> Result<Vec<PermissionEntry>> {
    serde_json::from_str(json).context("expected a JSON array of permission entries")
}

fn print_entries(entries: &[PermissionEntry], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
    } else {
        for entry in entries {
            println!("{entry}");
        }
    }
    Ok(())
}

fn exit_code(outcome: Outcome) -> ExitCode {
    match outcome {
        Outcome::Allow => ExitCode::SUCCESS,
        Outcome::Deny => ExitCode::from(1),
        Outcome::Unknown => ExitCode::from(2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_negated_grants() {
        let args = Args::try_parse_from([
            "permnode", "-g", "chat.*", "--grant", "-chat.ban.*", "check", "chat.ban.user",
        ])
        .unwrap();
        assert_eq!(args.grants, vec!["chat.*", "-chat.ban.*"]);
        assert!(matches!(args.command, Command::Check { ref probe } if probe == "chat.ban.user"));
    }

    #[test]
    fn test_load_from_grants() {
        let args = Args::try_parse_from(["permnode", "-g", "a.*", "-g", "-a.b", "sort"]).unwrap();
        let collection = load(&args).unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.owner(), "cli");
    }

    #[test]
    fn test_load_rejects_invalid_grants() {
        let args = Args::try_parse_from(["permnode", "-g", "nope", "clean"]).unwrap();
        let err = load(&args).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_parse_entries() {
        let entries =
            parse_entries(r#"["a.b", "-c.*", {"cluster": "mods", "children": ["x.y"]}]"#).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries[2].is_cluster());
        assert!(parse_entries(r#"{"a": 1}"#).is_err());
    }
}
