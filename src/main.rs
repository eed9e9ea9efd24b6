mod audio;
mod builder;
mod catalog;
mod cli;
mod compiler;
mod config;
mod draft;
mod error;
mod export;
mod index;
mod journal;
mod localizer;
mod maintenance;
mod overlap;
mod probe;
mod text;
mod timerange;
mod tool_args;
mod tool_defs;
mod tool_exec;
mod track;
mod types;
mod util;
mod video;

use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, ConfigCommand};
use crate::config::{config_file_path, resolve_settings, save_settings};
use crate::draft::DraftStore;
use crate::maintenance::prune_index;
use crate::tool_defs::{tool_catalog_map, tool_definitions_json};
use crate::tool_exec::{call_tool, ToolResponse};

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints the response and maps failure to exit code 1.
fn finish(response: ToolResponse) -> Result<(), Box<dyn std::error::Error>> {
    print_json(&response)?;
    if !response.success {
        std::process::exit(1);
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = resolve_settings(cli.root, cli.output);

    match cli.command {
        Command::Config { command } => match command {
            ConfigCommand::Show => print_json(&settings),
            ConfigCommand::Init { force } => {
                let path = config_file_path(&settings.save_path);
                if path.exists() && !force {
                    eprintln!("Refusing to overwrite existing file: {}", path.display());
                    std::process::exit(2);
                }
                save_settings(&path, &settings)?;
                print_json(&json!({ "config": path }))
            }
        },

        Command::Tools { name: None } => print_json(&tool_definitions_json()),
        Command::Tools { name: Some(name) } => {
            let defs = tool_definitions_json();
            match tool_catalog_map(&defs).get(&name) {
                Some(def) => print_json(def),
                None => Err(format!("unknown tool: {name}").into()),
            }
        }

        command => {
            let store = DraftStore::open(settings)?;
            match command {
                Command::CreateDraft {
                    name,
                    width,
                    height,
                    fps,
                } => finish(call_tool(
                    &store,
                    "create_draft",
                    json!({ "draft_name": name, "width": width, "height": height, "fps": fps }),
                )),
                Command::AddTrack {
                    draft_id,
                    track_type,
                    name,
                } => finish(call_tool(
                    &store,
                    "create_track",
                    json!({ "draft_id": draft_id, "track_type": track_type, "track_name": name }),
                )),
                Command::DeleteTrack { draft_id, track } => finish(call_tool(
                    &store,
                    "delete_track",
                    json!({ "draft_id": draft_id, "track": track }),
                )),
                Command::ListTracks { draft_id } => {
                    finish(call_tool(&store, "list_tracks", json!({ "draft_id": draft_id })))
                }
                Command::Export { draft_id } => {
                    finish(call_tool(&store, "export_draft", json!({ "draft_id": draft_id })))
                }
                Command::FindEffects {
                    effect_type,
                    keyword,
                    vip,
                    limit,
                } => finish(call_tool(
                    &store,
                    "find_effects_by_type",
                    json!({ "effect_type": effect_type, "keyword": keyword, "is_vip": vip, "limit": limit }),
                )),
                Command::Call { tool, args } => {
                    let args: serde_json::Value = serde_json::from_str(&args)?;
                    finish(call_tool(&store, &tool, args))
                }
                Command::PruneIndex { dry_run } => print_json(&prune_index(&store, dry_run)?),
                Command::Config { .. } | Command::Tools { .. } => Ok(()),
            }
        }
    }
}
