use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "draftvault")]
#[command(about = "Journaled video-draft builder with replay export", long_about = None)]
#[command(version)]
pub(crate) struct Cli {
    /// Save root holding journals, materials and the ID index.
    #[arg(long, global = true)]
    pub(crate) root: Option<PathBuf>,
    /// Directory compiled drafts are written into.
    #[arg(long, global = true)]
    pub(crate) output: Option<PathBuf>,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Create an empty draft and print its id.
    CreateDraft {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        #[arg(long)]
        fps: Option<u32>,
    },

    /// Add a video, audio or text track.
    AddTrack {
        draft_id: String,
        /// video | audio | text
        track_type: String,
        #[arg(long)]
        name: Option<String>,
    },

    /// Remove a track by name or id.
    DeleteTrack { draft_id: String, track: String },

    ListTracks { draft_id: String },

    /// Replay journals into `<output>/<draft name>`.
    Export { draft_id: String },

    /// Search the effect catalog.
    FindEffects {
        /// Catalog kind, e.g. TransitionType or FilterType
        effect_type: String,
        keyword: Option<String>,
        #[arg(long)]
        vip: Option<bool>,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Print the tool definitions as JSON, or one definition by name.
    Tools { name: Option<String> },

    /// Invoke a tool with a JSON argument object.
    Call {
        tool: String,
        /// JSON object, e.g. '{"draft_id":"..."}'
        #[arg(default_value = "{}")]
        args: String,
    },

    /// Drop index rows for drafts whose folder is gone.
    PruneIndex {
        #[arg(long)]
        dry_run: bool,
    },

    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigCommand {
    /// Print the effective settings.
    Show,
    /// Write the effective settings to `config.json` under the save root.
    Init {
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["draftvault", "export", "abc", "--root", "/tmp/r"]).unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/r")));
        assert!(matches!(cli.command, Command::Export { draft_id } if draft_id == "abc"));
    }

    #[test]
    fn test_call_defaults_to_empty_object() {
        let cli = Cli::try_parse_from(["draftvault", "call", "rules"]).unwrap();
        match cli.command {
            Command::Call { tool, args } => {
                assert_eq!(tool, "rules");
                assert_eq!(args, "{}");
            }
            _ => panic!("expected call"),
        }
    }
}
