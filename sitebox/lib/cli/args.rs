use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::styles;

//-------------------------------------------------------------------------------------------------
// Types
//-------------------------------------------------------------------------------------------------

/// Sitebox CLI - Register a project directory as a sandboxed runtime and persist its files
#[derive(Debug, Parser)]
#[command(name = "sitebox", author, about, version, styles=styles::styles())]
pub struct SiteboxArgs {
    /// The subcommand to run
    #[command(subcommand)]
    pub subcommand: Option<SiteboxSubcommand>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum SiteboxSubcommand {
    /// Register a project directory with the backend and save its files
    #[command(name = "sync")]
    Sync {
        /// Directory served as the sandbox root
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        root: PathBuf,

        /// Project the runtime belongs to
        #[arg(short, long, value_name = "ID")]
        project: Option<String>,
    },

    /// Save a project directory into an existing runtime record
    #[command(name = "save")]
    Save {
        /// Directory served as the sandbox root
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        root: PathBuf,

        /// Id of the runtime record to save into
        #[arg(long, value_name = "ID")]
        runtime: String,
    },

    /// Print the snapshot that would be saved, as JSON
    #[command(name = "export")]
    Export {
        /// Directory served as the sandbox root
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        root: PathBuf,
    },

    /// Show a runtime record
    #[command(name = "get")]
    Get {
        /// Id of the runtime record
        #[arg(value_name = "ID")]
        id: String,
    },

    /// List the runtime records of a project
    #[command(name = "list")]
    List {
        /// Project whose records are listed
        #[arg(short, long, value_name = "ID")]
        project: Option<String>,
    },

    /// Delete a runtime record
    #[command(name = "delete")]
    Delete {
        /// Id of the runtime record
        #[arg(value_name = "ID")]
        id: String,
    },
}

//-------------------------------------------------------------------------------------------------
// Tests
//-------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_args_are_well_formed() {
        SiteboxArgs::command().debug_assert();
    }

    #[test]
    fn test_args_parse_sync() {
        let args = SiteboxArgs::parse_from(["sitebox", "sync", "--root", "site", "-p", "p1", "-v"]);
        assert!(args.verbose);
        match args.subcommand {
            Some(SiteboxSubcommand::Sync { root, project }) => {
                assert_eq!(root, PathBuf::from("site"));
                assert_eq!(project.as_deref(), Some("p1"));
            }
            other => panic!("unexpected subcommand: {other:?}"),
        }
    }

    #[test]
    fn test_args_save_requires_runtime() {
        assert!(SiteboxArgs::try_parse_from(["sitebox", "save"]).is_err());
    }
}
