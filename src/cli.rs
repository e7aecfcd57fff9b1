use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use listing_draft::config::DEFAULT_NAMESPACE;
use listing_draft::metadata::{PKG_DESCRIPTION, PKG_NAME, PKG_VERSION};

#[derive(Parser, Debug, Clone)]
#[command(name = PKG_NAME)]
#[command(version = PKG_VERSION)]
#[command(about = PKG_DESCRIPTION, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArguments,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show whether a draft exists, its step, save count and completion
    Status,
    /// Print the stored draft
    Show,
    /// Export draft, metadata and history as JSON
    Export {
        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Import a previously exported JSON document
    Import {
        /// Path of the export document
        file: PathBuf,
    },
    /// List saved history entries, newest first
    History,
    /// Make a history entry the current draft again
    Restore {
        /// Position in the history list (0 is newest)
        index: usize,
    },
    /// Delete the draft, its metadata and history
    Clear,
    /// Validate the stored draft
    Validate {
        /// Validate only this step
        #[arg(long)]
        step: Option<u32>,
    },
    /// Print version information
    Version,
}

#[derive(Args, Debug, Clone)]
pub struct StoreArguments {
    /// Directory holding the draft records (defaults to the platform data dir)
    #[arg(long, env = "LISTING_DRAFT_STORE_DIR", global = true)]
    pub store_dir: Option<PathBuf>,

    /// Prefix of the storage keys
    #[arg(long, env = "LISTING_DRAFT_NAMESPACE", default_value = DEFAULT_NAMESPACE, global = true)]
    pub namespace: String,
}

impl StoreArguments {
    /// Validate CLI/environment-derived arguments.
    pub fn validate(&self) -> Result<(), String> {
        let namespace = self.namespace.trim();
        if namespace.is_empty() {
            return Err("LISTING_DRAFT_NAMESPACE cannot be empty".to_string());
        }
        if !namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        {
            return Err(format!(
                "Invalid LISTING_DRAFT_NAMESPACE '{namespace}': use letters, digits, '_' or '-'"
            ));
        }
        if let Some(dir) = &self.store_dir {
            if dir.is_file() {
                return Err(format!(
                    "Invalid LISTING_DRAFT_STORE_DIR '{}': not a directory",
                    dir.display()
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_store_arguments_after_subcommand() {
        let cli = Cli::try_parse_from([
            "listing-draft",
            "validate",
            "--step",
            "2",
            "--store-dir",
            "/tmp/drafts",
        ])
        .unwrap();
        assert_eq!(cli.store.store_dir, Some(PathBuf::from("/tmp/drafts")));
        assert!(matches!(cli.command, Command::Validate { step: Some(2) }));
    }

    #[test]
    fn rejects_odd_namespaces() {
        let args = StoreArguments {
            store_dir: None,
            namespace: "add eatery".into(),
        };
        assert!(args.validate().is_err());
        let args = StoreArguments {
            store_dir: None,
            namespace: "add_eatery".into(),
        };
        assert!(args.validate().is_ok());
    }
}
