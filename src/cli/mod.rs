//! Command-line interface for Lintara.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Lintara - AI-assisted code review service
#[derive(Parser)]
#[command(name = "lintara")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server (default)
    #[command(alias = "web")]
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Review a single file and print the result
    Review {
        /// Source file to review
        file: PathBuf,

        /// Language tag sent to the reviewer (defaults to the file extension)
        #[arg(long, short)]
        language: Option<String>,
    },
}

/// Language tag for `lintara review` when none is given.
#[must_use]
pub fn language_for(file: &Path) -> String {
    match file.extension().and_then(|ext| ext.to_str()) {
        Some("py") => "python".to_string(),
        Some("rs") => "rust".to_string(),
        Some("js" | "mjs" | "cjs") => "javascript".to_string(),
        Some("ts" | "tsx") => "typescript".to_string(),
        Some("rb") => "ruby".to_string(),
        Some("kt") => "kotlin".to_string(),
        Some("cs") => "csharp".to_string(),
        Some("sh") => "bash".to_string(),
        Some(ext) => ext.to_ascii_lowercase(),
        None => "text".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_none() {
        let cli = Cli::try_parse_from(["lintara"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_parse_review() {
        let cli = Cli::try_parse_from(["lintara", "review", "main.py", "--language", "py3"]).unwrap();

        match cli.command {
            Some(Commands::Review { file, language }) => {
                assert_eq!(file, PathBuf::from("main.py"));
                assert_eq!(language.as_deref(), Some("py3"));
            }
            _ => panic!("expected review command"),
        }
    }

    #[test]
    fn test_language_from_extension() {
        assert_eq!(language_for(Path::new("a/b/main.py")), "python");
        assert_eq!(language_for(Path::new("lib.rs")), "rust");
        assert_eq!(language_for(Path::new("main.GO")), "go");
        assert_eq!(language_for(Path::new("Makefile")), "text");
    }
}
