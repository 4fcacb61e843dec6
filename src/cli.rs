//! CLI argument parsing for the leadport-worker binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "leadport-worker", about = "Leadport CRM bulk lead import worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Import a lead file directly into the database and print the result
    Import {
        /// Path to a .xlsx, .xlsm, .csv or .txt file
        #[arg(long)]
        file: PathBuf,
        /// Email of the user the leads are created by
        #[arg(long)]
        user_email: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_migrate_command_parses() {
        let cli = Cli::parse_from(["leadport-worker", "migrate"]);
        assert!(matches!(cli.command, Some(Command::Migrate)));
    }

    #[test]
    fn test_cli_no_command_defaults_to_none() {
        let cli = Cli::parse_from(["leadport-worker"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_import_command_parses() {
        let cli = Cli::parse_from([
            "leadport-worker",
            "import",
            "--file",
            "march.xlsx",
            "--user-email",
            "priya@consult.in",
        ]);
        match cli.command {
            Some(Command::Import { file, user_email }) => {
                assert_eq!(file, PathBuf::from("march.xlsx"));
                assert_eq!(user_email, "priya@consult.in");
            }
            _ => panic!("expected import command"),
        }
    }

    #[test]
    fn test_cli_import_requires_file() {
        assert!(Cli::try_parse_from(["leadport-worker", "import", "--user-email", "a@b.c"]).is_err());
    }
}
