use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "zipkit")]
#[command(version)]
#[command(about = "Create, list and extract ZIP archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipkit compress photos notes.txt -o backup.zip   pack two items into backup.zip\n  \
  zipkit list -v backup.zip                        show sizes and dates\n  \
  zipkit extract backup.zip -d out photos/         extract one folder's contents into out")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Narrate every added or extracted entry
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', global = true, action = clap::ArgAction::Count)]
    pub quiet: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List archive contents
    List {
        /// ZIP file path
        #[arg(value_name = "ZIP")]
        zip: PathBuf,

        /// Show sizes, compression ratio and timestamps
        #[arg(short = 'v')]
        long: bool,
    },

    /// Extract an archive, or selected entries from it
    Extract {
        /// ZIP file path
        #[arg(value_name = "ZIP")]
        zip: PathBuf,

        /// Entries to extract (default: all); a folder entry extracts its contents
        #[arg(value_name = "NAMES")]
        names: Vec<String>,

        /// Extract files into exdir (default: the archive's folder)
        #[arg(short = 'd', value_name = "DIR")]
        extract_dir: Option<PathBuf>,
    },

    /// Compress files and folders
    Compress {
        /// Files or folders to add; all must share one parent folder
        #[arg(value_name = "PATHS", required = true)]
        paths: Vec<PathBuf>,

        /// Output archive (default: <item>.zip, or <parent>.zip for several items)
        #[arg(short = 'o', value_name = "ZIP")]
        output: Option<PathBuf>,
    },
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Default `tracing` filter for the chosen verbosity
    pub fn log_filter(&self) -> &'static str {
        if self.is_very_quiet() {
            "off"
        } else if self.is_quiet() {
            "error"
        } else if self.verbose {
            "info"
        } else {
            "warn"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_extract_with_names() {
        let cli = Cli::parse_from(["zipkit", "extract", "a.zip", "-d", "out", "x.txt", "sub/"]);
        match cli.command {
            Command::Extract {
                zip,
                names,
                extract_dir,
            } => {
                assert_eq!(zip, PathBuf::from("a.zip"));
                assert_eq!(names, vec!["x.txt", "sub/"]);
                assert_eq!(extract_dir, Some(PathBuf::from("out")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn quiet_flags_lower_the_filter() {
        let cli = Cli::parse_from(["zipkit", "-qq", "list", "a.zip"]);
        assert_eq!(cli.log_filter(), "off");
        let cli = Cli::parse_from(["zipkit", "list", "a.zip", "--verbose"]);
        assert_eq!(cli.log_filter(), "info");
    }

    #[test]
    fn compress_requires_paths() {
        assert!(Cli::try_parse_from(["zipkit", "compress"]).is_err());
    }
}
