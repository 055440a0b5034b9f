//! CLI argument parsing

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "optusb")]
#[command(
    author,
    version,
    about = "Multiboot program downloader for the optimize USB-GBA bootcable",
    long_about = None
)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Multiboot program image to send (at most 256 KiB)
    #[arg(value_name = "MB_FILE", required_unless_present = "list")]
    pub file: Option<PathBuf>,

    /// List connected bootcables and exit
    #[arg(long, conflicts_with = "file")]
    pub list: bool,

    /// Which bootcable to use when several are connected (0-indexed)
    #[arg(long, default_value_t = 0)]
    pub index: usize,

    /// Run against the in-memory cable emulator instead of real hardware
    #[cfg(feature = "dummy")]
    #[arg(long)]
    pub dummy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_file_required_without_list() {
        assert!(Cli::try_parse_from(["optusb"]).is_err());

        let cli = Cli::try_parse_from(["optusb", "--list"]).unwrap();
        assert!(cli.list);
        assert!(cli.file.is_none());
    }

    #[test]
    fn test_load_arguments() {
        let cli = Cli::try_parse_from(["optusb", "-vv", "--index", "1", "game.mb"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.index, 1);
        assert_eq!(cli.file, Some(PathBuf::from("game.mb")));
    }

    #[test]
    fn test_list_conflicts_with_file() {
        assert!(Cli::try_parse_from(["optusb", "--list", "game.mb"]).is_err());
    }
}
