use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "mediarelay")]
#[command(author, version, about = "Telegram bot that relays media downloaded with yt-dlp", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot (default)
    Run,

    /// Print the selectable formats of a URL without downloading
    Formats {
        /// Media URL (http or https)
        url: String,
    },

    /// Print the yt-dlp version and exit
    CheckBackend,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Subcommand to execute; `run` when none was given.
    pub fn command(&self) -> &Commands {
        self.command.as_ref().unwrap_or(&Commands::Run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_run() {
        let cli = Cli::try_parse_from(["mediarelay"]).unwrap();
        assert_eq!(cli.command(), &Commands::Run);
    }

    #[test]
    fn test_formats_takes_url() {
        let cli = Cli::try_parse_from(["mediarelay", "formats", "https://e.x/v"]).unwrap();
        assert_eq!(
            cli.command(),
            &Commands::Formats {
                url: "https://e.x/v".into()
            }
        );
    }

    #[test]
    fn test_check_backend() {
        let cli = Cli::try_parse_from(["mediarelay", "check-backend"]).unwrap();
        assert_eq!(cli.command(), &Commands::CheckBackend);
    }
}
