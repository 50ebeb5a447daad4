use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::{Config, Settings};

#[derive(Parser)]
#[command(name = "pdfdeck")]
#[command(author, version, about)]
#[command(long_about = "Turn a PDF into a full-screen slide deck.\n\n\
    Each page is converted by a PDF conversion service and shown as a slide\n\
    you can step through with the wheel, swipes or the arrow keys.\n\n\
    Examples:\n  \
    pdfdeck                       Open the upload screen (fullscreen)\n  \
    pdfdeck talk.pdf --windowed   Convert and present in a window\n  \
    pdfdeck serve                 Run the upload/narration proxy\n  \
    pdfdeck convert talk.pdf      Convert from the terminal and summarize")]
#[command(propagate_version = true)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// PDF file to convert and present
    pub file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Launch in a window instead of fullscreen
    #[arg(long, global = false)]
    pub windowed: bool,

    /// Start on a specific slide once the deck is loaded (1-indexed)
    #[arg(long, global = false)]
    pub slide: Option<usize>,

    /// Color theme (dark or light)
    #[arg(long, global = false)]
    pub theme: Option<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP proxy in front of the conversion service and narration API
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
    },

    /// Convert a PDF and print a summary of the resulting slides
    Convert {
        /// PDF file to convert
        file: PathBuf,

        /// Print the raw conversion response as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and modify configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Display current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g. service.url, narration.enabled, defaults.theme)
        key: String,

        /// Value to set
        value: String,
    },
}

#[derive(Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    Powershell,
}

impl Cli {
    /// Default log filter for the chosen command and verbosity flags.
    /// `RUST_LOG` overrides this.
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 if matches!(self.command, Some(Commands::Serve { .. })) => "info",
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }

    pub fn run(self) -> anyhow::Result<()> {
        match self.command {
            Some(Commands::Config { command }) => crate::commands::config::run(command),
            Some(Commands::Completion { shell }) => {
                crate::commands::completion::run(shell);
                Ok(())
            }
            Some(Commands::Version) => {
                println!("pdfdeck {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
            Some(Commands::Serve { bind }) => {
                let settings = Settings::from_env(&Config::load_or_default());
                crate::commands::serve::run(settings, bind)
            }
            Some(Commands::Convert { file, json }) => {
                if !file.exists() {
                    anyhow::bail!("File not found: {}", file.display());
                }
                let settings = Settings::from_env(&Config::load_or_default());
                crate::commands::convert::run(&settings, &file, json, self.quiet)
            }
            None => {
                if let Some(file) = &self.file {
                    if !file.exists() {
                        anyhow::bail!("File not found: {}", file.display());
                    }
                }
                let settings = Settings::from_env(&Config::load_or_default());
                crate::app::run(settings, self.file, self.windowed, self.slide, self.theme)
            }
        }
    }
}
