// cli/src/main.rs
use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

mod commands;
mod types;
mod utils;

#[cfg(test)]
mod tests;

use commands::SafeOptions;
use types::CommandOutput;

const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// DigitalSafe - encrypted notes, passwords and files
#[derive(Parser)]
#[command(name = "digitalsafe")]
#[command(version)]
#[command(author = "Mason Parle")]
#[command(about = "Passphrase locked store for notes, passwords and files")]
#[command(
    long_about = "Keeps notes, password entries and files in a single container encrypted with three AES-128-CBC layers derived from one passphrase"
)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output (repeat for more detail)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Enable JSON output for programmatic usage
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    safe: SafeArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct SafeArgs {
    /// Container file holding the safe
    #[arg(
        short,
        long,
        global = true,
        env = "DIGITALSAFE_PATH",
        default_value = "digitalSafe.safe",
        value_hint = ValueHint::FilePath
    )]
    safe: PathBuf,

    /// Seconds the passphrase stays unlocked (1 to one year)
    #[arg(
        long,
        global = true,
        env = "DIGITALSAFE_TTL",
        default_value_t = 600,
        value_parser = clap::value_parser!(u64).range(1..=MAX_TTL_SECS)
    )]
    ttl: u64,

    /// Safe passphrase (prompted for when absent)
    #[arg(
        short,
        long,
        global = true,
        env = "DIGITALSAFE_PASSPHRASE",
        hide_env_values = true
    )]
    passphrase: Option<String>,

    /// Non-interactive mode (don't prompt for missing values)
    #[arg(short, long, global = true)]
    non_interactive: bool,
}

impl From<SafeArgs> for SafeOptions {
    fn from(args: SafeArgs) -> Self {
        Self {
            path: args.safe,
            ttl_secs: args.ttl,
            passphrase: args.passphrase,
            non_interactive: args.non_interactive,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create the safe or check its passphrase
    Init,

    /// Store and read notes
    #[command(subcommand)]
    Note(NoteCommands),

    /// Store and read password entries
    #[command(subcommand)]
    Password(PasswordCommands),

    /// Store, export and list files
    #[command(subcommand)]
    File(FileCommands),

    /// Show commit count and stored file count
    Status,

    /// Erase every record in the safe
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum NoteCommands {
    /// Store a note, replacing one with the same title
    Put {
        /// Note title, unique ignoring case
        title: String,

        /// Note text (prompted for when absent)
        #[arg(short, long)]
        message: Option<String>,

        /// Comma separated tags
        #[arg(short, long)]
        tags: Option<String>,
    },

    /// Show a note by title
    Get { title: String },

    /// Find notes containing the query text
    Search { query: String },
}

#[derive(Subcommand)]
enum PasswordCommands {
    /// Store a password entry
    Put {
        /// Entry title, unique ignoring case
        title: String,

        #[arg(short, long)]
        username: Option<String>,

        #[arg(long)]
        url: Option<String>,

        /// Password to store (prompted for when absent)
        #[arg(long)]
        password: Option<String>,
    },

    /// Show a password entry by title
    Get {
        title: String,

        /// Include the stored password in the output
        #[arg(long)]
        show: bool,
    },
}

#[derive(Subcommand)]
enum FileCommands {
    /// Copy a file into the safe
    Put {
        #[arg(value_hint = ValueHint::FilePath)]
        path: PathBuf,

        /// Free text kept alongside the file
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Export a stored file
    Get {
        /// Stored file name
        name: String,

        /// Destination (defaults to the stored name)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,

        /// Force overwrite if output file exists
        #[arg(short, long)]
        force: bool,
    },

    /// List stored files
    List,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Diagnostics go to stderr so JSON output on stdout stays parseable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(command: Commands, options: &SafeOptions) -> anyhow::Result<CommandOutput> {
    match command {
        Commands::Init => commands::init(options),
        Commands::Note(NoteCommands::Put {
            title,
            message,
            tags,
        }) => commands::put_note(options, title, message, tags),
        Commands::Note(NoteCommands::Get { title }) => commands::get_note(options, &title),
        Commands::Note(NoteCommands::Search { query }) => commands::search_notes(options, &query),
        Commands::Password(PasswordCommands::Put {
            title,
            username,
            url,
            password,
        }) => commands::put_password(options, title, username, url, password),
        Commands::Password(PasswordCommands::Get { title, show }) => {
            commands::get_password(options, &title, show)
        }
        Commands::File(FileCommands::Put { path, message }) => {
            commands::put_file(options, &path, message)
        }
        Commands::File(FileCommands::Get {
            name,
            output,
            force,
        }) => commands::get_file(options, &name, output, force),
        Commands::File(FileCommands::List) => commands::list_files(options),
        Commands::Status => commands::status(options),
        Commands::Reset { force } => commands::reset(options, force),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = SafeOptions::from(cli.safe);
    match run(cli.command, &options) {
        Ok(output) => utils::output_result(output, cli.json),
        Err(e) => {
            let causes: Vec<String> = e.chain().skip(1).map(ToString::to_string).collect();
            let detail = (!causes.is_empty()).then(|| causes.join(": "));
            utils::output_result(CommandOutput::failure(e.to_string(), detail), cli.json);
            process::exit(1);
        }
    }
}
