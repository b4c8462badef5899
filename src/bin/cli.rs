//! depotkv CLI
//!
//! Command-line interface for inspecting and editing a depot file.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use depotkv::{Config, Depot, DepotError, OpenMode, PutMode};
use tracing_subscriber::{fmt, EnvFilter};

/// depotkv CLI
#[derive(Parser, Debug)]
#[command(name = "depotkv")]
#[command(about = "Single-file hash key-value store")]
#[command(version)]
struct Args {
    /// Database file
    #[arg(short, long, default_value = "./depot.db")]
    file: PathBuf,

    /// Open mode: r (read-only), w (read-write), c (create), n (truncate)
    #[arg(short, long)]
    mode: Option<OpenMode>,

    /// Take an advisory lock on the file while it is open
    #[arg(long)]
    lock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the file (or open an existing one) and print its shape
    Init {
        /// Bucket count for a new file
        #[arg(short, long)]
        buckets: Option<u32>,
    },

    /// Store a value
    Put {
        key: String,
        value: String,

        /// Fail if the key already exists
        #[arg(long, conflicts_with = "append")]
        keep: bool,

        /// Append to the existing value
        #[arg(long)]
        append: bool,
    },

    /// Print a value
    Get {
        key: String,

        /// Printed when the key is missing
        #[arg(short, long)]
        default: Option<String>,
    },

    /// Delete a key
    Del { key: String },

    /// Exit with status 0 if the key exists, 1 otherwise
    Exists { key: String },

    /// Print the number of records
    Count,

    /// Print every key
    Keys,

    /// Print every key and value, tab separated
    Items,

    /// Print file statistics
    Stat,

    /// Rewrite the file without free space
    Optimize {
        /// New bucket count
        #[arg(short, long)]
        buckets: Option<u32>,
    },
}

impl Commands {
    /// Mode used when `--mode` is not given
    fn default_mode(&self) -> OpenMode {
        match self {
            Commands::Init { .. } => OpenMode::CreateIfMissing,
            Commands::Put { .. } | Commands::Del { .. } | Commands::Optimize { .. } => {
                OpenMode::ReadWrite
            }
            _ => OpenMode::ReadOnly,
        }
    }
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("depotkv: {}", e);
            ExitCode::from(2)
        }
    }
}

fn run(args: Args) -> depotkv::Result<ExitCode> {
    let mode = args.mode.unwrap_or_else(|| args.command.default_mode());
    let bucket_hint = match &args.command {
        Commands::Init { buckets } => *buckets,
        _ => None,
    };

    let mut config = Config::new(&args.file, mode);
    config.bucket_hint = bucket_hint;
    config.lock_file = args.lock;

    Depot::scoped(config, |depot| execute(depot, args.command))
}

fn execute(depot: &Depot, command: Commands) -> depotkv::Result<ExitCode> {
    let mut out = io::stdout().lock();

    match command {
        Commands::Init { .. } | Commands::Stat => {
            let stat = depot.stat()?;
            writeln!(out, "path:          {}", stat.path.display())?;
            writeln!(out, "mode:          {}", stat.mode)?;
            writeln!(out, "writable:      {}", stat.writable)?;
            writeln!(out, "file size:     {}", stat.file_size)?;
            writeln!(out, "buckets:       {}", stat.bucket_count)?;
            writeln!(out, "used buckets:  {}", stat.used_buckets)?;
            writeln!(out, "records:       {}", stat.record_count)?;
            writeln!(out, "free spans:    {}", stat.free_spans)?;
            writeln!(out, "free bytes:    {}", stat.free_bytes)?;
        }
        Commands::Put {
            key,
            value,
            keep,
            append,
        } => {
            let mode = if keep {
                PutMode::Keep
            } else if append {
                PutMode::Append
            } else {
                PutMode::Overwrite
            };
            depot.put_with(key.as_bytes(), value.as_bytes(), mode)?;
        }
        Commands::Get { key, default } => {
            let value = match (depot.get(key.as_bytes()), default) {
                (Ok(value), _) => value,
                (Err(DepotError::NotFound), Some(default)) => default.into_bytes(),
                (Err(e), _) => return Err(e),
            };
            out.write_all(&value)?;
            writeln!(out)?;
        }
        Commands::Del { key } => depot.delete(key.as_bytes())?,
        Commands::Exists { key } => {
            if !depot.exists(key.as_bytes())? {
                return Ok(ExitCode::from(1));
            }
        }
        Commands::Count => writeln!(out, "{}", depot.count()?)?,
        Commands::Keys => {
            for key in depot.keys() {
                out.write_all(&key?)?;
                writeln!(out)?;
            }
        }
        Commands::Items => {
            for item in depot.items() {
                let (key, value) = item?;
                out.write_all(&key)?;
                out.write_all(b"\t")?;
                out.write_all(&value)?;
                writeln!(out)?;
            }
        }
        Commands::Optimize { buckets } => depot.optimize(buckets)?,
    }

    Ok(ExitCode::SUCCESS)
}
