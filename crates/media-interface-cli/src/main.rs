//! media-interface - answers which media items live on a camera card and
//! which files make up an item.
//!
//! Prints a single JSON response envelope on stdout. Diagnostics go to stderr.

mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, anyhow};
use clap::{ArgAction, ArgGroup, Parser};
use media_interface_core::config::CONFIG_FILE_NAME;
use media_interface_core::query::RESPONSE_DATA_TYPE;
use media_interface_core::{
    Config, ErrorKind, FileSystem, MediaContext, Quality, QueryRequest, QueryResponse,
    QueryService, RealFileSystem,
};
use tracing::{debug, error, info};

/// Command line interface.
#[derive(Debug, Parser)]
#[command(name = "media-interface", author, version, about)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args(["list_lowest", "list_highest", "get"])
))]
struct Cli {
    /// Path to the config json file. Defaults to "interface_config.json" next to
    /// the executable, then in the user config directory.
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// List one file per item under the given directory, preferring the lowest
    /// quality representation.
    #[arg(short = 'l', long = "list-thumbnail", value_name = "DIR")]
    list_lowest: Option<PathBuf>,

    /// List one file per item under the given directory, preferring the highest
    /// quality representation.
    #[arg(short = 'L', long = "list-high-quality", value_name = "DIR")]
    list_highest: Option<PathBuf>,

    /// List every file of the item the given file belongs to.
    #[arg(short = 'g', long = "get-related", value_name = "FILE")]
    get: Option<PathBuf>,

    /// Increase diagnostic output on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Also write JSON logs into this directory.
    #[arg(long = "log-dir", value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

impl Cli {
    fn request(&self) -> Option<QueryRequest> {
        if let Some(path) = &self.list_lowest {
            return Some(QueryRequest::List {
                path: path.clone(),
                quality: Quality::Lowest,
            });
        }
        if let Some(path) = &self.list_highest {
            return Some(QueryRequest::List {
                path: path.clone(),
                quality: Quality::Highest,
            });
        }
        self.get
            .as_ref()
            .map(|path| QueryRequest::Get { path: path.clone() })
    }
}

/// Config file locations to try, in order.
fn config_candidates(explicit: Option<&Path>) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.to_path_buf()];
    }
    let mut candidates = Vec::new();
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(dir.join(CONFIG_FILE_NAME));
    }
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("media-interface").join(CONFIG_FILE_NAME));
    }
    candidates
}

fn locate_config(fs: &dyn FileSystem, explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    let candidates = config_candidates(explicit);
    if explicit.is_some() {
        return candidates
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no config path given"));
    }
    candidates
        .iter()
        .find(|p| fs.exists(p))
        .cloned()
        .ok_or_else(|| {
            let tried: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
            anyhow!("No config file found, tried: {}", tried.join(", "))
        })
}

fn load_context(fs: &dyn FileSystem, explicit: Option<&Path>) -> anyhow::Result<MediaContext> {
    let path = locate_config(fs, explicit)?;
    debug!(path = %path.display(), "Using config file");
    let config = Config::load(fs, &path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let context = MediaContext::from_config(&config, &path, fs)?;
    info!(roots = context.roots().len(), "Loaded source media roots");
    Ok(context)
}

/// Envelope printed when the real response cannot be serialized.
fn serialization_failure_json(version: &str) -> String {
    format!(
        r#"{{"data_type":"{RESPONSE_DATA_TYPE}","version":"{version}","command_success":false,"file_list":[],"error":"Failed to serialise json"}}"#
    )
}

fn print_response(response: &QueryResponse) {
    match response.to_json() {
        Ok(json) => println!("{json}"),
        Err(e) => {
            error!(error = %e, "Failed to serialize response");
            println!("{}", serialization_failure_json(&response.version));
        }
    }
}

/// 0 on success, 2 when the configuration is unusable, 1 for any other failure.
fn exit_status(response: &QueryResponse) -> u8 {
    if response.command_success {
        0
    } else if response.error_kind == Some(ErrorKind::Config) {
        2
    } else {
        1
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut logging_config = logging::LoggingConfig::from_verbosity(cli.verbose);
    if let Some(dir) = &cli.log_dir {
        logging_config = logging_config.with_log_directory(dir.clone());
    }
    let _guard = match logging::init(&logging_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("media-interface: {e}");
            None
        }
    };

    let Some(request) = cli.request() else {
        let response = QueryResponse::failure("Internal error: no action selected");
        print_response(&response);
        return ExitCode::FAILURE;
    };

    let fs = RealFileSystem::new();
    let context = match load_context(&fs, cli.config.as_deref()) {
        Ok(context) => context,
        Err(e) => {
            error!("{e:#}");
            let response =
                QueryResponse::failure(format!("{e:#}")).with_error_kind(ErrorKind::Config);
            print_response(&response);
            return ExitCode::from(exit_status(&response));
        }
    };

    let response = QueryService::new(&context, &fs).execute(&request);
    print_response(&response);
    ExitCode::from(exit_status(&response))
}
