use clap::Parser;
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser)]
#[command(
    version,
    about = "Origin-pull HTTP file cache",
    long_about = "Serves files from a local cache directory. Requests for files that are not\n\
                  cached yet answer 404 and start a background download from\n\
                  http://<Host header>/<path>; once it finishes the file is served from disk."
)]
pub struct CliArgs {
    /// JSON configuration file
    #[arg(
        short,
        long,
        help = "Path to the JSON configuration file (defaults are used when omitted)"
    )]
    pub config: Option<PathBuf>,

    /// Listen address override
    #[arg(short, long, help = "Address to listen on, e.g. \":8080\" or \"127.0.0.1:8080\"")]
    pub listen: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable debug logging and mirror logs to stdout")]
    pub verbose: bool,
}
