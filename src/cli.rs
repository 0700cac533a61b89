use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(
    name = "vidshelf",
    about = "Stream a folder of videos to any browser: `vidshelf ~/Videos`",
    long_about = None,
    version,
)]
pub struct Args {
    /// Folder containing the video files [default: ./videos]
    #[arg(env = "VIDSHELF_VIDEO_FOLDER")]
    pub folder: Option<PathBuf>,

    /// HTTP port to listen on [default: 8080]
    #[arg(short, long, env = "VIDSHELF_PORT")]
    pub port: Option<u16>,

    /// Path to TOML config file (overrides default search: ./vidshelf.toml, ~/.config/vidshelf/config.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Bind to localhost only (127.0.0.1) instead of all interfaces (0.0.0.0)
    #[arg(long)]
    pub localhost: bool,

    /// Include videos in subfolders
    #[arg(short, long)]
    pub recursive: bool,

    /// Require this code as `Authorization: Bearer <code>` or `?token=<code>`
    #[arg(long, env = "VIDSHELF_ACCESS_CODE", hide_env_values = true)]
    pub access_code: Option<String>,

    /// Development mode: include internal error detail in 500 responses
    #[arg(long)]
    pub dev: bool,
}
