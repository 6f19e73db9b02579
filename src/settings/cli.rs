use super::Parser;

#[derive(Parser, Debug)]
#[command(name = "tunebridge", about = "Spotify backend-for-frontend")]
pub struct Cli {
    /// Path to a TOML settings file; defaults to settings/dev.toml or settings/release.toml.
    #[arg(long)]
    pub settings: Option<String>,
}
