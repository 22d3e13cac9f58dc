use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "guild-mirror", version, about = "Mirrors guild activity into SQLite")]
pub struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long, env = "CONFIG_PATH", default_value = "config.yaml")]
    pub config: String,
}
