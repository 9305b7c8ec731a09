//! # yamlfig demo application
//!
//! A sample CLI that loads a strict YAML config with environment overrides.
//! It exists to demonstrate and manually verify yamlfig's features.
//!
//! ```sh
//! cargo run --example yamlfig_demo -- config gen -o demo.yaml
//! cargo run --example yamlfig_demo -- run --config demo.yaml
//! YAMLFIG_DEMO_HOST_NETWORK_MAX_TIMEOUT=500 cargo run --example yamlfig_demo -- config show -c demo.yaml
//! ```
//!
//! Remove a key from `demo.yaml` to see the missing-key report, or add an
//! undeclared one to see it rejected.

mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use yamlfig::{ConfigArgs, EnvPath, Yamlfig, YamlfigBuilder};

use config::DemoConfig;

const ENV_PREFIX: &str = "yamlfig_demo";

#[derive(Parser, Debug)]
#[command(name = "yamlfig-demo")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the configuration and print it back as YAML.
    Run {
        /// Path to the YAML config file (or set DEMO_CONFIG_PATH).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Show the resolved configuration or generate a template.
    Config(ConfigArgs),
}

fn builder() -> YamlfigBuilder<DemoConfig> {
    Yamlfig::builder().env_prefix(ENV_PREFIX)
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            let builder = match config {
                Some(path) => builder().config_path(path),
                None => builder().config_path(EnvPath::new("DEMO_CONFIG_PATH")),
            };
            let loaded = builder.load().unwrap_or_else(|e| {
                eprintln!("Failed to load config:\n{e}");
                std::process::exit(1);
            });
            match yamlfig::to_yaml(&loaded) {
                Ok(yaml) => print!("{yaml}"),
                Err(e) => {
                    eprintln!("Failed to render config:\n{e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Config(args) => {
            let action = args.clone().into_action();
            builder()
                .config_path(args)
                .handle_and_print(&action)
                .unwrap_or_else(|e| {
                    eprintln!("Config error:\n{e}");
                    std::process::exit(1);
                });
        }
    }
}
