use anyhow::Result;
use clap::Parser;

use merkle_proof_tree::interfaces::cli::Cli;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let out = cli.run()?;
    if !out.is_empty() {
        println!("{out}");
    }
    Ok(())
}
