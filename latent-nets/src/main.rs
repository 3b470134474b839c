use anyhow::Result;
use clap::Parser;
use latent_nets::cli::{init, summary, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(filter) = cli.log_filter(std::env::var_os("RUST_LOG").as_deref()) {
        std::env::set_var("RUST_LOG", filter);
    }
    env_logger::init();

    match &cli.command {
        Commands::Summary(args) => {
            summary::run(args)?;
        }
        Commands::Init(args) => {
            init::run(args)?;
        }
    }

    Ok(())
}
