mod cli;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let options = cli::Options::parse();
    if options.device {
        cli::run_device(&options)
    } else {
        cli::run_offline(&options)
    }
}
