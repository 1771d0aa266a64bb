mod automation;
mod cli;
mod config;
mod core;
mod dispatch;
mod models;
mod sources;

use clap::Parser;

fn main() {
    let cli = cli::Cli::parse();

    let mut clog = colog::default_builder();
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        config::load_config()
            .log_level()
            .unwrap_or(log::LevelFilter::Info)
    };
    clog.filter(None, level);
    clog.init();

    if let Err(e) = cli::run(cli) {
        eprintln!("오류: {:#}", e);
        std::process::exit(1);
    }
}
