// main.rs: logging setup and the single process exit.
// Everything else is driven through `Bootstrap`.
mod args;
mod assemble;
mod bootstrap;
mod config;
mod configuration;
mod exit;
mod loader;
mod locate;
mod printer;
mod runner;
mod update;
mod usage;
mod verify;

use bootstrap::Bootstrap;
use config::launcher_settings;
use exit::ExitOutcome;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("PHPBU_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let outcome = match std::env::current_dir() {
        Ok(cwd) => Bootstrap::new(std::io::stdout(), cwd, launcher_settings())
            .run(std::env::args_os()),
        Err(e) => {
            println!("Could not determine the current directory: {e}");
            ExitOutcome::Exception
        }
    };
    std::process::exit(outcome.code());
}
