use std::process::ExitCode;

use log::error;

use ecowallet::cli::Cli;
use ecowallet::db;
use ecowallet::error::AppError;
use ecowallet::AppState;

fn main() -> ExitCode {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
  let cli = Cli::init();

  match run(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      error!("{err}");
      eprintln!("{err}");
      ExitCode::FAILURE
    }
  }
}

fn run(cli: Cli) -> Result<(), AppError> {
  let app_dir = match cli.home {
    Some(path) => path,
    None => db::resolve_app_dir()?,
  };
  let state = AppState::open(&app_dir)?;
  cli.command.run(&state)
}
