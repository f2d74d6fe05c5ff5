use clap::Parser;
use env_logger::{Builder, Env, Target};
use std::fs::{self, OpenOptions};
use std::process::ExitCode;

use kr_data_cli::cli::{self, Cli, Commands};
use kr_data_cli::config::{load_config, Config};
use kr_data_cli::error::{Context, Result};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    init_logging(&config, cli.is_interactive())?;

    match cli.command {
        None | Some(Commands::Tui) => kr_data_cli::app::run(config),
        Some(Commands::Fetch {
            lawd,
            from,
            to,
            rent,
            out,
        }) => {
            let path = cli::fetch_trades(config, &lawd, &from, &to, rent, out)?;
            println!("Saved {}", path.display());
            Ok(())
        }
        Some(Commands::Regions { parent }) => {
            let entries = cli::list_regions(&config, parent.as_deref())?;
            cli::print_regions(&entries);
            Ok(())
        }
        Some(Commands::Months { from, to }) => {
            for month in cli::list_months(&from, &to)? {
                println!("{}", month);
            }
            Ok(())
        }
    }
}

/// The TUI owns the terminal, so interactive sessions log to a file.
fn init_logging(config: &Config, interactive: bool) -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    if interactive {
        let dir = &config.storage.log_dir;
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
        let path = dir.join("kr-data.log");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}
