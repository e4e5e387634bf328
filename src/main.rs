use anyhow::{Context, Result};
use clap::Parser;
use console::Style;

use pdfsqueeze::cli::{Cli, Command, KeysAction};
use pdfsqueeze::config::{AppPaths, Settings};
use pdfsqueeze::{commands, logging, ui};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = AppPaths::resolve(cli.home.clone())?;

    if logging::init_logging(&paths.log_file, cli.verbose).is_err() {
        logging::init_logging_stderr(cli.verbose);
    }

    let green = Style::new().green().bold();

    match cli.command {
        Command::Init {
            title,
            author,
            force,
        } => {
            let queued = commands::init(&paths, &title, &author, force)?;
            if queued == 0 {
                println!("No PDFs found in {}", paths.source_dir.display());
            } else {
                println!(
                    "{} Queued {queued} file(s) in {}",
                    green.apply_to("✓"),
                    paths.manifest_file.display()
                );
            }
        }
        Command::Compress { workers } => {
            let mut settings = Settings::load(&paths.settings_file)
                .with_context(|| format!("failed to read {}", paths.settings_file.display()))?;
            if let Some(workers) = workers {
                settings.workers = workers.max(1);
            }

            let report = commands::compress(&paths, &settings, true).await?;
            ui::print_summary(&report);
            report.into_result()?;
        }
        Command::Status => {
            let status = commands::status(&paths)?;
            println!("Root:     {}", status.root.display());
            match status.pending {
                Some(pending) => println!(
                    "Manifest: {pending} pending, {} vanished",
                    status.vanished
                ),
                None => println!("Manifest: none (run `pdfsqueeze init`)"),
            }
            match status.active_key {
                Some(key) => println!("Key:      {key} ({} configured)", status.key_count),
                None => println!("Key:      none (run `pdfsqueeze keys add <KEY>`)"),
            }
        }
        Command::Keys { action } => match action {
            KeysAction::List => {
                for info in commands::keys_list(&paths)? {
                    let marker = if info.status { "*" } else { " " };
                    println!("{marker} {}", commands::mask_key(&info.key));
                }
            }
            KeysAction::Add { key } => {
                commands::keys_add(&paths, &key)?;
                println!("{} Added {}", green.apply_to("✓"), commands::mask_key(&key));
            }
            KeysAction::Use { key } => {
                commands::keys_use(&paths, &key)?;
                println!("{} Active key is now {}", green.apply_to("✓"), commands::mask_key(&key));
            }
        },
    }

    Ok(())
}
