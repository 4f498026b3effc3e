//! Multi-tab simulator: runs several tab workers against one shared store
//! and bus, driven by line commands on stdin.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use tab_sync::Visibility;
use tabsound_lib::app::SharedState;
use tabsound_lib::console::ConsoleCommand;
use tabsound_lib::shutdown::graceful_shutdown;
use tabsound_lib::tab::{TabHandle, spawn_clip_tab};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting tab sound simulator");

    let (db, config, dir) = tabsound_lib::init_foundation()?;
    let tab_count = config.tab_count;
    let state = SharedState::new(db, config, dir);

    // Tab 0 opens in the foreground, the rest behind it.
    let mut tabs: Vec<Option<TabHandle>> = Vec::new();
    let mut workers: Vec<JoinHandle<()>> = Vec::new();
    for i in 0..tab_count {
        let visibility = if i == 0 {
            Visibility::Foreground
        } else {
            Visibility::Background
        };
        let (handle, worker) = spawn_clip_tab(&state, visibility).await;
        tracing::info!(tab = i, id = %handle.identity(), "Tab opened");
        tabs.push(Some(handle));
        workers.push(worker);
    }

    tracing::info!("{tab_count} tabs running. Type commands, or Ctrl+C to stop.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => break,
            },
        };
        if line.trim().is_empty() {
            continue;
        }

        let cmd = match line.parse::<ConsoleCommand>() {
            Ok(cmd) => cmd,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };
        if cmd == ConsoleCommand::Quit {
            break;
        }
        if let Err(e) = run_command(&state, &mut tabs, &mut workers, cmd).await {
            eprintln!("{e}");
        }
    }

    tracing::info!("Shutting down...");
    graceful_shutdown(&state, workers).await;
    Ok(())
}

async fn run_command(
    state: &SharedState,
    tabs: &mut Vec<Option<TabHandle>>,
    workers: &mut Vec<JoinHandle<()>>,
    cmd: ConsoleCommand,
) -> anyhow::Result<()> {
    let tab = |n: usize| -> anyhow::Result<TabHandle> {
        tabs.get(n)
            .and_then(Option::clone)
            .ok_or_else(|| anyhow::anyhow!("no open tab {n}"))
    };

    match cmd {
        ConsoleCommand::Focus(n) => {
            // Focusing one tab backgrounds whichever tab had focus.
            for (i, other) in tabs.iter().enumerate() {
                if let Some(other) = other.as_ref().filter(|_| i != n) {
                    if other.status().await?.visibility == Visibility::Foreground {
                        other.blur().await?;
                    }
                }
            }
            tab(n)?.focus().await?;
        }
        ConsoleCommand::Blur(n) => tab(n)?.blur().await?,
        ConsoleCommand::Play(n, resource) => {
            let outcome = tab(n)?.play_sound(resource).await?;
            println!("{}", serde_json::to_string(&outcome)?);
        }
        ConsoleCommand::Stop(n) => tab(n)?.stop().await?,
        ConsoleCommand::Clear(n) => tab(n)?.clear().await?,
        ConsoleCommand::Open => {
            let (handle, worker) = spawn_clip_tab(state, Visibility::Background).await;
            println!("opened tab {} ({})", tabs.len(), handle.identity());
            tabs.push(Some(handle));
            workers.push(worker);
        }
        ConsoleCommand::Close(n) => {
            let handle = tab(n)?;
            handle.close().await?;
            tabs[n] = None;
        }
        ConsoleCommand::Set(key, value) => {
            state.update_setting(&key, &value).await?;
            println!("{key}={value} (applies to tabs opened from now on)");
        }
        ConsoleCommand::Settings => {
            let mut settings: Vec<_> = state.settings()?.into_iter().collect();
            settings.sort();
            for (key, value) in settings {
                println!("{key}={value}");
            }
        }
        ConsoleCommand::Status => {
            for (i, handle) in tabs.iter().enumerate() {
                let Some(handle) = handle else { continue };
                let status = handle.status().await?;
                println!("{i}: {}", serde_json::to_string(&status)?);
            }
        }
        ConsoleCommand::Quit => {}
    }
    Ok(())
}
