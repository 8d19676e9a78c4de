//! Prism Shell: line-oriented host for collaborative project editing.
//!
//! Loads the saved projects, opens the shared hub, and hosts one or more
//! tabs editing the current project. Set `PRISM_DATA_DIR` to choose where
//! projects are stored and `RUST_LOG` to see what the tabs are doing.

mod command;
mod state;

use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};

use command::{Command, HELP};
use prism_core::vfs;
use prism_collab::{
    HubRegistry, ProjectStore, SessionConfig, SessionEvent, StoreConfig, DEFAULT_CHANNEL,
};
use state::ShellState;

const DATA_DIR_VAR: &str = "PRISM_DATA_DIR";

fn open_store() -> Option<ProjectStore> {
    let mut config = StoreConfig::default();
    if let Ok(dir) = std::env::var(DATA_DIR_VAR) {
        config.path = dir.into();
    }
    match ProjectStore::open(config) {
        Ok(store) => Some(store),
        Err(e) => {
            log::error!("Project store unavailable, continuing in memory: {e}");
            None
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    info!("Starting Prism Shell...");

    let registry = HubRegistry::default();
    let hub = registry.open(DEFAULT_CHANNEL).await;
    let (mut state, mut events) = ShellState::new(open_store(), hub, SessionConfig::default());
    state.open_tab().await;

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        log::error!("Failed to read input: {e}");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match Command::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => run_command(&mut state, command).await,
                    Err(e) => println!("{e}"),
                }
            }
            Some((tab, event)) = events.recv() => {
                report(tab, &event);
                state.on_event(tab, &event);
            }
        }
    }

    state.shutdown().await;
    info!("Bye");
}

async fn run_command(state: &mut ShellState, command: Command) {
    if let Command::NewTab = command {
        let index = state.open_tab().await;
        println!("Opened tab {index}");
        return;
    }
    if let Command::SwitchTab(index) = command {
        if state.switch_tab(index) {
            println!("Switched to tab {index}");
        } else {
            println!("No tab {index}; {} open", state.tab_count());
        }
        return;
    }
    if let Command::Help = command {
        println!("{HELP}");
        return;
    }
    if run_project_command(state, &command).await {
        return;
    }

    let Some(session) = state.active_session() else {
        println!("No open tab");
        return;
    };

    let result = match command {
        Command::Files => session.files().await.map(|files| {
            for file in files {
                println!("{:<12} {:<10} {} bytes", file.name, file.language, file.content.len());
            }
        }),
        Command::Show(name) => session.files().await.map(|files| {
            match vfs::find(&files, &name) {
                Some(file) => println!("{}", file.content),
                None => println!("No file {name}"),
            }
        }),
        Command::Write { file, path } => match tokio::fs::read_to_string(&path).await {
            Ok(content) => session.edit_file(file.as_str(), content).await.map(|changed| {
                if changed {
                    println!("Updated {file}");
                } else {
                    println!("{file} unchanged");
                }
            }),
            Err(e) => {
                println!("Cannot read {path}: {e}");
                Ok(())
            }
        },
        Command::Cursor { file, position } => session.move_cursor(file, position),
        Command::Who => session.snapshot().await.map(|snapshot| {
            if snapshot.collaborators.is_empty() {
                println!("Nobody else here");
            }
            for c in snapshot.collaborators {
                let place = match (&c.file, c.cursor_position) {
                    (Some(file), Some(pos)) => format!("{file}:{}:{}", pos.line, pos.column),
                    (Some(file), None) => file.clone(),
                    _ => "-".to_string(),
                };
                println!("{:<8} {} {place}", c.name, c.color);
            }
        }),
        Command::History => session.snapshot().await.map(|snapshot| {
            if snapshot.project.history.is_empty() {
                println!("Nothing generated yet");
            }
            for app in &snapshot.project.history {
                let current = if app.html == snapshot.project.current_code { "*" } else { " " };
                println!("{current} v{:<3} {}", app.version, app.explanation);
            }
        }),
        _ => Ok(()),
    };

    if let Err(e) = result {
        println!("Tab {}: {e}", state.active_index());
    }
}

/// Commands over the project list. Returns `false` for anything else.
async fn run_project_command(state: &mut ShellState, command: &Command) -> bool {
    match command {
        Command::Projects => {
            let current = state.projects().current_id();
            for (index, project) in state.projects().projects().iter().enumerate() {
                let marker = if project.id == current { "*" } else { " " };
                println!("{marker} {index:<3} {}", project.name);
            }
        }
        Command::NewProject => {
            state.new_project().await;
            println!("Started {}", state.projects().current().name);
        }
        Command::SelectProject(index) => {
            if state.select_project(*index).await {
                println!("Opened {}", state.projects().current().name);
            } else {
                println!("No project {index}; {} saved", state.projects().len());
            }
        }
        Command::DeleteProject(index) => {
            if state.delete_project(*index).await {
                println!("Deleted; now on {}", state.projects().current().name);
            } else {
                println!("No project {index}; {} saved", state.projects().len());
            }
        }
        Command::RenameProject(name) => {
            state.rename_project(name);
            println!("Renamed to {name}");
        }
        Command::Restore(version) => match state.restore_version(*version).await {
            Ok(true) => println!("Restored v{version}"),
            Ok(false) => println!("v{version} is missing or already current"),
            Err(e) => println!("Tab {}: {e}", state.active_index()),
        },
        _ => return false,
    }
    true
}

fn report(tab: usize, event: &SessionEvent) {
    match event {
        SessionEvent::ProjectChanged(project) => {
            println!("[tab {tab}] {} updated", project.name);
        }
        SessionEvent::RosterChanged(collaborators) => {
            let names: Vec<&str> = collaborators.iter().map(|c| c.name.as_str()).collect();
            println!("[tab {tab}] here: {}", names.join(", "));
        }
        SessionEvent::Disconnected => println!("[tab {tab}] disconnected"),
    }
}
