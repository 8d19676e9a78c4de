//! A connected collaboration session for one context and one project.
//!
//! ```text
//!   CollabSession (handle)                   session task
//!  ┌─────────────────────┐   Command    ┌──────────────────────────────┐
//!  │ edit_file()         │ ───────────► │ select! {                    │
//!  │ move_cursor()       │              │   bus subscription,          │
//!  │ generate()          │              │   heartbeat tick (3 s),      │
//!  │ snapshot()/files()  │ ◄─ oneshot ─ │   sweep tick (5 s),          │
//!  │ disconnect()        │              │   commands                   │
//!  └─────────────────────┘              │ } ─► SyncCoordinator         │
//!            ▲                          └──────────────┬───────────────┘
//!            └────────────── SessionEvent ─────────────┘
//! ```
//!
//! The task is the only place the project document is mutated. Its
//! subscription and both timers end with it.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use prism_core::{Project, VirtualFile};

use crate::coordinator::{Outcome, SyncCoordinator, SyncState};
use crate::generator::{Generation, Generator, GeneratorError};
use crate::presence::{PresenceBus, SessionIdentity, Subscription};
use crate::protocol::{CollabEvent, Collaborator, CursorPosition};

/// Session timing and buffering.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub heartbeat_interval: Duration,
    pub sweep_interval: Duration,
    /// Participants silent for this long are dropped at the next sweep.
    pub liveness_window: Duration,
    /// Host events buffered before new ones are dropped.
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(3),
            sweep_interval: Duration::from_secs(5),
            liveness_window: Duration::from_secs(10),
            event_buffer: 256,
        }
    }
}

impl SessionConfig {
    /// Short intervals for tests.
    pub fn for_testing() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(30),
            sweep_interval: Duration::from_millis(50),
            liveness_window: Duration::from_millis(100),
            event_buffer: 64,
        }
    }
}

/// Notifications from the session task to its host.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The project changed, locally or remotely. Carries the new state.
    ProjectChanged(Project),
    RosterChanged(Vec<Collaborator>),
    Disconnected,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub project: Project,
    pub collaborators: Vec<Collaborator>,
    pub state: SyncState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session task has stopped.
    Closed,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Session closed"),
        }
    }
}

impl std::error::Error for SessionError {}

enum Command {
    Edit {
        file_name: String,
        content: String,
        reply: oneshot::Sender<bool>,
    },
    Cursor {
        file_name: String,
        position: CursorPosition,
    },
    CommitGeneration {
        prompt: String,
        attachment: Option<String>,
        result: Result<Generation, GeneratorError>,
        reply: oneshot::Sender<bool>,
    },
    Restore {
        version: u32,
        reply: oneshot::Sender<bool>,
    },
    Rename {
        name: String,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Disconnect,
}

/// Handle to a running session.
pub struct CollabSession {
    identity: SessionIdentity,
    commands: mpsc::UnboundedSender<Command>,
    events: Option<mpsc::Receiver<SessionEvent>>,
    task: JoinHandle<()>,
}

impl CollabSession {
    /// Join the bus with `project` open and start the session task.
    pub async fn connect(bus: PresenceBus, project: Project, config: SessionConfig) -> Self {
        let identity = bus.identity().clone();
        let subscription = bus.subscribe().await;
        let mut coordinator = SyncCoordinator::new(project, identity.id, config.liveness_window);
        coordinator.connect(&bus);

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer.max(1));
        let task = tokio::spawn(run(
            coordinator,
            bus,
            subscription,
            command_rx,
            event_tx,
            config,
        ));

        Self {
            identity,
            commands,
            events: Some(event_rx),
            task,
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// The host's event stream. Available once.
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.events.take()
    }

    /// Replace the content of one virtual file. Returns whether the document
    /// changed; unchanged content is neither committed nor published.
    pub async fn edit_file(
        &self,
        file_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<bool, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Edit {
            file_name: file_name.into(),
            content: content.into(),
            reply,
        })?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub fn move_cursor(
        &self,
        file_name: impl Into<String>,
        position: CursorPosition,
    ) -> Result<(), SessionError> {
        self.send(Command::Cursor {
            file_name: file_name.into(),
            position,
        })
    }

    /// Ask `generator` for a new document and commit the outcome.
    ///
    /// The generator runs on the caller's task, so the session keeps
    /// handling events meanwhile. Returns whether the generator succeeded.
    pub async fn generate<G: Generator>(
        &self,
        generator: &G,
        prompt: &str,
        attachment: Option<String>,
    ) -> Result<bool, SessionError> {
        let current = self.snapshot().await?.project.current_code;
        let current = (!current.is_empty()).then_some(current.as_str());
        let result = generator
            .generate(prompt, current, attachment.as_deref())
            .await;
        let succeeded = result.is_ok();

        let (reply, rx) = oneshot::channel();
        self.send(Command::CommitGeneration {
            prompt: prompt.to_string(),
            attachment,
            result,
            reply,
        })?;
        rx.await.map_err(|_| SessionError::Closed)?;
        Ok(succeeded)
    }

    /// Make an earlier generated version current and publish it whole.
    /// Returns `false` for an unknown version or one that is already current.
    pub async fn restore_version(&self, version: u32) -> Result<bool, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Restore { version, reply })?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Rename the open project. Names are local to the device and not
    /// published.
    pub fn rename(&self, name: impl Into<String>) -> Result<(), SessionError> {
        self.send(Command::Rename { name: name.into() })
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply })?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub async fn files(&self) -> Result<Vec<VirtualFile>, SessionError> {
        Ok(self.snapshot().await?.project.files())
    }

    pub fn is_closed(&self) -> bool {
        self.task.is_finished()
    }

    /// Leave the session and wait for its task to finish.
    pub async fn disconnect(self) {
        let _ = self.commands.send(Command::Disconnect);
        if let Err(e) = self.task.await {
            log::error!("Session task for {} failed: {e}", self.identity.name);
        }
    }

    fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands.send(command).map_err(|_| SessionError::Closed)
    }
}

async fn run(
    mut coordinator: SyncCoordinator,
    bus: PresenceBus,
    mut subscription: Subscription,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::Sender<SessionEvent>,
    config: SessionConfig,
) {
    let start = Instant::now();
    let mut heartbeat = interval_at(start + config.heartbeat_interval, config.heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sweep = interval_at(start + config.sweep_interval, config.sweep_interval);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            Some(incoming) = subscription.recv() => {
                let is_join = matches!(incoming.event, CollabEvent::Join(_));
                match coordinator.handle(&incoming, Instant::now()) {
                    Outcome::DocumentChanged => {
                        emit(&events, SessionEvent::ProjectChanged(coordinator.project().clone()));
                    }
                    Outcome::RosterChanged => {
                        emit(&events, SessionEvent::RosterChanged(coordinator.roster().collaborators()));
                    }
                    Outcome::Ignored => {}
                }
                // Let a newcomer see us before our next heartbeat.
                if is_join {
                    coordinator.heartbeat(&bus);
                }
            }
            _ = heartbeat.tick() => {
                coordinator.heartbeat(&bus);
            }
            _ = sweep.tick() => {
                if !coordinator.sweep(Instant::now()).is_empty() {
                    emit(&events, SessionEvent::RosterChanged(coordinator.roster().collaborators()));
                }
            }
            command = commands.recv() => match command {
                Some(Command::Disconnect) | None => break,
                Some(command) => execute(&mut coordinator, &bus, &events, command),
            },
        }
    }

    bus.unsubscribe(subscription.id).await;
    coordinator.disconnect(&bus);
    emit(&events, SessionEvent::Disconnected);
}

fn execute(
    coordinator: &mut SyncCoordinator,
    bus: &PresenceBus,
    events: &mpsc::Sender<SessionEvent>,
    command: Command,
) {
    match command {
        Command::Edit {
            file_name,
            content,
            reply,
        } => {
            let changed = coordinator.local_edit(bus, &file_name, &content);
            if changed {
                emit(events, SessionEvent::ProjectChanged(coordinator.project().clone()));
            }
            let _ = reply.send(changed);
        }
        Command::Cursor {
            file_name,
            position,
        } => coordinator.move_cursor(bus, &file_name, position),
        Command::CommitGeneration {
            prompt,
            attachment,
            result,
            reply,
        } => {
            let changed = coordinator.apply_generation(bus, &prompt, attachment, &result);
            // Chat history changes even when the document does not.
            emit(events, SessionEvent::ProjectChanged(coordinator.project().clone()));
            let _ = reply.send(changed);
        }
        Command::Restore { version, reply } => {
            let changed = coordinator.restore_version(bus, version);
            if changed {
                emit(events, SessionEvent::ProjectChanged(coordinator.project().clone()));
            }
            let _ = reply.send(changed);
        }
        Command::Rename { name } => {
            coordinator.rename(name);
            emit(events, SessionEvent::ProjectChanged(coordinator.project().clone()));
        }
        Command::Snapshot { reply } => {
            let _ = reply.send(SessionSnapshot {
                project: coordinator.project().clone(),
                collaborators: coordinator.roster().collaborators(),
                state: coordinator.state(),
            });
        }
        Command::Disconnect => {}
    }
}

/// Hand an event to the host without ever blocking the session.
fn emit(events: &mpsc::Sender<SessionEvent>, event: SessionEvent) {
    match events.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            log::warn!("Session event buffer full; dropping event");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {}
    }
}
