//! Shell state: the project list, its store, and the open tabs.
//!
//! Every tab is its own context with its own identity and presence bus, all
//! attached to one hub. Tab events are funnelled into one channel tagged
//! with the tab number so the shell handles them in arrival order.
//!
//! All tabs edit the current project. Changing it reconnects every tab:
//!
//! ```text
//! select/new/delete ──► snapshot active tab into the list
//!                   ──► change current project
//!                   ──► disconnect tabs (LEAVE) ──► reopen on new project (JOIN)
//!                   ──► save
//! ```

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use prism_collab::{
    BroadcastHub, CollabSession, PresenceBus, ProjectStore, SessionConfig, SessionError,
    SessionEvent, SessionIdentity,
};
use prism_core::ProjectList;
use uuid::Uuid;

struct Tab {
    session: CollabSession,
    forwarder: JoinHandle<()>,
}

pub struct ShellState {
    store: Option<ProjectStore>,
    projects: ProjectList,
    hub: Arc<BroadcastHub>,
    config: SessionConfig,
    tabs: Vec<Tab>,
    active: usize,
    events_tx: mpsc::UnboundedSender<(usize, SessionEvent)>,
}

impl ShellState {
    pub fn new(
        store: Option<ProjectStore>,
        hub: Arc<BroadcastHub>,
        config: SessionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<(usize, SessionEvent)>) {
        let loaded = store.as_ref().map(ProjectStore::load).unwrap_or_default();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let state = Self {
            store,
            projects: ProjectList::from_loaded(loaded),
            hub,
            config,
            tabs: Vec::new(),
            active: 0,
            events_tx,
        };
        (state, events_rx)
    }

    /// Open a new tab on the current project and make it active.
    pub async fn open_tab(&mut self) -> usize {
        let bus = PresenceBus::open(SessionIdentity::random(), self.hub.clone());
        let project = self.projects.current().clone();
        let mut session = CollabSession::connect(bus, project, self.config.clone()).await;

        let index = self.tabs.len();
        let forwarder = match session.take_event_rx() {
            Some(mut rx) => {
                let tx = self.events_tx.clone();
                tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        if tx.send((index, event)).is_err() {
                            break;
                        }
                    }
                })
            }
            None => tokio::spawn(async {}),
        };

        log::info!(
            "Tab {index}: {} joined {}",
            session.identity().name,
            self.projects.current().name
        );
        self.tabs.push(Tab { session, forwarder });
        self.active = index;
        index
    }

    pub fn switch_tab(&mut self, index: usize) -> bool {
        if index >= self.tabs.len() {
            return false;
        }
        self.active = index;
        true
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    pub fn active_session(&self) -> Option<&CollabSession> {
        self.tabs.get(self.active).map(|tab| &tab.session)
    }

    pub fn projects(&self) -> &ProjectList {
        &self.projects
    }

    /// Start a fresh project and move every tab onto it.
    pub async fn new_project(&mut self) -> Uuid {
        self.sync_current().await;
        let id = self.projects.create();
        self.reconnect_tabs().await;
        self.persist();
        id
    }

    /// Make the project at `index` current.
    pub async fn select_project(&mut self, index: usize) -> bool {
        let Some(id) = self.projects.projects().get(index).map(|p| p.id) else {
            return false;
        };
        if id == self.projects.current_id() {
            return true;
        }
        self.sync_current().await;
        self.projects.select(id);
        self.reconnect_tabs().await;
        self.persist();
        true
    }

    /// Delete the project at `index`. Deleting the current one moves the
    /// tabs to whichever project the list selects next.
    pub async fn delete_project(&mut self, index: usize) -> bool {
        let Some(id) = self.projects.projects().get(index).map(|p| p.id) else {
            return false;
        };
        let previous = self.projects.current_id();
        self.sync_current().await;
        self.projects.delete(id);
        if self.projects.current_id() != previous {
            self.reconnect_tabs().await;
        }
        self.persist();
        true
    }

    /// Rename the current project here and in every tab.
    pub fn rename_project(&mut self, name: &str) {
        let id = self.projects.current_id();
        self.projects.rename(id, name);
        for (index, tab) in self.tabs.iter().enumerate() {
            if let Err(e) = tab.session.rename(name) {
                log::warn!("Tab {index}: rename not applied: {e}");
            }
        }
        self.persist();
    }

    /// Make an earlier generated version current in the active tab.
    pub async fn restore_version(&mut self, version: u32) -> Result<bool, SessionError> {
        let Some(session) = self.active_session() else {
            return Ok(false);
        };
        let restored = session.restore_version(version).await?;
        if restored {
            self.sync_current().await;
            self.persist();
        }
        Ok(restored)
    }

    /// Copy the active tab's project into the list.
    async fn sync_current(&mut self) {
        let Some(session) = self.active_session() else {
            return;
        };
        let snapshot = session.snapshot().await;
        match snapshot {
            Ok(snapshot) => {
                self.projects.replace(snapshot.project);
            }
            Err(e) => log::warn!("Tab {}: no snapshot: {e}", self.active),
        }
    }

    /// Reopen every tab on the current project, keeping the tab count and
    /// the active tab.
    async fn reconnect_tabs(&mut self) {
        let count = self.tabs.len();
        let active = self.active;
        self.close_tabs().await;
        for _ in 0..count {
            self.open_tab().await;
        }
        self.active = active.min(count.saturating_sub(1));
    }

    async fn close_tabs(&mut self) {
        for tab in self.tabs.drain(..) {
            tab.session.disconnect().await;
            let _ = tab.forwarder.await;
        }
    }

    /// React to a tab event. Project changes are persisted.
    pub fn on_event(&mut self, tab: usize, event: &SessionEvent) {
        match event {
            SessionEvent::ProjectChanged(project) => {
                if self.projects.replace(project.clone()) {
                    self.persist();
                }
            }
            SessionEvent::RosterChanged(collaborators) => {
                log::debug!("Tab {tab}: {} others present", collaborators.len());
            }
            SessionEvent::Disconnected => {
                log::debug!("Tab {tab}: disconnected");
            }
        }
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save(self.projects.projects()) {
            log::error!("Failed to save projects: {e}");
        }
    }

    /// Disconnect every tab and save.
    pub async fn shutdown(&mut self) {
        self.close_tabs().await;
        self.persist();
    }
}
