//! Reconciliation of remote events with the local project and roster.
//!
//! The coordinator does no I/O and owns no timers. The session task feeds it
//! incoming events and ticks with the current [`Instant`]; it answers with
//! an [`Outcome`] and publishes through the [`PresenceBus`] it is handed.
//!
//! ```text
//!            connect()                 disconnect()
//! Disconnected ────────► Connected ──────────────► Disconnected
//!                          │  ▲
//!          handle(event) ──┘  └── sweep(now), local_edit(), move_cursor()
//! ```

use tokio::time::{Duration, Instant};
use uuid::Uuid;

use prism_core::{now_millis, vfs::ROOT_FILE, Generation, Project, VirtualFile};

use crate::generator::GeneratorError;
use crate::presence::PresenceBus;
use crate::protocol::{CollabEvent, Collaborator, CursorPosition, Incoming};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Disconnected,
    Connected,
}

/// What handling one event changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ignored,
    DocumentChanged,
    RosterChanged,
}

#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub collaborator: Collaborator,
    /// Receipt time of the last event from this participant.
    pub last_seen: Instant,
}

/// Remote participants in first-seen order. Never holds the local identity.
#[derive(Debug, Clone)]
pub struct Roster {
    local_id: Uuid,
    entries: Vec<RosterEntry>,
}

impl Roster {
    pub fn new(local_id: Uuid) -> Self {
        Self {
            local_id,
            entries: Vec::new(),
        }
    }

    /// Insert or refresh `sender` from a `JOIN` or `HEARTBEAT` payload.
    /// The entry is keyed on the sender, whatever id the payload claims.
    /// An existing entry keeps its file and cursor.
    ///
    /// Returns `true` if anything other than liveness changed.
    pub fn upsert(&mut self, sender: Uuid, info: &Collaborator, now: Instant) -> bool {
        if sender == self.local_id {
            return false;
        }

        match self.entries.iter_mut().find(|e| e.collaborator.id == sender) {
            Some(entry) => {
                let changed =
                    entry.collaborator.name != info.name || entry.collaborator.color != info.color;
                entry.collaborator.name = info.name.clone();
                entry.collaborator.color = info.color.clone();
                entry.collaborator.last_active = now_millis();
                entry.last_seen = now;
                changed
            }
            None => {
                let mut collaborator = info.clone();
                collaborator.id = sender;
                collaborator.last_active = now_millis();
                self.entries.push(RosterEntry {
                    collaborator,
                    last_seen: now,
                });
                log::debug!("{} ({sender}) joined the roster", info.name);
                true
            }
        }
    }

    /// Insert or update `sender` from a `CURSOR_MOVE`, taking its file and
    /// cursor position.
    pub fn merge_cursor(&mut self, sender: Uuid, info: &Collaborator, now: Instant) -> bool {
        if sender == self.local_id {
            return false;
        }

        let added = self.upsert(sender, info, now);
        match self.entries.iter_mut().find(|e| e.collaborator.id == sender) {
            Some(entry) => {
                let moved = entry.collaborator.file != info.file
                    || entry.collaborator.cursor_position != info.cursor_position;
                entry.collaborator.file = info.file.clone();
                entry.collaborator.cursor_position = info.cursor_position;
                added || moved
            }
            None => added,
        }
    }

    /// Refresh the liveness of a known participant. Unknown ids are not
    /// added. Returns whether `id` is in the roster.
    pub fn touch(&mut self, id: Uuid, now: Instant) -> bool {
        match self.entries.iter_mut().find(|e| e.collaborator.id == id) {
            Some(entry) => {
                entry.last_seen = now;
                entry.collaborator.last_active = now_millis();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.collaborator.id != id);
        let removed = self.entries.len() != before;
        if removed {
            log::debug!("{id} left the roster");
        }
        removed
    }

    /// Drop every participant not heard from within `window` of `now`.
    /// Returns the ids removed.
    pub fn sweep(&mut self, now: Instant, window: Duration) -> Vec<Uuid> {
        let mut expired = Vec::new();
        self.entries.retain(|entry| {
            let alive = now.saturating_duration_since(entry.last_seen) < window;
            if !alive {
                expired.push(entry.collaborator.id);
            }
            alive
        });
        for id in &expired {
            log::debug!("{id} expired from the roster");
        }
        expired
    }

    pub fn collaborators(&self) -> Vec<Collaborator> {
        self.entries.iter().map(|e| e.collaborator.clone()).collect()
    }

    /// Participants whose cursor is in `file_name`.
    pub fn in_file(&self, file_name: &str) -> Vec<&Collaborator> {
        self.entries
            .iter()
            .map(|e| &e.collaborator)
            .filter(|c| c.file.as_deref() == Some(file_name))
            .collect()
    }

    pub fn get(&self, id: Uuid) -> Option<&RosterEntry> {
        self.entries.iter().find(|e| e.collaborator.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Owns the authoritative project document and the roster for one context.
pub struct SyncCoordinator {
    state: SyncState,
    project: Project,
    roster: Roster,
    liveness_window: Duration,
}

impl SyncCoordinator {
    pub fn new(project: Project, local_id: Uuid, liveness_window: Duration) -> Self {
        Self {
            state: SyncState::Disconnected,
            project,
            roster: Roster::new(local_id),
            liveness_window,
        }
    }

    /// Announce entry and start accepting events.
    pub fn connect(&mut self, bus: &PresenceBus) {
        if self.state == SyncState::Connected {
            return;
        }
        self.state = SyncState::Connected;
        bus.join();
        log::info!(
            "{} connected to project {}",
            bus.identity().name,
            self.project.id
        );
    }

    /// Announce exit and forget every remote participant.
    pub fn disconnect(&mut self, bus: &PresenceBus) {
        if self.state == SyncState::Disconnected {
            return;
        }
        bus.leave();
        self.roster.clear();
        self.state = SyncState::Disconnected;
        log::info!(
            "{} disconnected from project {}",
            bus.identity().name,
            self.project.id
        );
    }

    /// Apply one event from another context.
    pub fn handle(&mut self, incoming: &Incoming, now: Instant) -> Outcome {
        if self.state == SyncState::Disconnected {
            return Outcome::Ignored;
        }

        let sender = incoming.sender_id;
        let changed_roster = match &incoming.event {
            CollabEvent::Join(info) | CollabEvent::Heartbeat(info) => {
                self.roster.upsert(sender, info, now)
            }
            CollabEvent::CursorMove(info) => self.roster.merge_cursor(sender, info, now),
            CollabEvent::Leave { .. } => self.roster.remove(sender),
            CollabEvent::CodeUpdate(update) => {
                // Any event from a known participant counts as liveness.
                self.roster.touch(sender, now);
                if update.project_id != self.project.id {
                    return Outcome::Ignored;
                }
                return if self.project.apply_remote(&update.file_name, &update.new_code) {
                    Outcome::DocumentChanged
                } else {
                    Outcome::Ignored
                };
            }
        };

        if changed_roster {
            Outcome::RosterChanged
        } else {
            Outcome::Ignored
        }
    }

    /// Merge a local edit and tell the other contexts about it.
    ///
    /// Returns `false`, and publishes nothing, when the edit does not change
    /// the document.
    pub fn local_edit(&mut self, bus: &PresenceBus, file_name: &str, content: &str) -> bool {
        if !self.project.edit_file(file_name, content) {
            return false;
        }
        if self.state == SyncState::Connected {
            bus.sync_code(self.project.id, file_name, content);
        }
        true
    }

    pub fn move_cursor(&self, bus: &PresenceBus, file_name: &str, position: CursorPosition) {
        if self.state == SyncState::Connected {
            bus.sync_cursor(file_name, position);
        }
    }

    pub fn heartbeat(&self, bus: &PresenceBus) {
        if self.state == SyncState::Connected {
            bus.heartbeat();
        }
    }

    /// Commit a generator outcome. A new document is published whole, as
    /// the root file.
    pub fn apply_generation(
        &mut self,
        bus: &PresenceBus,
        prompt: &str,
        attachment: Option<String>,
        result: &Result<Generation, GeneratorError>,
    ) -> bool {
        if let Err(e) = result {
            log::warn!("Generation failed for project {}: {e}", self.project.id);
        }

        let changed = self.project.record_generation(prompt, attachment, result);
        if changed && self.state == SyncState::Connected {
            bus.sync_code(self.project.id, ROOT_FILE, self.project.current_code.clone());
        }
        changed
    }

    /// Make an earlier version current. The restored document is published
    /// whole, as the root file.
    pub fn restore_version(&mut self, bus: &PresenceBus, version: u32) -> bool {
        if !self.project.restore_version(version) {
            return false;
        }
        if self.state == SyncState::Connected {
            bus.sync_code(self.project.id, ROOT_FILE, self.project.current_code.clone());
        }
        true
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.project.rename(name);
    }

    /// Expire silent participants.
    pub fn sweep(&mut self, now: Instant) -> Vec<Uuid> {
        self.roster.sweep(now, self.liveness_window)
    }

    pub fn files(&self) -> Vec<VirtualFile> {
        self.project.files()
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn state(&self) -> SyncState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::SessionIdentity;
    use crate::protocol::CodeUpdate;

    const SAMPLE: &str = "<html><head><style>a{}</style></head><body><script type=\"text/babel\">x=1</script></body></html>";

    fn peer(name: &str) -> Collaborator {
        SessionIdentity::with_id(Uuid::new_v4(), name, "#fbbf24").collaborator()
    }

    fn incoming(sender_id: Uuid, event: CollabEvent) -> Incoming {
        Incoming { sender_id, event }
    }

    fn connected() -> (SyncCoordinator, PresenceBus) {
        let bus = PresenceBus::solo(SessionIdentity::random());
        let mut project = Project::new();
        project.current_code = SAMPLE.to_string();
        let mut coordinator =
            SyncCoordinator::new(project, bus.identity().id, Duration::from_secs(10));
        coordinator.connect(&bus);
        (coordinator, bus)
    }

    fn code_update(project_id: Uuid, file: &str, code: &str) -> CollabEvent {
        CollabEvent::CodeUpdate(CodeUpdate {
            project_id,
            file_name: file.into(),
            new_code: code.into(),
        })
    }

    #[test]
    fn test_roster_excludes_local_identity() {
        let local = Uuid::new_v4();
        let mut roster = Roster::new(local);
        let mut me = peer("Me");
        me.id = local;

        assert!(!roster.upsert(local, &me, Instant::now()));
        assert!(roster.is_empty());
    }

    #[test]
    fn test_heartbeat_keeps_cursor() {
        let mut roster = Roster::new(Uuid::new_v4());
        let now = Instant::now();
        let mut info = peer("Alex");
        info.file = Some("App.tsx".into());
        info.cursor_position = Some(CursorPosition::new(2, 5));
        roster.merge_cursor(info.id, &info, now);

        let heartbeat = Collaborator {
            file: None,
            cursor_position: None,
            ..info.clone()
        };
        assert!(!roster.upsert(info.id, &heartbeat, now));

        let entry = roster.get(info.id).unwrap();
        assert_eq!(entry.collaborator.file.as_deref(), Some("App.tsx"));
        assert_eq!(roster.in_file("App.tsx").len(), 1);
    }

    #[test]
    fn test_sweep_boundary() {
        let start = Instant::now();
        let window = Duration::from_secs(10);
        let mut roster = Roster::new(Uuid::new_v4());
        let fresh = peer("Sam");
        let stale = peer("Quinn");
        roster.upsert(fresh.id, &fresh, start);
        roster.upsert(stale.id, &stale, start);

        // Refreshed at 9 s, swept at 10 s: still present.
        roster.upsert(fresh.id, &fresh, start + Duration::from_secs(9));
        let removed = roster.sweep(start + Duration::from_secs(10), window);

        assert_eq!(removed, vec![stale.id]);
        assert!(roster.get(fresh.id).is_some());
        assert!(roster.get(stale.id).is_none());
    }

    #[test]
    fn test_sweep_just_inside_window() {
        let start = Instant::now();
        let mut roster = Roster::new(Uuid::new_v4());
        let riley = peer("Riley");
        roster.upsert(riley.id, &riley, start);

        let removed = roster.sweep(start + Duration::from_millis(9_999), Duration::from_secs(10));
        assert!(removed.is_empty());
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_join_then_leave() {
        let (mut coordinator, _bus) = connected();
        let alex = peer("Alex");
        let now = Instant::now();

        let outcome = coordinator.handle(&incoming(alex.id, CollabEvent::Join(alex.clone())), now);
        assert_eq!(outcome, Outcome::RosterChanged);
        assert_eq!(coordinator.roster().len(), 1);

        let outcome = coordinator.handle(&incoming(alex.id, CollabEvent::Leave { id: alex.id }), now);
        assert_eq!(outcome, Outcome::RosterChanged);
        assert!(coordinator.roster().is_empty());
    }

    #[test]
    fn test_cursor_move_from_unknown_sender_is_added() {
        let (mut coordinator, _bus) = connected();
        let mut casey = peer("Casey");
        casey.file = Some("styles.css".into());
        casey.cursor_position = Some(CursorPosition::new(1, 1));

        let outcome = coordinator.handle(
            &incoming(casey.id, CollabEvent::CursorMove(casey.clone())),
            Instant::now(),
        );
        assert_eq!(outcome, Outcome::RosterChanged);
        assert_eq!(coordinator.roster().in_file("styles.css")[0].id, casey.id);
    }

    #[test]
    fn test_code_update_merges_into_open_project() {
        let (mut coordinator, _bus) = connected();
        let project_id = coordinator.project().id;
        let sender = Uuid::new_v4();

        let outcome = coordinator.handle(
            &incoming(sender, code_update(project_id, "styles.css", "b{}")),
            Instant::now(),
        );
        assert_eq!(outcome, Outcome::DocumentChanged);
        assert_eq!(
            coordinator.project().current_code,
            SAMPLE.replace("a{}", "b{}")
        );
    }

    #[test]
    fn test_code_update_for_other_project_is_ignored() {
        let (mut coordinator, _bus) = connected();
        let outcome = coordinator.handle(
            &incoming(Uuid::new_v4(), code_update(Uuid::new_v4(), "styles.css", "b{}")),
            Instant::now(),
        );
        assert_eq!(outcome, Outcome::Ignored);
        assert_eq!(coordinator.project().current_code, SAMPLE);
    }

    #[test]
    fn test_last_writer_wins() {
        let (mut coordinator, _bus) = connected();
        let project_id = coordinator.project().id;
        let now = Instant::now();

        coordinator.handle(&incoming(Uuid::new_v4(), code_update(project_id, "App.tsx", "A")), now);
        coordinator.handle(&incoming(Uuid::new_v4(), code_update(project_id, "App.tsx", "B")), now);

        let expected = prism_core::merge(&prism_core::merge(SAMPLE, "App.tsx", "A"), "App.tsx", "B");
        assert_eq!(coordinator.project().current_code, expected);
    }

    #[test]
    fn test_roster_keyed_on_sender() {
        let (mut coordinator, _bus) = connected();
        let sender = Uuid::new_v4();
        let mut claims_other = peer("Morgan");
        claims_other.id = Uuid::new_v4();
        let now = Instant::now();

        coordinator.handle(&incoming(sender, CollabEvent::Join(claims_other.clone())), now);
        let entry = coordinator.roster().get(sender).unwrap();
        assert_eq!(entry.collaborator.name, "Morgan");
        assert!(coordinator.roster().get(claims_other.id).is_none());

        let outcome = coordinator.handle(&incoming(sender, CollabEvent::Leave { id: sender }), now);
        assert_eq!(outcome, Outcome::RosterChanged);
        assert!(coordinator.roster().is_empty());
    }

    #[test]
    fn test_code_update_refreshes_sender() {
        let (mut coordinator, _bus) = connected();
        let project_id = coordinator.project().id;
        let alex = peer("Alex");
        let start = Instant::now();

        coordinator.handle(&incoming(alex.id, CollabEvent::Join(alex.clone())), start);
        coordinator.handle(
            &incoming(alex.id, code_update(project_id, "App.tsx", "y=2")),
            start + Duration::from_secs(9),
        );
        // Another project's update still shows the sender is alive.
        coordinator.handle(
            &incoming(alex.id, code_update(Uuid::new_v4(), "App.tsx", "z")),
            start + Duration::from_secs(12),
        );

        assert!(coordinator.sweep(start + Duration::from_secs(20)).is_empty());
        assert_eq!(coordinator.sweep(start + Duration::from_secs(22)), vec![alex.id]);
    }

    #[test]
    fn test_code_update_from_unknown_sender_does_not_add() {
        let (mut coordinator, _bus) = connected();
        let project_id = coordinator.project().id;
        coordinator.handle(
            &incoming(Uuid::new_v4(), code_update(project_id, "App.tsx", "y=2")),
            Instant::now(),
        );
        assert!(coordinator.roster().is_empty());
    }

    #[test]
    fn test_restore_version_and_rename() {
        let (mut coordinator, bus) = connected();
        let v1 = Generation {
            html: "<p>1</p>".into(),
            explanation: "one".into(),
        };
        coordinator.apply_generation(&bus, "one", None, &Ok(v1));
        coordinator.local_edit(&bus, "index.html", "<p>edited</p>");

        assert!(coordinator.restore_version(&bus, 1));
        assert_eq!(coordinator.project().current_code, "<p>1</p>");
        assert!(!coordinator.restore_version(&bus, 4));

        coordinator.rename("Scratch");
        assert_eq!(coordinator.project().name, "Scratch");
    }

    #[test]
    fn test_disconnected_ignores_events() {
        let bus = PresenceBus::solo(SessionIdentity::random());
        let mut coordinator =
            SyncCoordinator::new(Project::new(), bus.identity().id, Duration::from_secs(10));
        let alex = peer("Alex");

        let outcome = coordinator.handle(&incoming(alex.id, CollabEvent::Join(alex)), Instant::now());
        assert_eq!(outcome, Outcome::Ignored);
        assert_eq!(coordinator.state(), SyncState::Disconnected);
    }

    #[test]
    fn test_disconnect_clears_roster() {
        let (mut coordinator, bus) = connected();
        let alex = peer("Alex");
        coordinator.handle(&incoming(alex.id, CollabEvent::Join(alex)), Instant::now());

        coordinator.disconnect(&bus);
        assert!(coordinator.roster().is_empty());
        assert_eq!(coordinator.state(), SyncState::Disconnected);
    }

    #[test]
    fn test_local_edit_unchanged_is_ignored() {
        let (mut coordinator, bus) = connected();
        assert!(!coordinator.local_edit(&bus, "styles.css", "a{}"));
        assert!(coordinator.local_edit(&bus, "styles.css", "c{}"));
        assert!(coordinator.project().current_code.contains("<style>c{}</style>"));
    }

    #[test]
    fn test_failed_generation_keeps_document() {
        let (mut coordinator, bus) = connected();
        let result = Err(GeneratorError::EmptyResponse);

        assert!(!coordinator.apply_generation(&bus, "make it pop", None, &result));
        assert_eq!(coordinator.project().current_code, SAMPLE);
        assert_eq!(coordinator.project().messages.len(), 2);
    }
}
