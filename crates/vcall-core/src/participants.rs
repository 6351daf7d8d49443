use crate::events::{CallEvent, EventEmitter, MediaKind, MediaStatus, Participant};

/// Who is visible in the call right now.
///
/// Mutated only by the session task, from engine callbacks. Every
/// mutation publishes through the shared [`EventEmitter`]; UI layers read
/// through [`RosterStore::snapshot`].
pub struct RosterStore {
    participants: Vec<Participant>,
    screen_share: Option<Participant>,
    emitter: EventEmitter,
}

impl RosterStore {
    pub fn new(emitter: EventEmitter) -> Self {
        Self {
            participants: Vec::new(),
            screen_share: None,
            emitter,
        }
    }

    pub fn add_participant(&mut self, info: Participant) {
        if info.user_id.is_empty() {
            return;
        }
        if self.participants.iter().any(|p| p.same_entity(&info)) {
            tracing::debug!("participant {} already present, refreshing", info.user_id);
            self.emit_roster();
            return;
        }
        self.participants.push(info.clone());
        self.emitter.emit(CallEvent::ParticipantJoined(info));
        self.emit_roster();
    }

    /// Removes every entry for `user_id`, including stale duplicates.
    pub fn remove_participant(&mut self, user_id: &str) {
        if user_id.is_empty() {
            return;
        }
        let mut index = 0;
        while index < self.participants.len() {
            if self.participants[index].user_id == user_id {
                let removed = self.participants.remove(index);
                self.emitter.emit(CallEvent::ParticipantLeft(removed));
                self.emit_roster();
            } else {
                index += 1;
            }
        }
    }

    /// Drop everyone, screen share included, without notifying anyone.
    pub fn clear(&mut self) {
        self.participants.clear();
        self.screen_share = None;
    }

    /// The event goes out even when no entry matches: the UI may be showing
    /// the local device before its roster entry exists.
    pub fn set_microphone(&mut self, user_id: &str, on: bool) {
        if user_id.is_empty() {
            return;
        }
        for p in self.participants.iter_mut().filter(|p| p.user_id == user_id) {
            p.mic_on = on;
        }
        self.emit_media_status(user_id, MediaKind::Audio, on);
    }

    pub fn set_camera(&mut self, user_id: &str, on: bool) {
        if user_id.is_empty() {
            return;
        }
        for p in self.participants.iter_mut().filter(|p| p.user_id == user_id) {
            p.camera_on = on;
        }
        self.emit_media_status(user_id, MediaKind::Video, on);
    }

    /// Install or clear the screen-share slot.
    pub fn set_screen_share(&mut self, info: Option<Participant>) {
        match info {
            Some(mut info) => {
                if let Some(existing) = self.participant(&info.user_id) {
                    info.mic_on = existing.mic_on;
                    info.camera_on = existing.camera_on;
                }
                info.is_screen_share = true;
                self.screen_share = Some(info);
                self.emit_roster();
                self.emitter.emit(CallEvent::ScreenShareChanged { started: true });
            }
            None => {
                if self.screen_share.take().is_some() {
                    self.emit_roster();
                    self.emitter.emit(CallEvent::ScreenShareChanged { started: false });
                }
            }
        }
    }

    /// Clear the screen-share slot only if it belongs to `user_id`.
    pub fn remove_screen_share(&mut self, user_id: &str) {
        let matches = self
            .screen_share
            .as_ref()
            .is_some_and(|s| !user_id.is_empty() && s.user_id == user_id);
        if matches {
            self.set_screen_share(None);
        }
    }

    pub fn screen_share(&self) -> Option<&Participant> {
        self.screen_share.as_ref()
    }

    /// Screen share first, then members in join order.
    pub fn snapshot(&self) -> Vec<Participant> {
        let mut list = Vec::with_capacity(self.participants.len() + 1);
        list.extend(self.screen_share.iter().cloned());
        list.extend(self.participants.iter().cloned());
        list
    }

    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        if user_id.is_empty() {
            return None;
        }
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    /// Display name of a member, or `""` when unknown.
    pub fn display_name(&self, user_id: &str) -> &str {
        self.participant(user_id)
            .map(|p| p.user_name.as_str())
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    fn emit_roster(&self) {
        self.emitter.emit(CallEvent::RosterChanged(self.snapshot()));
    }

    fn emit_media_status(&self, user_id: &str, kind: MediaKind, on: bool) {
        self.emitter.emit(CallEvent::MediaStatusChanged {
            user_id: user_id.to_string(),
            kind,
            status: MediaStatus::from(on),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::EventCapture;

    fn make_participant(id: &str, name: &str) -> Participant {
        Participant::new(id, name)
    }

    fn store() -> (RosterStore, EventCapture) {
        let emitter = EventEmitter::new();
        let capture = EventCapture::attach(&emitter);
        (RosterStore::new(emitter), capture)
    }

    fn ids(list: &[Participant]) -> Vec<(String, bool)> {
        list.iter()
            .map(|p| (p.user_id.clone(), p.is_screen_share))
            .collect()
    }

    #[test]
    fn add_emits_joined_then_roster() {
        let (mut roster, capture) = store();
        roster.add_participant(make_participant("u1", "Alice"));

        let events = capture.take();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], CallEvent::ParticipantJoined(p) if p.user_id == "u1"));
        assert!(matches!(&events[1], CallEvent::RosterChanged(list) if list.len() == 1));
    }

    #[test]
    fn add_with_empty_id_is_ignored() {
        let (mut roster, capture) = store();
        roster.add_participant(make_participant("", "Nobody"));
        assert!(roster.is_empty());
        assert!(capture.take().is_empty());
    }

    #[test]
    fn duplicate_add_only_refreshes() {
        let (mut roster, capture) = store();
        roster.add_participant(make_participant("u1", "Alice"));
        capture.take();

        roster.add_participant(make_participant("u1", "Alice again"));

        assert_eq!(roster.len(), 1);
        let events = capture.take();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], CallEvent::RosterChanged(_)));
    }

    #[test]
    fn no_two_entries_share_an_id_across_adds_and_removes() {
        let (mut roster, _capture) = store();
        let script = [
            ("add", "u1"),
            ("add", "u2"),
            ("add", "u1"),
            ("remove", "u2"),
            ("add", "u2"),
            ("add", "u2"),
            ("remove", "u1"),
            ("add", "u1"),
        ];
        for (op, id) in script {
            match op {
                "add" => roster.add_participant(make_participant(id, id)),
                _ => roster.remove_participant(id),
            }
            let snapshot = roster.snapshot();
            for p in &snapshot {
                let count = snapshot.iter().filter(|q| q.user_id == p.user_id).count();
                assert_eq!(count, 1, "duplicate entry for {}", p.user_id);
            }
        }
        assert_eq!(ids(&roster.snapshot()), vec![("u2".into(), false), ("u1".into(), false)]);
    }

    #[test]
    fn remove_emits_left_and_roster() {
        let (mut roster, capture) = store();
        roster.add_participant(make_participant("u1", "Alice"));
        roster.add_participant(make_participant("u2", "Bob"));
        capture.take();

        roster.remove_participant("u1");

        assert!(roster.participant("u1").is_none());
        assert!(roster.participant("u2").is_some());
        let events = capture.take();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], CallEvent::ParticipantLeft(p) if p.user_name == "Alice"));
    }

    #[test]
    fn remove_unknown_or_empty_id_is_silent() {
        let (mut roster, capture) = store();
        roster.add_participant(make_participant("u1", "Alice"));
        capture.take();

        roster.remove_participant("");
        roster.remove_participant("ghost");

        assert_eq!(roster.len(), 1);
        assert!(capture.take().is_empty());
    }

    #[test]
    fn clear_is_silent_and_drops_screen_share() {
        let (mut roster, capture) = store();
        roster.add_participant(make_participant("u1", "Alice"));
        roster.set_screen_share(Some(Participant::screen_share("u1", "Alice")));
        capture.take();

        roster.clear();

        assert!(roster.snapshot().is_empty());
        assert!(roster.screen_share().is_none());
        assert!(capture.take().is_empty());
    }

    #[test]
    fn media_update_on_unknown_id_still_emits() {
        let (mut roster, capture) = store();
        roster.set_microphone("u1", false);

        assert_eq!(roster.len(), 0);
        let events = capture.take();
        assert_eq!(events.len(), 1);
        match &events[0] {
            CallEvent::MediaStatusChanged { user_id, kind, status } => {
                assert_eq!(user_id, "u1");
                assert_eq!(*kind, MediaKind::Audio);
                assert_eq!(*status, MediaStatus::Off);
            }
            other => panic!("expected MediaStatusChanged, got {other:?}"),
        }
    }

    #[test]
    fn media_update_mutates_in_place() {
        let (mut roster, _capture) = store();
        roster.add_participant(make_participant("u1", "Alice"));
        roster.set_camera("u1", true);
        roster.set_microphone("u1", true);

        let p = roster.participant("u1").unwrap();
        assert!(p.camera_on);
        assert!(p.mic_on);
    }

    #[test]
    fn screen_share_is_listed_first() {
        let (mut roster, _capture) = store();
        roster.add_participant(make_participant("u1", "Alice"));
        roster.add_participant(make_participant("u2", "Bob"));
        roster.set_screen_share(Some(Participant::screen_share("u2", "Bob")));
        roster.add_participant(make_participant("u3", "Carol"));

        assert_eq!(
            ids(&roster.snapshot()),
            vec![
                ("u2".into(), true),
                ("u1".into(), false),
                ("u2".into(), false),
                ("u3".into(), false),
            ]
        );
    }

    #[test]
    fn screen_share_inherits_member_flags() {
        let (mut roster, capture) = store();
        let mut alice = make_participant("u1", "Alice");
        alice.mic_on = false;
        alice.camera_on = true;
        roster.add_participant(alice);
        capture.take();

        roster.set_screen_share(Some(Participant::screen_share("u1", "Alice")));

        let screen = roster.screen_share().unwrap();
        assert!(!screen.mic_on);
        assert!(screen.camera_on);
        let events = capture.take();
        assert!(matches!(&events[0], CallEvent::RosterChanged(list) if list[0].is_screen_share));
        assert!(matches!(&events[1], CallEvent::ScreenShareChanged { started: true }));
    }

    #[test]
    fn screen_share_scenario_outlives_member() {
        let (mut roster, _capture) = store();
        roster.add_participant(make_participant("u1", "Alice"));
        assert_eq!(ids(&roster.snapshot()), vec![("u1".into(), false)]);

        roster.set_screen_share(Some(Participant::screen_share("u1", "Alice")));
        let snapshot = roster.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot[0].is_screen_share);

        roster.remove_participant("u1");
        assert_eq!(ids(&roster.snapshot()), vec![("u1".into(), true)]);
    }

    #[test]
    fn clearing_screen_share_with_other_id_is_noop() {
        let (mut roster, capture) = store();
        roster.set_screen_share(Some(Participant::screen_share("u1", "Alice")));
        capture.take();

        roster.remove_screen_share("u2");
        roster.remove_screen_share("");

        assert_eq!(roster.screen_share().map(|s| s.user_id.as_str()), Some("u1"));
        assert!(capture.take().is_empty());
    }

    #[test]
    fn clearing_screen_share_by_id_emits_stop() {
        let (mut roster, capture) = store();
        roster.set_screen_share(Some(Participant::screen_share("u1", "Alice")));
        capture.take();

        roster.remove_screen_share("u1");

        assert!(roster.screen_share().is_none());
        let events = capture.take();
        assert!(matches!(&events[0], CallEvent::RosterChanged(list) if list.is_empty()));
        assert!(matches!(&events[1], CallEvent::ScreenShareChanged { started: false }));
    }

    #[test]
    fn explicit_clear_of_empty_slot_is_silent() {
        let (mut roster, capture) = store();
        roster.set_screen_share(None);
        assert!(capture.take().is_empty());
    }

    #[test]
    fn lookup_helpers_return_sentinels() {
        let (mut roster, _capture) = store();
        roster.add_participant(make_participant("u1", "Alice"));

        assert_eq!(roster.display_name("u1"), "Alice");
        assert_eq!(roster.display_name("ghost"), "");
        assert_eq!(roster.display_name(""), "");
        assert!(roster.participant("").is_none());
    }
}
