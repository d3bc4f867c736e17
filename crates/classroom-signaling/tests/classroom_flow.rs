//! End-to-end classroom flows.
//!
//! A `HostActor` and one `ParticipantActor` per student share a recording
//! pub/sub bus; SDK collaborators are mocks from `classroom-test-utils`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use classroom_signaling::actors::{
    AdmissionAction, HostActor, HostActorHandle, ParticipantActor, ParticipantActorHandle,
    ParticipantDeps, ParticipantState,
};
use classroom_signaling::control::ControlOutcome;
use classroom_signaling::dispatcher::{ControlDispatcher, GlobalMicState, Hotkey};
use classroom_signaling::errors::SignalingError;
use classroom_signaling::messages::{
    ControlCommand, ControlMessage, HighlightMessage, HighlightTarget, SignalMessage, Topic,
};
use classroom_signaling::pubsub::PubSub;
use classroom_signaling::session::SessionFlags;
use classroom_test_utils::{
    eventually, pid, random_student, student, EntryDecision, EntryDecisions, MicCall,
    MockMeeting, MockMic, RecordingPubSub, TestClassroom, TestEnvelope,
};
use common::types::Role;
use tokio_util::sync::CancellationToken;

const REJOIN_SUPPRESSION: Duration = Duration::from_secs(15);

// ============================================================================
// Rig
// ============================================================================

struct Student {
    handle: ParticipantActorHandle,
    mic: MockMic,
    meeting: MockMeeting,
    session: Arc<SessionFlags>,
}

impl Student {
    async fn state_when(
        &self,
        what: &str,
        done: impl Fn(&ParticipantState) -> bool,
    ) -> ParticipantState {
        let handle = &self.handle;
        let done = &done;
        eventually(what, || async move {
            let state = handle.get_state().await.unwrap();
            done(&state).then_some(state)
        })
        .await
    }

    async fn mic_calls_when(&self, what: &str, count: usize) -> Vec<MicCall> {
        let mic = &self.mic;
        eventually(what, || async move {
            let calls = mic.calls();
            (calls.len() >= count).then_some(calls)
        })
        .await
    }
}

struct Classroom {
    bus: RecordingPubSub,
    host: HostActorHandle,
    students: Vec<Student>,
    cancel: CancellationToken,
}

impl Classroom {
    fn start(student_ids: &[&str]) -> Self {
        Self::start_on(RecordingPubSub::new(), student_ids, MockMic::new)
    }

    fn start_on(bus: RecordingPubSub, student_ids: &[&str], mic: impl Fn() -> MockMic) -> Self {
        let cancel = CancellationToken::new();

        let students = student_ids
            .iter()
            .map(|id| {
                let mic = mic();
                let meeting = MockMeeting::new();
                let session = Arc::new(SessionFlags::new());
                let deps = ParticipantDeps {
                    mic: Arc::new(mic.clone()),
                    meeting: Arc::new(meeting.clone()),
                    session: Arc::clone(&session),
                    bus: bus.as_dyn(),
                };
                let (handle, _task) = ParticipantActor::spawn(
                    student(id),
                    deps,
                    REJOIN_SUPPRESSION,
                    cancel.child_token(),
                );
                Student {
                    handle,
                    mic,
                    meeting,
                    session,
                }
            })
            .collect();

        let roster = TestClassroom::new("teacher")
            .with_students(student_ids.iter().copied())
            .build();
        let (host, _task) = HostActor::spawn(
            roster,
            ControlDispatcher::new(Role::Teacher),
            bus.as_dyn(),
            cancel.child_token(),
        );

        Self {
            bus,
            host,
            students,
            cancel,
        }
    }

    fn student(&self, index: usize) -> &Student {
        self.students.get(index).unwrap()
    }
}

impl Drop for Classroom {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn control_commands(bus: &RecordingPubSub) -> Vec<(ControlCommand, String)> {
    bus.messages_on(Topic::Control)
        .into_iter()
        .filter_map(|m| match m {
            SignalMessage::Control(c) => Some((c.command, c.to.to_string())),
            _ => None,
        })
        .collect()
}

fn cmd(command: ControlCommand, to: &str) -> (ControlCommand, String) {
    (command, to.to_string())
}

// ============================================================================
// Hotkeys
// ============================================================================

#[tokio::test]
async fn test_selecting_a_student_unmutes_and_highlights_them() {
    let room = Classroom::start(&["a", "b", "c"]);

    room.host.key_pressed(Hotkey::Select(0)).await.unwrap();

    let a = room.student(0);
    assert_eq!(a.mic_calls_when("a unmuted", 1).await, vec![MicCall::Unmute]);
    let state = a.state_when("a highlighted", |s| s.highlighted).await;
    assert_eq!(state.last_control, Some(ControlOutcome::MicUnmuted));

    let b = room.student(1);
    let state = b
        .state_when("b sees highlight", |s| s.highlight != HighlightTarget::None)
        .await;
    assert!(!state.highlighted);
    assert_eq!(state.last_control, None, "Control for a is not addressed to b");
    assert!(b.mic.calls().is_empty());
}

#[tokio::test]
async fn test_moving_selection_mutes_previous_student() {
    let room = Classroom::start(&["a", "b", "c"]);

    room.host.key_pressed(Hotkey::Select(0)).await.unwrap();
    room.host.key_pressed(Hotkey::Select(1)).await.unwrap();

    assert_eq!(
        control_commands(&room.bus),
        vec![
            cmd(ControlCommand::RequestUnmute, "a"),
            cmd(ControlCommand::Mute, "a"),
            cmd(ControlCommand::RequestUnmute, "b"),
        ]
    );

    let a = room.student(0);
    assert_eq!(
        a.mic_calls_when("a muted again", 2).await,
        vec![MicCall::Unmute, MicCall::Mute]
    );
    assert!(!a.mic.is_on());

    let b = room.student(1);
    b.state_when("b highlighted", |s| s.highlighted).await;
    assert!(b.mic.is_on());
}

#[tokio::test]
async fn test_toggle_all_twice_unmutes_then_mutes_everyone() {
    let room = Classroom::start(&["a", "b", "c"]);

    room.host.key_pressed(Hotkey::ToggleAll).await.unwrap();
    for s in &room.students {
        s.state_when("everyone highlighted", |st| st.highlight == HighlightTarget::All)
            .await;
        assert_eq!(s.mic_calls_when("unmute", 1).await, vec![MicCall::Unmute]);
    }
    assert_eq!(
        room.host.get_state().await.unwrap().global_mic,
        GlobalMicState::AllUnmuted
    );

    room.host.key_pressed(Hotkey::ToggleAll).await.unwrap();
    for s in &room.students {
        s.state_when("highlight cleared", |st| st.highlight == HighlightTarget::None)
            .await;
        assert_eq!(
            s.mic_calls_when("mute", 2).await,
            vec![MicCall::Unmute, MicCall::Mute]
        );
    }
    assert_eq!(
        room.host.get_state().await.unwrap().global_mic,
        GlobalMicState::AllMuted
    );
}

#[tokio::test]
async fn test_hotkey_beyond_roster_publishes_nothing() {
    let room = Classroom::start(&["a"]);

    let published = room.host.key_pressed(Hotkey::Select(3)).await.unwrap();

    assert!(published.is_empty());
    assert!(room.bus.published().is_empty());
}

#[tokio::test]
async fn test_mic_failure_is_reported_and_not_retried() {
    let room = Classroom::start_on(RecordingPubSub::new(), &["a"], || MockMic::new().failing());

    room.host.key_pressed(Hotkey::Select(0)).await.unwrap();

    let a = room.student(0);
    let state = a
        .state_when("failure recorded", |s| s.last_control.is_some())
        .await;
    assert_eq!(
        state.last_control,
        Some(ControlOutcome::MicFailed(ControlCommand::RequestUnmute))
    );
    assert_eq!(a.mic.calls(), vec![MicCall::Unmute]);
}

#[tokio::test]
async fn test_late_joiner_takes_next_hotkey_and_leaving_clears_selection() {
    let room = Classroom::start(&["a"]);
    let latecomer = random_student();
    let late_id = latecomer.id.clone();

    room.host.participant_joined(latecomer).await.unwrap();
    let published = room.host.key_pressed(Hotkey::Select(1)).await.unwrap();

    assert_eq!(published.len(), 2);
    assert_eq!(
        control_commands(&room.bus),
        vec![cmd(ControlCommand::RequestUnmute, late_id.as_str())]
    );

    room.host.participant_left(late_id).await.unwrap();
    let state = room.host.get_state().await.unwrap();
    assert_eq!(state.selected, None);
    assert_eq!(state.participants, vec![pid("a")]);
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test]
async fn test_delayed_mute_does_not_undo_newer_unmute() {
    let room = Classroom::start(&["a"]);
    let a = room.student(0);

    let unmute = TestEnvelope::sent_by("teacher")
        .seq(2)
        .message(ControlMessage::new(ControlCommand::RequestUnmute, pid("a")));
    let stale_mute = TestEnvelope::sent_by("teacher")
        .seq(1)
        .message(ControlMessage::new(ControlCommand::Mute, pid("a")));

    room.bus.publish(Topic::Control, unmute).unwrap();
    room.bus.publish(Topic::Control, stale_mute).unwrap();

    // A later message proves the stale one was already processed.
    let marker = TestEnvelope::sent_by("teacher")
        .seq(3)
        .message(ControlMessage::new(ControlCommand::RequestUnmute, pid("a")));
    room.bus.publish(Topic::Control, marker).unwrap();

    assert_eq!(
        a.mic_calls_when("both unmutes", 2).await,
        vec![MicCall::Unmute, MicCall::Unmute]
    );
    assert!(a.mic.is_on());
}

#[tokio::test]
async fn test_reloaded_host_is_not_treated_as_stale() {
    let room = Classroom::start(&["a"]);
    let a = room.student(0);

    let before_reload = TestEnvelope::sent_by("teacher")
        .epoch(100)
        .seq(7)
        .message(ControlMessage::new(ControlCommand::RequestUnmute, pid("a")));
    let after_reload = TestEnvelope::sent_by("teacher")
        .epoch(200)
        .seq(1)
        .message(ControlMessage::new(ControlCommand::Mute, pid("a")));

    room.bus.publish(Topic::Control, before_reload).unwrap();
    room.bus.publish(Topic::Control, after_reload).unwrap();

    assert_eq!(
        a.mic_calls_when("unmute then mute", 2).await,
        vec![MicCall::Unmute, MicCall::Mute]
    );
}

#[tokio::test]
async fn test_malformed_control_is_dropped_and_actor_keeps_running() {
    let room = Classroom::start(&["a"]);
    let a = room.student(0);

    let garbage = TestEnvelope::sent_by("teacher").raw(serde_json::json!({
        "type": "control",
        "command": "selfDestruct",
        "to": "a"
    }));
    room.bus.publish(Topic::Control, garbage).unwrap();

    room.host.key_pressed(Hotkey::Select(0)).await.unwrap();
    assert_eq!(a.mic_calls_when("unmute", 1).await, vec![MicCall::Unmute]);
}

// ============================================================================
// Transport failures
// ============================================================================

#[tokio::test]
async fn test_highlight_failure_still_sends_control() {
    let bus = RecordingPubSub::new().with_failing_topic(Topic::Highlight);
    let room = Classroom::start_on(bus, &["a", "b"], MockMic::new);

    let result = room.host.key_pressed(Hotkey::Select(1)).await;

    assert!(matches!(result, Err(SignalingError::Publish { .. })));
    assert_eq!(room.bus.rejected(), 1);
    assert_eq!(
        control_commands(&room.bus),
        vec![cmd(ControlCommand::RequestUnmute, "b")]
    );
    assert_eq!(
        room.student(1).mic_calls_when("b unmuted", 1).await,
        vec![MicCall::Unmute]
    );

    // Selection moved even though the highlight was lost.
    let state = room.host.get_state().await.unwrap();
    assert_eq!(state.selected, Some(pid("b")));
    assert_eq!(state.global_mic, GlobalMicState::AllMuted);

    // The next press of the same key treats b as selected and deselects it.
    room.bus.set_failing(Topic::Highlight, false);
    let sent = room.host.key_pressed(Hotkey::Select(1)).await.unwrap();
    assert_eq!(
        sent,
        vec![
            SignalMessage::Control(ControlMessage::new(ControlCommand::Mute, pid("b"))),
            SignalMessage::Highlight(HighlightMessage {
                participant_id: HighlightTarget::None,
            }),
        ]
    );
    assert_eq!(room.host.get_state().await.unwrap().selected, None);
}

#[tokio::test]
async fn test_sequence_numbers_survive_a_failed_publish() {
    let bus = RecordingPubSub::new();
    let room = Classroom::start_on(bus, &["a"], MockMic::new);

    room.host.key_pressed(Hotkey::Select(0)).await.unwrap();
    room.bus.set_failing(Topic::Highlight, true);
    let _ = room.host.key_pressed(Hotkey::Select(0)).await;
    room.bus.set_failing(Topic::Highlight, false);
    room.host.key_pressed(Hotkey::Select(0)).await.unwrap();

    let seqs: Vec<u64> = room
        .bus
        .published_on(Topic::Highlight)
        .iter()
        .map(|e| e.seq)
        .collect();
    assert_eq!(seqs, vec![1, 3], "Failed publish consumes sequence 2");
}

// ============================================================================
// Ending the meeting
// ============================================================================

#[tokio::test]
async fn test_end_meeting_for_everyone() {
    let room = Classroom::start(&["a", "b", "c"]);

    let ended = room.host.end_meeting(None).await.unwrap();
    assert_eq!(ended, 3);

    for s in &room.students {
        let state = s.state_when("meeting ended", |st| st.meeting_ended).await;
        assert_eq!(state.last_control, Some(ControlOutcome::MeetingEnded));
        assert_eq!(s.meeting.leaves(), 1);
        assert_eq!(s.meeting.view_resets(), 1);
        assert!(s.session.is_rejoin_suppressed());
    }
}

#[tokio::test]
async fn test_end_meeting_for_one_student_leaves_others() {
    let room = Classroom::start(&["a", "b"]);

    room.host.key_pressed(Hotkey::Select(1)).await.unwrap();
    assert_eq!(room.host.end_meeting(Some(pid("b"))).await.unwrap(), 1);

    room.student(1)
        .state_when("b ended", |s| s.meeting_ended)
        .await;
    assert_eq!(room.host.get_state().await.unwrap().selected, None);

    // Proves a processed every earlier control message.
    room.host.key_pressed(Hotkey::Select(0)).await.unwrap();
    let a = room.student(0);
    a.state_when("a highlighted", |s| s.highlighted).await;
    assert!(!a.handle.get_state().await.unwrap().meeting_ended);
    assert_eq!(a.meeting.leaves(), 0);
}

#[tokio::test]
async fn test_end_meeting_for_unknown_student_fails() {
    let room = Classroom::start(&["a"]);

    let result = room.host.end_meeting(Some(pid("ghost"))).await;

    assert!(matches!(result, Err(SignalingError::ParticipantNotFound(_))));
    assert!(room.bus.published().is_empty());
}

// ============================================================================
// Admission
// ============================================================================

#[tokio::test]
async fn test_admission_decides_each_request_exactly_once() {
    let room = Classroom::start(&[]);
    let decisions = EntryDecisions::new();

    for id in ["s1", "s2", "s3"] {
        room.host
            .entry_requested(pid(id), id, decisions.responder(&pid(id)))
            .await
            .unwrap();
    }

    assert_eq!(
        room.host
            .admission(AdmissionAction::Deny(pid("s2")))
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        room.host.admission(AdmissionAction::AllowAll).await.unwrap(),
        2
    );
    assert_eq!(
        room.host.admission(AdmissionAction::AllowAll).await.unwrap(),
        0,
        "Empty queue is a no-op"
    );

    assert_eq!(decisions.for_participant(&pid("s1")), vec![EntryDecision::Allowed]);
    assert_eq!(decisions.for_participant(&pid("s2")), vec![EntryDecision::Denied]);
    assert_eq!(decisions.for_participant(&pid("s3")), vec![EntryDecision::Allowed]);

    let result = room.host.admission(AdmissionAction::Allow(pid("s2"))).await;
    assert!(matches!(result, Err(SignalingError::ParticipantNotFound(_))));
}

#[tokio::test]
async fn test_pending_entries_are_listed_in_arrival_order() {
    let room = Classroom::start(&[]);
    let decisions = EntryDecisions::new();

    room.host
        .entry_requested(pid("late"), "Late Larry", decisions.responder(&pid("late")))
        .await
        .unwrap();
    room.host
        .entry_requested(pid("later"), "Later Lu", decisions.responder(&pid("later")))
        .await
        .unwrap();

    let pending: Vec<String> = room
        .host
        .get_state()
        .await
        .unwrap()
        .pending_entries
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(pending, vec!["Late Larry", "Later Lu"]);

    assert_eq!(room.host.admission(AdmissionAction::DenyAll).await.unwrap(), 2);
    assert!(room.host.get_state().await.unwrap().pending_entries.is_empty());
}

// ============================================================================
// Raise hand and chat
// ============================================================================

#[tokio::test]
async fn test_raised_hand_reaches_host_and_can_be_lowered() {
    let room = Classroom::start(&["a", "b"]);

    room.student(1).handle.raise_hand().await.unwrap();

    let host = &room.host;
    let hands = eventually("hand raised", || async move {
        let hands = host.get_state().await.unwrap().raised_hands;
        (!hands.is_empty()).then_some(hands)
    })
    .await;
    assert_eq!(hands.len(), 1);
    assert_eq!(hands.first().unwrap().id, pid("b"));

    assert_eq!(room.host.lower_hand(None).await.unwrap(), 1);
    assert!(room.host.get_state().await.unwrap().raised_hands.is_empty());
}

#[tokio::test]
async fn test_private_chat_reaches_only_its_addressee() {
    let room = Classroom::start(&["a", "b"]);

    room.host
        .send_chat("see me after class", Some(pid("a")))
        .await
        .unwrap();
    room.host.send_chat("good work everyone", None).await.unwrap();

    let a = room
        .student(0)
        .state_when("a has both messages", |s| s.chat.len() == 2)
        .await;
    assert!(a.chat.first().unwrap().private);

    let b = room
        .student(1)
        .state_when("b has the public message", |s| !s.chat.is_empty())
        .await;
    assert_eq!(b.chat.len(), 1);
    assert_eq!(b.chat.first().unwrap().message, "good work everyone");
}

#[tokio::test]
async fn test_student_chat_reaches_host() {
    let room = Classroom::start(&["a"]);

    room.student(0)
        .handle
        .send_chat("can you repeat that?", None)
        .await
        .unwrap();

    let host = &room.host;
    let chat = eventually("host received chat", || async move {
        let chat = host.get_state().await.unwrap().chat;
        (!chat.is_empty()).then_some(chat)
    })
    .await;
    let received = chat.first().unwrap();
    assert_eq!(received.sender_id, pid("a"));
    assert_eq!(received.sender_name, "a");
}
