//! `HostActor` - the teacher's side of the classroom.
//!
//! Owns the roster, hotkey dispatcher, admission queue, raised hands and the
//! outgoing publisher. Every mutation goes through the mailbox, so hotkey
//! presses, SDK events and pub/sub deliveries are applied one at a time.
//!
//! Besides the mailbox the actor listens on `RAISE_HAND` and `CHAT`.

use super::messages::{AdmissionAction, HostMessage, HostState};
use super::metrics::{ActorType, MailboxMonitor};

use crate::admission::{AdmissionQueue, EntryResponder};
use crate::chat::{self, ChatInbox};
use crate::dispatcher::{ControlDispatcher, Hotkey};
use crate::errors::SignalingError;
use crate::hands::{HandChange, RaiseHandTracker};
use crate::messages::{Envelope, SignalMessage, Topic};
use crate::observability::metrics;
use crate::pubsub::{PubSub, Publisher, Subscription};
use crate::roster::{Participant, Roster};

use common::types::ParticipantId;
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Mailbox capacity for the host actor.
const HOST_CHANNEL_BUFFER: usize = 256;

/// Handle to a running `HostActor`.
#[derive(Clone)]
pub struct HostActorHandle {
    sender: mpsc::Sender<HostMessage>,
    cancel_token: CancellationToken,
    mailbox: Arc<MailboxMonitor>,
    participant_id: ParticipantId,
}

impl HostActorHandle {
    /// Id of the local (teacher) participant.
    #[must_use]
    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    /// Apply a hotkey. Returns the messages that were published.
    pub async fn key_pressed(&self, key: Hotkey) -> Result<Vec<SignalMessage>, SignalingError> {
        self.request(|respond_to| HostMessage::KeyPressed { key, respond_to })
            .await?
    }

    pub async fn participant_joined(&self, participant: Participant) -> Result<(), SignalingError> {
        self.send(HostMessage::ParticipantJoined { participant }).await
    }

    pub async fn participant_left(&self, id: ParticipantId) -> Result<(), SignalingError> {
        self.send(HostMessage::ParticipantLeft { id }).await
    }

    /// Queue a waiting participant for an admission decision.
    pub async fn entry_requested(
        &self,
        id: ParticipantId,
        name: impl Into<String>,
        responder: Box<dyn EntryResponder>,
    ) -> Result<(), SignalingError> {
        self.send(HostMessage::EntryRequested {
            id,
            name: name.into(),
            responder,
        })
        .await
    }

    /// Resolve waiting participants. Returns how many were resolved.
    pub async fn admission(&self, action: AdmissionAction) -> Result<usize, SignalingError> {
        self.request(|respond_to| HostMessage::Admission { action, respond_to })
            .await?
    }

    /// End the meeting for `target`, or for every remote participant.
    /// Returns the number of participants told to leave.
    pub async fn end_meeting(&self, target: Option<ParticipantId>) -> Result<usize, SignalingError> {
        self.request(|respond_to| HostMessage::EndMeeting { target, respond_to })
            .await?
    }

    pub async fn send_chat(
        &self,
        message: impl Into<String>,
        to: Option<ParticipantId>,
    ) -> Result<u64, SignalingError> {
        let message = message.into();
        self.request(|respond_to| HostMessage::SendChat {
            message,
            to,
            respond_to,
        })
        .await?
    }

    /// Lower one hand, or every hand when `id` is `None`.
    pub async fn lower_hand(&self, id: Option<ParticipantId>) -> Result<usize, SignalingError> {
        self.request(|respond_to| HostMessage::LowerHand { id, respond_to })
            .await
    }

    pub async fn get_state(&self) -> Result<HostState, SignalingError> {
        self.request(|respond_to| HostMessage::GetState { respond_to })
            .await
    }

    /// Stop the actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Mailbox statistics for this actor.
    #[must_use]
    pub fn mailbox(&self) -> &MailboxMonitor {
        &self.mailbox
    }

    async fn send(&self, message: HostMessage) -> Result<(), SignalingError> {
        self.mailbox.record_enqueue();
        if let Err(e) = self.sender.send(message).await {
            self.mailbox.record_send_failed();
            return Err(SignalingError::Internal(format!("channel send failed: {e}")));
        }
        Ok(())
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> HostMessage,
    ) -> Result<T, SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        rx.await
            .map_err(|e| SignalingError::Internal(format!("response receive failed: {e}")))
    }
}

/// The `HostActor` implementation.
pub struct HostActor<R = StdRng> {
    receiver: mpsc::Receiver<HostMessage>,
    cancel_token: CancellationToken,
    roster: Roster,
    dispatcher: ControlDispatcher<R>,
    admission: AdmissionQueue,
    hands: RaiseHandTracker,
    chat: ChatInbox,
    publisher: Publisher,
    raise_hand_sub: Subscription,
    chat_sub: Subscription,
    mailbox: Arc<MailboxMonitor>,
}

impl<R: Rng + Send + 'static> HostActor<R> {
    /// Spawn the host actor.
    ///
    /// Topic subscriptions are taken before the task starts, so nothing
    /// published after `spawn` returns is missed.
    pub fn spawn(
        roster: Roster,
        dispatcher: ControlDispatcher<R>,
        bus: Arc<dyn PubSub>,
        cancel_token: CancellationToken,
    ) -> (HostActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(HOST_CHANNEL_BUFFER);
        let participant_id = roster.local_id().clone();
        let mailbox = Arc::new(MailboxMonitor::new(
            ActorType::Host,
            participant_id.as_str(),
        ));

        let actor = Self {
            receiver,
            cancel_token: cancel_token.clone(),
            chat: ChatInbox::new(participant_id.clone()),
            publisher: Publisher::new(Arc::clone(&bus), participant_id.clone()),
            raise_hand_sub: bus.subscribe(Topic::RaiseHand),
            chat_sub: bus.subscribe(Topic::Chat),
            roster,
            dispatcher,
            admission: AdmissionQueue::new(),
            hands: RaiseHandTracker::new(),
            mailbox: Arc::clone(&mailbox),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = HostActorHandle {
            sender,
            cancel_token,
            mailbox,
            participant_id,
        };

        (handle, task_handle)
    }

    #[instrument(skip_all, name = "classroom.actor.host", fields(participant_id = %self.roster.local_id()))]
    async fn run(mut self) {
        info!(
            target: "classroom.actor.host",
            participants = self.roster.len(),
            "HostActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(target: "classroom.actor.host", "HostActor received cancellation signal");
                    break;
                }

                msg = self.receiver.recv() => {
                    if let Some(message) = msg {
                        self.handle_message(message);
                        self.mailbox.record_dequeue();
                    } else {
                        info!(target: "classroom.actor.host", "HostActor channel closed, exiting");
                        break;
                    }
                }

                Some(envelope) = self.raise_hand_sub.recv() => {
                    self.on_raise_hand(&envelope);
                    self.mailbox.record_processed();
                }

                Some(envelope) = self.chat_sub.recv() => {
                    self.on_chat(&envelope);
                    self.mailbox.record_processed();
                }
            }
        }

        info!(
            target: "classroom.actor.host",
            pending_entries = self.admission.len(),
            messages_processed = self.mailbox.messages_processed(),
            "HostActor stopped"
        );
    }

    fn handle_message(&mut self, message: HostMessage) {
        match message {
            HostMessage::KeyPressed { key, respond_to } => {
                let result = self
                    .dispatcher
                    .handle(key, &self.roster)
                    .and_then(|plan| self.publish_all(plan));
                if let Err(e) = &result {
                    warn!(target: "classroom.actor.host", ?key, error = %e, "Hotkey failed");
                }
                let _ = respond_to.send(result);
            }

            HostMessage::ParticipantJoined { participant } => {
                let id = participant.id.clone();
                if self.roster.upsert(participant) {
                    info!(
                        target: "classroom.actor.host",
                        participant_id = %id,
                        participants = self.roster.len(),
                        "Participant joined"
                    );
                }
            }

            HostMessage::ParticipantLeft { id } => {
                if self.roster.remove(&id).is_some() {
                    self.dispatcher.forget(&id);
                    self.hands.lower(&id);
                    info!(
                        target: "classroom.actor.host",
                        participant_id = %id,
                        participants = self.roster.len(),
                        "Participant left"
                    );
                }
            }

            HostMessage::EntryRequested {
                id,
                name,
                responder,
            } => {
                self.admission.request(id, name, responder);
            }

            HostMessage::Admission { action, respond_to } => {
                let result = match action {
                    AdmissionAction::Allow(id) => self.admission.allow(&id).map(|()| 1),
                    AdmissionAction::Deny(id) => self.admission.deny(&id).map(|()| 1),
                    AdmissionAction::AllowAll => Ok(self.admission.allow_all()),
                    AdmissionAction::DenyAll => Ok(self.admission.deny_all()),
                };
                let _ = respond_to.send(result);
            }

            HostMessage::EndMeeting { target, respond_to } => {
                let result = self
                    .dispatcher
                    .end_meeting(target.as_ref(), &self.roster)
                    .and_then(|plan| self.publish_all(plan))
                    .map(|sent| sent.len());
                match &result {
                    Ok(count) => info!(
                        target: "classroom.actor.host",
                        target_id = ?target,
                        count,
                        "Meeting ended"
                    ),
                    Err(e) => warn!(target: "classroom.actor.host", error = %e, "End meeting failed"),
                }
                let _ = respond_to.send(result);
            }

            HostMessage::SendChat {
                message,
                to,
                respond_to,
            } => {
                let result = chat::compose(&self.local_name(), message, to)
                    .and_then(|payload| self.publisher.publish(payload));
                let _ = respond_to.send(result);
            }

            HostMessage::LowerHand { id, respond_to } => {
                let lowered = match id {
                    Some(id) => usize::from(self.hands.lower(&id)),
                    None => self.hands.clear(),
                };
                let _ = respond_to.send(lowered);
            }

            HostMessage::GetState { respond_to } => {
                let _ = respond_to.send(self.state());
            }
        }
    }

    /// Publish every message in order. A failure does not stop the rest;
    /// the first error is returned.
    fn publish_all(&mut self, plan: Vec<SignalMessage>) -> Result<Vec<SignalMessage>, SignalingError> {
        let mut first_error = None;
        for message in &plan {
            if let Err(e) = self.publisher.publish(message.clone()) {
                warn!(
                    target: "classroom.actor.host",
                    topic = %message.topic(),
                    error = %e,
                    "Publish failed"
                );
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(plan),
        }
    }

    fn on_raise_hand(&mut self, envelope: &Envelope) {
        match self.hands.handle(envelope) {
            Ok(HandChange::Raised(id)) if !self.roster.contains(&id) => {
                debug!(target: "classroom.actor.host", participant_id = %id, "Hand raised by unknown participant");
            }
            Ok(HandChange::Raised(_) | HandChange::Lowered(_) | HandChange::Ignored) => {}
            Err(e) => {
                metrics::record_invalid(Topic::RaiseHand);
                warn!(target: "classroom.actor.host", sender_id = %envelope.sender_id, error = %e, "Dropping invalid raise-hand message");
            }
        }
    }

    fn on_chat(&mut self, envelope: &Envelope) {
        if let Err(e) = self.chat.handle(envelope) {
            metrics::record_invalid(Topic::Chat);
            warn!(target: "classroom.actor.host", sender_id = %envelope.sender_id, error = %e, "Dropping invalid chat message");
        }
    }

    fn local_name(&self) -> String {
        self.roster
            .get(self.roster.local_id())
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|| self.roster.local_id().to_string())
    }

    fn state(&self) -> HostState {
        HostState {
            selected: self.dispatcher.selected().cloned(),
            global_mic: self.dispatcher.global_mic_state(),
            participants: self.roster.remote_ids(),
            pending_entries: self.admission.pending(),
            raised_hands: self.hands.raised().to_vec(),
            chat: self.chat.messages().cloned().collect(),
        }
    }
}
