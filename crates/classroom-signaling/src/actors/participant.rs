//! `ParticipantActor` - a student's side of the classroom.
//!
//! Listens on `CONTROL`, `HIGHLIGHT` and `CHAT`, applies what is addressed
//! to the local participant, and publishes raise-hand and chat messages on
//! request.

use super::messages::{ParticipantMessage, ParticipantState};
use super::metrics::{ActorType, MailboxMonitor};

use crate::chat::{self, ChatInbox};
use crate::control::{ControlOutcome, ControlReceiver, MeetingSession, MicController};
use crate::errors::SignalingError;
use crate::highlight::HighlightReceiver;
use crate::messages::{Envelope, RaiseHandMessage, Topic};
use crate::observability::metrics;
use crate::pubsub::{PubSub, Publisher, Subscription};
use crate::roster::Participant;
use crate::session::SessionFlags;

use common::types::ParticipantId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

const PARTICIPANT_CHANNEL_BUFFER: usize = 64;

/// SDK collaborators a participant needs.
#[derive(Clone)]
pub struct ParticipantDeps {
    pub mic: Arc<dyn MicController>,
    pub meeting: Arc<dyn MeetingSession>,
    pub session: Arc<SessionFlags>,
    pub bus: Arc<dyn PubSub>,
}

/// Handle to a running `ParticipantActor`.
#[derive(Clone)]
pub struct ParticipantActorHandle {
    sender: mpsc::Sender<ParticipantMessage>,
    cancel_token: CancellationToken,
    mailbox: Arc<MailboxMonitor>,
    participant_id: ParticipantId,
}

impl ParticipantActorHandle {
    #[must_use]
    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    /// Raise the local hand, or lower it if already raised.
    pub async fn raise_hand(&self) -> Result<u64, SignalingError> {
        self.request(|respond_to| ParticipantMessage::RaiseHand { respond_to })
            .await?
    }

    pub async fn send_chat(
        &self,
        message: impl Into<String>,
        to: Option<ParticipantId>,
    ) -> Result<u64, SignalingError> {
        let message = message.into();
        self.request(|respond_to| ParticipantMessage::SendChat {
            message,
            to,
            respond_to,
        })
        .await?
    }

    pub async fn get_state(&self) -> Result<ParticipantState, SignalingError> {
        self.request(|respond_to| ParticipantMessage::GetState { respond_to })
            .await
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    #[must_use]
    pub fn mailbox(&self) -> &MailboxMonitor {
        &self.mailbox
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> ParticipantMessage,
    ) -> Result<T, SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.mailbox.record_enqueue();
        if let Err(e) = self.sender.send(build(tx)).await {
            self.mailbox.record_send_failed();
            return Err(SignalingError::Internal(format!("channel send failed: {e}")));
        }
        rx.await
            .map_err(|e| SignalingError::Internal(format!("response receive failed: {e}")))
    }
}

/// The `ParticipantActor` implementation.
pub struct ParticipantActor {
    local: Participant,
    receiver: mpsc::Receiver<ParticipantMessage>,
    cancel_token: CancellationToken,
    control: ControlReceiver,
    highlight: HighlightReceiver,
    chat: ChatInbox,
    publisher: Publisher,
    control_sub: Subscription,
    highlight_sub: Subscription,
    chat_sub: Subscription,
    last_control: Option<ControlOutcome>,
    meeting_ended: bool,
    mailbox: Arc<MailboxMonitor>,
}

impl ParticipantActor {
    /// Spawn the participant actor. Subscriptions are taken before the task
    /// starts.
    pub fn spawn(
        local: Participant,
        deps: ParticipantDeps,
        rejoin_suppression: Duration,
        cancel_token: CancellationToken,
    ) -> (ParticipantActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(PARTICIPANT_CHANNEL_BUFFER);
        let participant_id = local.id.clone();
        let mailbox = Arc::new(MailboxMonitor::new(
            ActorType::Participant,
            participant_id.as_str(),
        ));

        let actor = Self {
            receiver,
            cancel_token: cancel_token.clone(),
            control: ControlReceiver::new(
                participant_id.clone(),
                deps.mic,
                deps.meeting,
                deps.session,
                rejoin_suppression,
            ),
            highlight: HighlightReceiver::new(),
            chat: ChatInbox::new(participant_id.clone()),
            publisher: Publisher::new(Arc::clone(&deps.bus), participant_id.clone()),
            control_sub: deps.bus.subscribe(Topic::Control),
            highlight_sub: deps.bus.subscribe(Topic::Highlight),
            chat_sub: deps.bus.subscribe(Topic::Chat),
            last_control: None,
            meeting_ended: false,
            mailbox: Arc::clone(&mailbox),
            local,
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = ParticipantActorHandle {
            sender,
            cancel_token,
            mailbox,
            participant_id,
        };

        (handle, task_handle)
    }

    #[instrument(skip_all, name = "classroom.actor.participant", fields(participant_id = %self.local.id))]
    async fn run(mut self) {
        info!(target: "classroom.actor.participant", "ParticipantActor started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(target: "classroom.actor.participant", "ParticipantActor received cancellation signal");
                    break;
                }

                msg = self.receiver.recv() => {
                    if let Some(message) = msg {
                        self.handle_message(message);
                        self.mailbox.record_dequeue();
                    } else {
                        info!(target: "classroom.actor.participant", "ParticipantActor channel closed, exiting");
                        break;
                    }
                }

                Some(envelope) = self.control_sub.recv() => {
                    self.on_control(&envelope).await;
                    self.mailbox.record_processed();
                }

                Some(envelope) = self.highlight_sub.recv() => {
                    if let Err(e) = self.highlight.handle(&envelope) {
                        drop_invalid(Topic::Highlight, &envelope, &e);
                    }
                    self.mailbox.record_processed();
                }

                Some(envelope) = self.chat_sub.recv() => {
                    if let Err(e) = self.chat.handle(&envelope) {
                        drop_invalid(Topic::Chat, &envelope, &e);
                    }
                    self.mailbox.record_processed();
                }
            }
        }

        info!(
            target: "classroom.actor.participant",
            meeting_ended = self.meeting_ended,
            messages_processed = self.mailbox.messages_processed(),
            "ParticipantActor stopped"
        );
    }

    fn handle_message(&mut self, message: ParticipantMessage) {
        match message {
            ParticipantMessage::RaiseHand { respond_to } => {
                let result = self.publisher.publish(RaiseHandMessage {
                    sender_id: self.local.id.clone(),
                    sender_name: self.local.display_name.clone(),
                });
                let _ = respond_to.send(result);
            }

            ParticipantMessage::SendChat {
                message,
                to,
                respond_to,
            } => {
                let result = chat::compose(&self.local.display_name, message, to)
                    .and_then(|payload| self.publisher.publish(payload));
                let _ = respond_to.send(result);
            }

            ParticipantMessage::GetState { respond_to } => {
                let _ = respond_to.send(ParticipantState {
                    highlight: self.highlight.current().clone(),
                    highlighted: self.highlight.is_highlighted(&self.local.id),
                    last_control: self.last_control,
                    meeting_ended: self.meeting_ended,
                    chat: self.chat.messages().cloned().collect(),
                });
            }
        }
    }

    async fn on_control(&mut self, envelope: &Envelope) {
        match self.control.handle(envelope).await {
            Ok(ControlOutcome::NotAddressed | ControlOutcome::Stale) => {}
            Ok(outcome) => {
                if outcome == ControlOutcome::MeetingEnded {
                    self.meeting_ended = true;
                }
                self.last_control = Some(outcome);
            }
            Err(e) => drop_invalid(Topic::Control, envelope, &e),
        }
    }
}

fn drop_invalid(topic: Topic, envelope: &Envelope, error: &SignalingError) {
    metrics::record_invalid(topic);
    warn!(
        target: "classroom.actor.participant",
        topic = %topic,
        sender_id = %envelope.sender_id,
        error = %error,
        "Dropping invalid message"
    );
}
