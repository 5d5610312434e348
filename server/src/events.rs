use shared::Event;
use tokio::sync::mpsc;

/// Fire-and-forget bridge to the notification collaborator. Ledger code
/// hands events over after its transaction commits; delivery problems are
/// logged and swallowed so they can never fail or roll back a ledger call.
#[derive(Clone)]
pub struct Dispatcher {
    sender: mpsc::UnboundedSender<Event>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(consumer_task(receiver));
        Self { sender }
    }

    /// A dispatcher plus the receiving end of its queue, for tests that
    /// assert on emitted events.
    pub fn paired() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn dispatch(&self, event: Event) {
        // The consumer going away must not surface into ledger operations.
        let _ = self.sender.send(event);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

async fn consumer_task(mut receiver: mpsc::UnboundedReceiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match event {
            Event::ActivityCreated { user_id, points } => {
                tracing::info!(user_id, points, "activity logged, points awarded");
            }
            Event::ChallengeCompleted {
                user_id,
                challenge_id,
                bonus,
            } => {
                tracing::info!(
                    user_id,
                    challenge_id,
                    bonus,
                    "challenge completed, bonus credited"
                );
            }
            Event::PointsMilestoneCrossed { user_id, total } => {
                tracing::info!(user_id, total, "points milestone reached");
            }
        }
    }
}
