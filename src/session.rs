// One in-flight generation: request, decode loop, cancellation

use anyhow::Result;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::api::RelayClient;
use crate::decode::{DecodeError, Frame, FrameDecoder};
use crate::events::{AppEvent, GenerationEvent, Outcome};

/// Owns the cancellation handle of a single request. Dropping the session
/// cancels it; the spawned task then reports `Outcome::Aborted` and exits.
#[derive(Debug)]
pub struct GenerationSession {
    id: Uuid,
    token: CancellationToken,
}

impl GenerationSession {
    /// Spawn the request. Text and the final outcome arrive on `events`.
    pub fn start(
        client: &RelayClient,
        prompt: String,
        events: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        let id = Uuid::new_v4();
        let token = CancellationToken::new();

        let client = client.clone();
        let task_token = token.clone();
        let span = info_span!("generation", session = %id);

        tokio::spawn(
            async move {
                let outcome = run_generation(&client, &prompt, &task_token, |text| {
                    let _ = events.send(AppEvent::new(id, GenerationEvent::Chunk(text)));
                })
                .await;
                info!(?outcome, "generation finished");
                let _ = events.send(AppEvent::new(id, GenerationEvent::Finished(outcome)));
            }
            .instrument(span),
        );

        Self { id, token }
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancel(&self) {
        debug!(session = %self.id, "cancelling generation");
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for GenerationSession {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Post `prompt`, decode the streamed reply and hand each text piece to
/// `on_text`. Cancelling `token` ends the run at whatever await point it is
/// suspended on.
pub async fn run_generation<F>(
    client: &RelayClient,
    prompt: &str,
    token: &CancellationToken,
    mut on_text: F,
) -> Outcome
where
    F: FnMut(String),
{
    tokio::select! {
        biased;
        () = token.cancelled() => Outcome::Aborted,
        result = decode_stream(client, prompt, &mut on_text) => match result {
            Ok(()) => Outcome::Completed,
            Err(e) => {
                let message = format!("{e:#}");
                error!(error = %message, "generation failed");
                Outcome::Failed(message)
            }
        },
    }
}

async fn decode_stream<F>(client: &RelayClient, prompt: &str, on_text: &mut F) -> Result<()>
where
    F: FnMut(String),
{
    let mut stream = client.generate_stream(prompt).await?;
    let mut decoder = FrameDecoder::new();

    while let Some(chunk) = stream.next().await {
        decoder.push(&chunk?);
        if deliver(&mut decoder, on_text)? {
            return Ok(());
        }
    }

    if decoder.has_pending() {
        debug!("stream ended without a trailing newline, flushing last frame");
    }
    decoder.finish();
    deliver(&mut decoder, on_text)?;
    Ok(())
}

/// Hand every queued frame's text to `on_text`. Returns true on `[DONE]`.
fn deliver<F>(decoder: &mut FrameDecoder, on_text: &mut F) -> Result<bool, DecodeError>
where
    F: FnMut(String),
{
    while let Some(frame) = decoder.next_frame()? {
        match frame {
            Frame::Content(text) => on_text(text),
            Frame::Done => return Ok(true),
        }
    }
    Ok(false)
}
