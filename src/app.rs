use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::api::RelayClient;
use crate::clipboard::Clipboard;
use crate::events::{AppEvent, GenerationEvent, Outcome};
use crate::session::GenerationSession;

pub const PLACEHOLDER: &str = "Generating...";
pub const EMPTY_PROMPT: &str = "Please enter a prompt.";
pub const ABORTED: &str = "Request aborted.";
pub const FAILED: &str = "Error occurred while generating.";
pub const COPIED: &str = "Text copied to clipboard!";

/// Everything the user can ask for. Produced by the key map, handled by
/// [`App::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Submit,
    Cancel,
    Copy,
    Clear,
    ToggleHelp,
    Quit,
    Input(char),
    Backspace,
    ScrollUp(usize),
    ScrollDown(usize),
    ScrollTop,
    ScrollBottom,
}

pub struct App {
    pub should_quit: bool,
    pub show_help: bool,
    pub input_buffer: String,
    /// Text shown in the output pane. Only the active generation appends to it.
    pub output: String,
    pub status: String,
    pub scroll_offset: usize,
    session: Option<GenerationSession>,
    awaiting_first_chunk: bool,
    client: RelayClient,
    events: mpsc::UnboundedSender<AppEvent>,
    clipboard: Box<dyn Clipboard>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("input_buffer", &self.input_buffer)
            .field("output", &self.output)
            .field("status", &self.status)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl App {
    pub fn new(
        client: RelayClient,
        events: mpsc::UnboundedSender<AppEvent>,
        clipboard: Box<dyn Clipboard>,
    ) -> Self {
        Self {
            should_quit: false,
            show_help: false,
            input_buffer: String::new(),
            output: String::new(),
            status: String::new(),
            scroll_offset: 0,
            session: None,
            awaiting_first_chunk: false,
            client,
            events,
            clipboard,
        }
    }

    pub const fn submit_enabled(&self) -> bool {
        self.session.is_none()
    }

    pub const fn cancel_enabled(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_stopping(&self) -> bool {
        self.session.as_ref().is_some_and(GenerationSession::is_cancelled)
    }

    pub fn dispatch(&mut self, command: Command) {
        // The help popup is modal: any key closes it.
        if self.show_help {
            match command {
                Command::Quit => self.quit(),
                _ => self.show_help = false,
            }
            return;
        }

        match command {
            Command::Submit => self.submit(),
            Command::Cancel => self.cancel(),
            Command::Copy => self.copy(),
            Command::Clear => self.clear(),
            Command::ToggleHelp => self.toggle_help(),
            Command::Quit => self.quit(),
            Command::Input(c) => self.input_buffer.push(c),
            Command::Backspace => {
                self.input_buffer.pop();
            }
            Command::ScrollUp(amount) => self.scroll_up(amount),
            Command::ScrollDown(amount) => self.scroll_down(amount),
            Command::ScrollTop => self.scroll_to_top(),
            Command::ScrollBottom => self.scroll_to_bottom(),
        }
    }

    /// Start a generation for the current prompt. The prompt stays in the
    /// input box so it can be tweaked and resent.
    pub fn submit(&mut self) {
        if !self.submit_enabled() {
            return;
        }
        if self.input_buffer.trim().is_empty() {
            self.status = EMPTY_PROMPT.to_string();
            return;
        }

        let prompt = self.input_buffer.clone();
        let session = GenerationSession::start(&self.client, prompt, self.events.clone());
        info!(session = %session.id(), "generation started");

        self.session = Some(session);
        self.output = PLACEHOLDER.to_string();
        self.awaiting_first_chunk = true;
        self.status.clear();
        self.scroll_to_top();
    }

    pub fn cancel(&mut self) {
        if let Some(session) = &self.session {
            session.cancel();
        }
    }

    pub fn copy(&mut self) {
        match self.clipboard.set_text(&self.output) {
            Ok(()) => self.status = COPIED.to_string(),
            Err(e) => {
                warn!(error = %e, "copy to clipboard failed");
                self.status = format!("Error copying text to clipboard: {e}");
            }
        }
    }

    /// Empty the output pane. An in-flight generation keeps running and
    /// appends to the now empty text.
    pub fn clear(&mut self) {
        self.output.clear();
        self.awaiting_first_chunk = false;
        self.scroll_to_top();
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        let is_current = self
            .session
            .as_ref()
            .is_some_and(|session| session.id() == event.session);
        if !is_current {
            return;
        }

        match event.event {
            GenerationEvent::Chunk(text) => {
                self.take_placeholder();
                self.output.push_str(&text);
                self.scroll_to_bottom();
            }
            GenerationEvent::Finished(outcome) => {
                self.take_placeholder();
                match outcome {
                    Outcome::Completed => self.status.clear(),
                    Outcome::Aborted => self.status = ABORTED.to_string(),
                    Outcome::Failed(detail) => {
                        error!(%detail, "generation failed");
                        self.status = FAILED.to_string();
                    }
                }
                // Tear down: submit enabled again, cancel disabled, token released.
                self.session = None;
            }
        }
    }

    fn take_placeholder(&mut self) {
        if self.awaiting_first_chunk {
            self.output.clear();
            self.awaiting_first_chunk = false;
        }
    }

    pub const fn quit(&mut self) {
        self.should_quit = true;
    }

    pub const fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub const fn scroll_up(&mut self, amount: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(amount);
    }

    pub const fn scroll_down(&mut self, amount: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(amount);
    }

    pub const fn scroll_to_top(&mut self) {
        self.scroll_offset = 0;
    }

    pub const fn scroll_to_bottom(&mut self) {
        // Clamped to the real bottom at render time
        self.scroll_offset = usize::MAX;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::{ClipboardError, MockClipboard};
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app_for(url: &str, clipboard: MockClipboard) -> (App, UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = RelayClient::new(url.to_string()).unwrap();
        (App::new(client, tx, Box::new(clipboard)), rx)
    }

    async fn relay_replying(body: &str, delay: Duration) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(body, "text/event-stream")
                    .set_delay(delay),
            )
            .mount(&server)
            .await;
        server
    }

    /// Feed events into the app until the session ends.
    async fn drive(app: &mut App, rx: &mut UnboundedReceiver<AppEvent>) {
        while app.cancel_enabled() {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("generation did not finish")
                .expect("event channel closed");
            app.handle_event(event);
        }
    }

    fn type_prompt(app: &mut App, prompt: &str) {
        for c in prompt.chars() {
            app.dispatch(Command::Input(c));
        }
    }

    #[tokio::test]
    async fn test_empty_prompt_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (mut app, _rx) = app_for(&server.uri(), MockClipboard::new());
        app.dispatch(Command::Submit);

        assert_eq!(app.status, EMPTY_PROMPT);
        assert!(app.submit_enabled());
        assert!(!app.cancel_enabled());

        type_prompt(&mut app, "   ");
        app.dispatch(Command::Submit);
        assert_eq!(app.status, EMPTY_PROMPT);
        assert!(app.submit_enabled());
    }

    #[tokio::test]
    async fn test_generation_fills_output() {
        let server = relay_replying(
            "data: {\"content\":\"Hel\"}\n\ndata: {\"content\":\"lo\"}\n\ndata: [DONE]\n",
            Duration::ZERO,
        )
        .await;
        let (mut app, mut rx) = app_for(&server.uri(), MockClipboard::new());
        app.output = "previous answer".to_string();

        type_prompt(&mut app, "greet me");
        app.dispatch(Command::Submit);

        assert_eq!(app.output, PLACEHOLDER);
        assert!(!app.submit_enabled());
        assert!(app.cancel_enabled());

        drive(&mut app, &mut rx).await;

        assert_eq!(app.output, "Hello");
        assert!(app.status.is_empty());
        assert!(app.submit_enabled());
        assert!(!app.cancel_enabled());
    }

    #[tokio::test]
    async fn test_submit_while_active_is_ignored() {
        let server = relay_replying("data: [DONE]\n", Duration::from_millis(200)).await;
        let (mut app, mut rx) = app_for(&server.uri(), MockClipboard::new());

        type_prompt(&mut app, "one");
        app.dispatch(Command::Submit);
        app.dispatch(Command::Submit);

        drive(&mut app, &mut rx).await;
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_keeps_accumulated_text() {
        let (mut app, _rx) = app_for("http://127.0.0.1:9/api/openai", MockClipboard::new());
        type_prompt(&mut app, "long story");
        app.dispatch(Command::Submit);
        let session = app.session.as_ref().unwrap().id();

        // Text that arrived before the user pressed stop.
        app.handle_event(AppEvent::new(session, GenerationEvent::Chunk("Once upon".to_string())));
        app.dispatch(Command::Cancel);
        assert!(app.is_stopping());

        app.handle_event(AppEvent::new(session, GenerationEvent::Finished(Outcome::Aborted)));

        assert_eq!(app.output, "Once upon");
        assert_eq!(app.status, ABORTED);
        assert!(app.submit_enabled());
        assert!(!app.cancel_enabled());
    }

    #[tokio::test]
    async fn test_cancel_against_slow_relay_reports_aborted() {
        let server = relay_replying("data: {\"content\":\"late\"}\n", Duration::from_secs(30)).await;
        let (mut app, mut rx) = app_for(&server.uri(), MockClipboard::new());

        type_prompt(&mut app, "hello");
        app.dispatch(Command::Submit);
        app.dispatch(Command::Cancel);
        drive(&mut app, &mut rx).await;

        assert_eq!(app.status, ABORTED);
        assert!(app.output.is_empty());
        assert!(app.submit_enabled());
    }

    #[tokio::test]
    async fn test_failure_reports_generic_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({ "error": "Internal Server Error" })),
            )
            .mount(&server)
            .await;
        let (mut app, mut rx) = app_for(&server.uri(), MockClipboard::new());

        type_prompt(&mut app, "hello");
        app.dispatch(Command::Submit);
        drive(&mut app, &mut rx).await;

        assert_eq!(app.status, FAILED);
        assert!(app.submit_enabled());
        assert!(!app.cancel_enabled());
    }

    #[tokio::test]
    async fn test_stale_session_events_are_ignored() {
        let (mut app, _rx) = app_for("http://127.0.0.1:9/api/openai", MockClipboard::new());
        app.output = "kept".to_string();

        app.handle_event(AppEvent::new(
            uuid::Uuid::new_v4(),
            GenerationEvent::Chunk("stray".to_string()),
        ));
        assert_eq!(app.output, "kept");
    }

    #[tokio::test]
    async fn test_clear_does_not_stop_generation() {
        let (mut app, _rx) = app_for("http://127.0.0.1:9/api/openai", MockClipboard::new());
        type_prompt(&mut app, "hi");
        app.dispatch(Command::Submit);
        let session = app.session.as_ref().unwrap().id();
        app.handle_event(AppEvent::new(session, GenerationEvent::Chunk("abc".to_string())));

        app.dispatch(Command::Clear);
        assert!(app.output.is_empty());
        assert!(app.cancel_enabled());

        app.handle_event(AppEvent::new(session, GenerationEvent::Chunk("def".to_string())));
        assert_eq!(app.output, "def");
    }

    #[test]
    fn test_copy_writes_exact_text() {
        let mut clipboard = MockClipboard::new();
        clipboard
            .expect_set_text()
            .withf(|text| text == "line one\n  línea dos ✓")
            .times(1)
            .returning(|_| Ok(()));

        let (mut app, _rx) = app_for("http://127.0.0.1:9/api/openai", clipboard);
        app.output = "line one\n  línea dos ✓".to_string();
        app.dispatch(Command::Copy);

        assert_eq!(app.status, COPIED);
    }

    #[test]
    fn test_copy_failure_is_reported() {
        let mut clipboard = MockClipboard::new();
        clipboard.expect_set_text().returning(|_| {
            Err(ClipboardError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "no terminal",
            )))
        });

        let (mut app, _rx) = app_for("http://127.0.0.1:9/api/openai", clipboard);
        app.output = "x".to_string();
        app.dispatch(Command::Copy);

        assert!(app.status.starts_with("Error copying text to clipboard"));
    }

    #[test]
    fn test_help_is_modal() {
        let (mut app, _rx) = app_for("http://127.0.0.1:9/api/openai", MockClipboard::new());
        app.dispatch(Command::ToggleHelp);
        assert!(app.show_help);

        app.dispatch(Command::Input('a'));
        assert!(!app.show_help);
        assert!(app.input_buffer.is_empty());
    }

    #[test]
    fn test_editing_and_scrolling() {
        let (mut app, _rx) = app_for("http://127.0.0.1:9/api/openai", MockClipboard::new());
        type_prompt(&mut app, "abc");
        app.dispatch(Command::Backspace);
        assert_eq!(app.input_buffer, "ab");

        app.dispatch(Command::ScrollDown(5));
        app.dispatch(Command::ScrollUp(2));
        assert_eq!(app.scroll_offset, 3);
        app.dispatch(Command::ScrollUp(10));
        assert_eq!(app.scroll_offset, 0);
        app.dispatch(Command::ScrollBottom);
        assert_eq!(app.scroll_offset, usize::MAX);
        app.dispatch(Command::ScrollTop);
        assert_eq!(app.scroll_offset, 0);
    }

    #[test]
    fn test_quit() {
        let (mut app, _rx) = app_for("http://127.0.0.1:9/api/openai", MockClipboard::new());
        app.dispatch(Command::Quit);
        assert!(app.should_quit);
    }
}
