use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

use crate::dom::{Document, DomError, DomEvent, GridLayout, NodeId, Page, Rect};
use crate::input::shortcut::{EventDisposition, KeyEvent, Platform};
use crate::network::{TranslateError, TranslationService, request_translation};
use crate::pipeline::{Assistant, Command};
use crate::settings::SettingsStore;

pub enum PageEvent {
    FocusIn(NodeId),
    FocusOut(NodeId),
    Input(NodeId),
    KeyDown {
        event: KeyEvent,
        reply: Option<oneshot::Sender<EventDisposition>>,
    },
    SelectionChange,
    Scroll,
    Resize,
    Navigate,
    OverlayPointerDown {
        reply: Option<oneshot::Sender<EventDisposition>>,
    },
    OverlayInsertClick,
    Mutate(Box<dyn FnOnce(&mut Document) + Send>),
}

impl PageEvent {
    pub fn mutate(edit: impl FnOnce(&mut Document) + Send + 'static) -> Self {
        Self::Mutate(Box::new(edit))
    }

    pub fn key_down(event: KeyEvent) -> Self {
        Self::KeyDown { event, reply: None }
    }
}

impl fmt::Debug for PageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FocusIn(node) => f.debug_tuple("FocusIn").field(node).finish(),
            Self::FocusOut(node) => f.debug_tuple("FocusOut").field(node).finish(),
            Self::Input(node) => f.debug_tuple("Input").field(node).finish(),
            Self::KeyDown { event, .. } => f.debug_struct("KeyDown").field("event", event).finish(),
            Self::SelectionChange => f.write_str("SelectionChange"),
            Self::Scroll => f.write_str("Scroll"),
            Self::Resize => f.write_str("Resize"),
            Self::Navigate => f.write_str("Navigate"),
            Self::OverlayPointerDown { .. } => f.write_str("OverlayPointerDown"),
            Self::OverlayInsertClick => f.write_str("OverlayInsertClick"),
            Self::Mutate(_) => f.write_str("Mutate(..)"),
        }
    }
}

struct TranslationOutcome {
    seq: u64,
    result: Result<String, TranslateError>,
}

pub struct ContentScript<S, T: ?Sized> {
    page: Page,
    assistant: Assistant,
    service: Arc<S>,
    store: Arc<T>,
    results_tx: mpsc::UnboundedSender<TranslationOutcome>,
    results_rx: mpsc::UnboundedReceiver<TranslationOutcome>,
    debounce: Option<(u64, Instant)>,
    outstanding_requests: usize,
    dom_events: Option<mpsc::UnboundedSender<DomEvent>>,
}

impl<S, T> ContentScript<S, T>
where
    S: TranslationService + 'static,
    T: SettingsStore + ?Sized + 'static,
{
    pub fn new(page: Page, service: Arc<S>, store: Arc<T>, platform: Platform) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            page,
            assistant: Assistant::new(platform),
            service,
            store,
            results_tx,
            results_rx,
            debounce: None,
            outstanding_requests: 0,
            dom_events: None,
        }
    }

    pub fn with_dom_events(mut self, sink: mpsc::UnboundedSender<DomEvent>) -> Self {
        self.dom_events = Some(sink);
        self
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut Page {
        &mut self.page
    }

    pub fn assistant(&self) -> &Assistant {
        &self.assistant
    }

    /// Processes events until the sender side closes, then lets any armed
    /// timer and outstanding request finish before returning.
    pub async fn run(mut self, mut events: mpsc::Receiver<PageEvent>) -> Self {
        let mut events_open = true;
        info!("content script started");

        loop {
            if !events_open && self.debounce.is_none() && self.outstanding_requests == 0 {
                break;
            }
            let deadline = self.debounce.map(|(_, at)| at);

            tokio::select! {
                event = events.recv(), if events_open => match event {
                    Some(event) => self.dispatch(event),
                    None => {
                        debug!("page event stream closed; draining pending work");
                        events_open = false;
                    }
                },
                Some(outcome) = self.results_rx.recv() => {
                    self.outstanding_requests = self.outstanding_requests.saturating_sub(1);
                    self.assistant.handle_translation(&self.page, outcome.seq, outcome.result);
                }
                () = debounce_elapsed(deadline) => {
                    if let Some((token, _)) = self.debounce.take() {
                        let commands = self.assistant.handle_debounce_elapsed(&self.page, token);
                        self.apply(commands);
                    }
                }
            }
        }

        info!("content script stopped");
        self
    }

    pub fn dispatch(&mut self, event: PageEvent) {
        match event {
            PageEvent::FocusIn(target) => {
                self.page.document.focus(target);
                let commands = self.assistant.handle_focus_in(&self.page, target);
                self.apply(commands);
            }
            PageEvent::FocusOut(target) => {
                if self.page.document.active_element() == Some(target) {
                    self.page.document.blur();
                }
                let commands = self.assistant.handle_focus_out(&self.page, target);
                self.apply(commands);
            }
            PageEvent::Input(target) => {
                let commands = self.assistant.handle_input(&self.page, target);
                self.apply(commands);
            }
            PageEvent::KeyDown { event, reply } => {
                let disposition = self.assistant.handle_keydown(&mut self.page, &event);
                send_disposition(reply, disposition);
            }
            PageEvent::SelectionChange => self.assistant.handle_selection_change(&self.page),
            PageEvent::Scroll | PageEvent::Resize => {
                self.assistant.handle_viewport_change(&self.page)
            }
            PageEvent::Navigate => {
                let commands = self.assistant.handle_navigation();
                self.apply(commands);
            }
            PageEvent::OverlayPointerDown { reply } => {
                send_disposition(reply, self.assistant.handle_overlay_pointer_down());
            }
            PageEvent::OverlayInsertClick => {
                self.assistant.accept(&mut self.page);
            }
            PageEvent::Mutate(edit) => edit(&mut self.page.document),
        }
        self.forward_dom_events();
    }

    fn forward_dom_events(&mut self) {
        let Some(sink) = &self.dom_events else {
            return;
        };
        for event in self.page.document.take_events() {
            if sink.send(event).is_err() {
                debug!("dom event receiver dropped; events stay on the document");
                self.dom_events = None;
                break;
            }
        }
    }

    fn apply(&mut self, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::ArmDebounce { token, delay } => {
                    self.debounce = Some((token, Instant::now() + delay));
                }
                Command::CancelDebounce => self.debounce = None,
                Command::Translate { seq, text } => self.spawn_request(seq, text),
            }
        }
    }

    fn spawn_request(&mut self, seq: u64, text: String) {
        let service = Arc::clone(&self.service);
        let store = Arc::clone(&self.store);
        let results_tx = self.results_tx.clone();
        self.outstanding_requests += 1;

        tokio::spawn(async move {
            let result = request_translation(service.as_ref(), store.as_ref(), &text).await;
            if results_tx.send(TranslationOutcome { seq, result }).is_err() {
                debug!(seq, "content script gone before translation finished");
            }
        });
    }
}

fn send_disposition(
    reply: Option<oneshot::Sender<EventDisposition>>,
    disposition: EventDisposition,
) {
    if let Some(reply) = reply {
        if reply.send(disposition).is_err() {
            debug!("event reply receiver dropped");
        }
    }
}

async fn debounce_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewReport {
    pub segment: Option<String>,
    pub suggestion: Option<String>,
    pub status: String,
    pub field_value: String,
    pub inserted: bool,
}

pub async fn run_preview<S, T>(
    service: Arc<S>,
    store: Arc<T>,
    text: &str,
) -> Result<PreviewReport, DomError>
where
    S: TranslationService + 'static,
    T: SettingsStore + ?Sized + 'static,
{
    let mut document = Document::new();
    let input = document.create_element("input");
    let mut layout = GridLayout::new(8.0, 16.0);
    layout.place_element(input, Rect::new(0.0, 0.0, 480.0, 24.0));
    document.append_child(document.body(), input)?;

    let platform = Platform::current();
    let script = ContentScript::new(Page::new(document, layout), service, store, platform);

    let (events_tx, events_rx) = mpsc::channel(8);
    let typed = text.to_string();
    let scripted = [
        PageEvent::FocusIn(input),
        PageEvent::mutate(move |doc| {
            if let Err(err) = doc.set_value(input, &typed) {
                debug!("preview field rejected value: {err}");
            }
        }),
        PageEvent::Input(input),
    ];
    for event in scripted {
        if events_tx.send(event).await.is_err() {
            break;
        }
    }
    drop(events_tx);

    let mut script = script.run(events_rx).await;
    let segment = script
        .assistant()
        .candidate()
        .map(|candidate| candidate.segment.text().to_string());
    let suggestion = script
        .assistant()
        .candidate()
        .map(|candidate| candidate.translation.clone());

    script.dispatch(PageEvent::key_down(KeyEvent::accept_chord(platform)));
    let inserted = script.assistant().metrics().report().insertions > 0;

    Ok(PreviewReport {
        segment,
        suggestion,
        status: script.assistant().overlay().message().to_string(),
        field_value: script
            .page()
            .document
            .value(input)
            .unwrap_or_default()
            .to_string(),
        inserted,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dom::Boundary;
    use crate::network::tests::ScriptedService;
    use crate::overlay::{IDLE_MESSAGE, INSERTED_MESSAGE};
    use crate::settings::{MemorySettingsStore, Settings};
    use crate::state::Phase;

    /// Answers `<text>` after a fixed delay, so responses can be overtaken.
    struct SlowEcho {
        delay: Duration,
    }

    impl TranslationService for SlowEcho {
        async fn translate(&self, text: &str, _settings: &Settings) -> Result<String, TranslateError> {
            tokio::time::sleep(self.delay).await;
            Ok(format!("<{text}>"))
        }
    }

    fn keyed_store(target_lang: &str) -> Arc<MemorySettingsStore> {
        Arc::new(MemorySettingsStore::new(Settings {
            api_key: "sk-test".to_string(),
            target_lang: target_lang.to_string(),
            ..Settings::default()
        }))
    }

    fn input_page() -> (Page, NodeId) {
        let mut doc = Document::new();
        let input = doc.create_element("input");
        doc.append_child(doc.body(), input).expect("append");
        let mut layout = GridLayout::new(8.0, 16.0);
        layout.place_element(input, Rect::new(0.0, 0.0, 300.0, 24.0));
        (Page::new(doc, layout), input)
    }

    fn type_value(input: NodeId, value: &str) -> PageEvent {
        let value = value.to_string();
        PageEvent::mutate(move |doc| doc.set_value(input, &value).expect("set value"))
    }

    #[tokio::test(start_paused = true)]
    async fn translates_plain_field_and_inserts_on_shortcut() {
        let (page, input) = input_page();
        let service = Arc::new(ScriptedService::replying(Ok("¿Cómo estás?".to_string())));
        let script = ContentScript::new(page, Arc::clone(&service), keyed_store("Spanish"), Platform::Other);

        let (tx, rx) = mpsc::channel(16);
        tx.send(PageEvent::FocusIn(input)).await.expect("send");
        tx.send(type_value(input, "Hello, how are you")).await.expect("send");
        tx.send(PageEvent::Input(input)).await.expect("send");
        drop(tx);

        let mut script = script.run(rx).await;
        {
            let calls = service.calls.lock().expect("calls lock");
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0].0, "Hello, how are you");
            assert_eq!(calls[0].1.target_lang, "Spanish");
        }
        assert_eq!(script.assistant().phase(), Phase::Suggested);

        let (reply_tx, reply_rx) = oneshot::channel();
        script.dispatch(PageEvent::KeyDown {
            event: KeyEvent::accept_chord(Platform::Other),
            reply: Some(reply_tx),
        });
        assert_eq!(reply_rx.await.expect("reply"), EventDisposition::PreventDefault);
        assert_eq!(script.page().document.value(input), Some("¿Cómo estás?"));
        assert_eq!(script.assistant().overlay().message(), INSERTED_MESSAGE);

        let (reply_tx, reply_rx) = oneshot::channel();
        script.dispatch(PageEvent::OverlayPointerDown { reply: Some(reply_tx) });
        assert_eq!(reply_rx.await.expect("reply"), EventDisposition::PreventDefault);
        script.dispatch(PageEvent::OverlayInsertClick);
        assert_eq!(script.page().document.value(input), Some("¿Cómo estás?"));
        assert_eq!(script.page().document.events().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn edits_inside_the_quiet_window_send_one_request() {
        let (page, input) = input_page();
        let service = Arc::new(ScriptedService::replying(Ok("hola".to_string())));
        let script = ContentScript::new(page, Arc::clone(&service), keyed_store("Spanish"), Platform::Other);

        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(script.run(rx));
        tx.send(PageEvent::FocusIn(input)).await.expect("send");
        for typed in ["He", "Hell", "Hello"] {
            tx.send(type_value(input, typed)).await.expect("send");
            tx.send(PageEvent::Input(input)).await.expect("send");
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        drop(tx);

        let script = handle.await.expect("script task");
        assert_eq!(service.call_count(), 1);
        assert_eq!(service.calls.lock().expect("calls lock")[0].0, "Hello");
        assert_eq!(
            script.assistant().candidate().map(|c| c.translation.as_str()),
            Some("hola")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn response_overtaken_by_an_edit_is_discarded() {
        let (page, input) = input_page();
        let service = Arc::new(SlowEcho { delay: Duration::from_millis(1_000) });
        let script = ContentScript::new(page, service, keyed_store("Spanish"), Platform::Other);

        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(script.run(rx));
        tx.send(PageEvent::FocusIn(input)).await.expect("send");
        tx.send(type_value(input, "Hello there")).await.expect("send");
        tx.send(PageEvent::Input(input)).await.expect("send");
        tokio::time::sleep(Duration::from_millis(700)).await;

        tx.send(type_value(input, "Hello there friend")).await.expect("send");
        tx.send(PageEvent::Input(input)).await.expect("send");
        drop(tx);

        let script = handle.await.expect("script task");
        let report = script.assistant().metrics().report();
        assert_eq!(report.requests_sent, 2);
        assert_eq!(report.stale_responses_dropped, 1);
        assert_eq!(
            script.assistant().candidate().map(|c| c.translation.as_str()),
            Some("<Hello there friend>")
        );
        assert_eq!(script.page().document.value(input), Some("Hello there friend"));
        assert!(script.page().document.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_key_surfaces_status_without_calling_service() {
        let (page, input) = input_page();
        let service = Arc::new(ScriptedService::replying(Ok("hola".to_string())));
        let store = Arc::new(MemorySettingsStore::default());
        let script = ContentScript::new(page, Arc::clone(&service), store, Platform::Other);

        let (tx, rx) = mpsc::channel(16);
        tx.send(PageEvent::FocusIn(input)).await.expect("send");
        tx.send(type_value(input, "Hello")).await.expect("send");
        tx.send(PageEvent::Input(input)).await.expect("send");
        drop(tx);

        let script = script.run(rx).await;
        assert_eq!(service.call_count(), 0);
        assert_eq!(script.assistant().phase(), Phase::Idle);
        assert_eq!(
            script.assistant().overlay().message(),
            "Add your DeepSeek key in settings"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn whitespace_tail_sends_nothing() {
        let (page, input) = input_page();
        let service = Arc::new(ScriptedService::replying(Ok("hola".to_string())));
        let script = ContentScript::new(page, Arc::clone(&service), keyed_store("Spanish"), Platform::Other);

        let (tx, rx) = mpsc::channel(16);
        tx.send(PageEvent::FocusIn(input)).await.expect("send");
        tx.send(type_value(input, "a   ")).await.expect("send");
        tx.send(PageEvent::Input(input)).await.expect("send");
        drop(tx);

        let script = script.run(rx).await;
        assert_eq!(service.call_count(), 0);
        assert_eq!(script.assistant().overlay().message(), IDLE_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn rich_field_cjk_tail_is_translated_alone() {
        let mut doc = Document::new();
        let editor = doc.create_element("div");
        doc.set_attribute(editor, "contenteditable", "true").expect("attr");
        doc.append_child(doc.body(), editor).expect("append");
        let text = doc.create_text("I think もう少し");
        doc.append_child(editor, text).expect("append text");
        let mut layout = GridLayout::new(10.0, 20.0);
        layout.place_element(editor, Rect::new(0.0, 0.0, 400.0, 80.0));
        layout.place_text(text, 0.0, 0.0);

        let service = Arc::new(ScriptedService::replying(Ok("a little more".to_string())));
        let script = ContentScript::new(
            Page::new(doc, layout),
            Arc::clone(&service),
            keyed_store("English"),
            Platform::Other,
        );

        let (tx, rx) = mpsc::channel(16);
        tx.send(PageEvent::mutate(move |doc| doc.collapse_selection(Boundary::new(text, 12))))
            .await
            .expect("send");
        tx.send(PageEvent::FocusIn(editor)).await.expect("send");
        tx.send(PageEvent::Input(text)).await.expect("send");
        drop(tx);

        let mut script = script.run(rx).await;
        assert_eq!(service.calls.lock().expect("calls lock")[0].0, "もう少し");

        script.dispatch(PageEvent::OverlayInsertClick);
        assert_eq!(
            script.page().document.text_content(editor),
            "I think a little more"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_cancels_the_armed_timer() {
        let (page, input) = input_page();
        let service = Arc::new(ScriptedService::replying(Ok("hola".to_string())));
        let script = ContentScript::new(page, Arc::clone(&service), keyed_store("Spanish"), Platform::Other);

        let (tx, rx) = mpsc::channel(16);
        tx.send(PageEvent::FocusIn(input)).await.expect("send");
        tx.send(type_value(input, "Hello")).await.expect("send");
        tx.send(PageEvent::Input(input)).await.expect("send");
        tx.send(PageEvent::Navigate).await.expect("send");
        drop(tx);

        let script = script.run(rx).await;
        assert_eq!(service.call_count(), 0);
        assert_eq!(script.assistant().active_field(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn viewport_changes_move_only_a_visible_overlay() {
        let (page, input) = input_page();
        let service = Arc::new(ScriptedService::replying(Ok("hola".to_string())));
        let script = ContentScript::new(page, service, keyed_store("Spanish"), Platform::Other);

        let (tx, rx) = mpsc::channel(16);
        tx.send(PageEvent::FocusIn(input)).await.expect("send");
        drop(tx);
        let mut script = script.run(rx).await;
        assert!(script.assistant().overlay().is_visible());
        assert_eq!(script.assistant().overlay().position().map(|p| p.top), Some(32.0));

        let mut layout = GridLayout::new(8.0, 16.0);
        layout.place_element(input, Rect::new(0.0, 0.0, 300.0, 24.0));
        layout.set_scroll(40.0, 100.0);
        script.page_mut().layout = Box::new(layout.clone());
        script.dispatch(PageEvent::Scroll);
        let scrolled = script.assistant().overlay().position().expect("position");
        assert_eq!((scrolled.top, scrolled.left), (132.0, 40.0));

        layout.place_element(input, Rect::new(0.0, 50.0, 300.0, 24.0));
        script.page_mut().layout = Box::new(layout.clone());
        script.dispatch(PageEvent::Resize);
        let resized = script.assistant().overlay().position().expect("position");
        assert_eq!(resized.top, 182.0);

        script.dispatch(PageEvent::FocusOut(input));
        assert!(!script.assistant().overlay().is_visible());
        layout.set_scroll(0.0, 400.0);
        script.page_mut().layout = Box::new(layout);
        script.dispatch(PageEvent::Scroll);
        script.dispatch(PageEvent::Resize);
        assert_eq!(script.assistant().overlay().position(), Some(resized));
    }

    #[tokio::test(start_paused = true)]
    async fn insertion_events_are_forwarded_to_the_host() {
        let (page, input) = input_page();
        let service = Arc::new(ScriptedService::replying(Ok("hola".to_string())));
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let script = ContentScript::new(page, service, keyed_store("Spanish"), Platform::Other)
            .with_dom_events(events_tx);

        let (tx, rx) = mpsc::channel(16);
        tx.send(PageEvent::FocusIn(input)).await.expect("send");
        tx.send(type_value(input, "Hello")).await.expect("send");
        tx.send(PageEvent::Input(input)).await.expect("send");
        drop(tx);

        let mut script = script.run(rx).await;
        assert!(events_rx.try_recv().is_err());

        script.dispatch(PageEvent::OverlayInsertClick);
        let event = events_rx.try_recv().expect("insert event");
        assert_eq!(event.target, input);
        assert!(!event.trusted);
        assert!(script.page().document.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn preview_reports_the_inserted_value() {
        let service = Arc::new(ScriptedService::replying(Ok("Bonjour".to_string())));
        let report = run_preview(service, keyed_store("French"), "Good morning")
            .await
            .expect("preview");

        assert_eq!(report.segment.as_deref(), Some("Good morning"));
        assert_eq!(report.suggestion.as_deref(), Some("Bonjour"));
        assert!(report.inserted);
        assert_eq!(report.field_value, "Bonjour");
        assert_eq!(report.status, INSERTED_MESSAGE);
    }
}
