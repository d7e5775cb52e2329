//! Per-update dispatch: classify, resolve, invoke.
//!
//! Each update flows through
//!
//! ```text
//! Received → Classified → Resolved → Invoked → (Completed | Faulted)
//! ```
//!
//! independently of every other update. Nothing is carried over between
//! dispatches, so the transport may run any number of them concurrently.
//! Every failure along the way is logged once and returned as a
//! [`DispatchOutcome`]; none of them escape to the receive loop.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::discovery::Container;
use super::{HandlerId, Registry, UnaryKind, COMMAND_MARKER};
use crate::error::DispatchError;
use crate::platform::{Message, Update, UpdateKind};

/// Result of dispatching one update
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The handler ran to completion
    Completed(HandlerId),
    /// No handler is bound for the update; nothing was invoked
    NoRoute,
    /// Resolution or invocation failed
    Faulted(DispatchError),
}

impl DispatchOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, DispatchOutcome::Completed(_))
    }

    /// Handler that was invoked (or resolved, for faults)
    pub fn handler(&self) -> Option<HandlerId> {
        match self {
            DispatchOutcome::Completed(id) => Some(*id),
            DispatchOutcome::NoRoute => None,
            DispatchOutcome::Faulted(err) => err.handler(),
        }
    }
}

/// Routes updates to handler units through a frozen [`Registry`].
///
/// `S` is the services bundle handed to handler factories; it is shared
/// read-only by every dispatch.
pub struct Dispatcher<S> {
    registry: Arc<Registry>,
    container: Arc<Container<S>>,
    services: Arc<S>,
}

impl<S> Dispatcher<S>
where
    S: Send + Sync + 'static,
{
    pub fn new(registry: Registry, container: Container<S>, services: S) -> Self {
        Self {
            registry: Arc::new(registry),
            container: Arc::new(container),
            services: Arc::new(services),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Dispatch a single update to at most one handler unit.
    ///
    /// `cancel` is forwarded to the handler; the dispatcher itself does not
    /// time out or retry.
    pub async fn dispatch(&self, update: Update, cancel: CancellationToken) -> DispatchOutcome {
        info!(
            "Received update {} of type {}",
            update.id,
            update.kind.name()
        );

        let update_id = update.id;
        match self.try_dispatch(update, cancel).await {
            Ok(handler) => {
                debug!(update_id, "Handler {} completed", handler);
                DispatchOutcome::Completed(handler)
            }
            Err(DispatchError::NoRoute(what)) => {
                warn!(update_id, "No handler found for {}", what);
                DispatchOutcome::NoRoute
            }
            Err(err) => {
                error!(update_id, "Error occurred while handling update: {}", err);
                DispatchOutcome::Faulted(err)
            }
        }
    }

    async fn try_dispatch(
        &self,
        update: Update,
        cancel: CancellationToken,
    ) -> Result<HandlerId, DispatchError> {
        let handler_id = self.classify(&update)?;
        debug!(
            "Routing {} {} to handler {}",
            update.kind.name(),
            update.id,
            handler_id
        );

        let handler = self
            .container
            .resolve(handler_id, &self.services)
            .map_err(|cause| DispatchError::Resolution {
                handler: handler_id,
                cause,
            })?;

        // Own task per invocation so a panicking handler only takes down itself
        let task = tokio::spawn(async move { handler.handle(&update, &cancel).await });

        match task.await {
            Ok(Ok(())) => Ok(handler_id),
            Ok(Err(cause)) => Err(DispatchError::Handler {
                handler: handler_id,
                cause,
            }),
            Err(join_err) => Err(DispatchError::Panic {
                handler: handler_id,
                message: join_err.to_string(),
            }),
        }
    }

    /// Pick the single handler bound for `update`, by fixed precedence
    pub fn classify(&self, update: &Update) -> Result<HandlerId, DispatchError> {
        match &update.kind {
            UpdateKind::Message(message) => self.classify_message(message),
            UpdateKind::CallbackQuery(query) => {
                let data = query.data.as_deref().ok_or_else(|| {
                    DispatchError::NoRoute("callback query without data".to_string())
                })?;
                self.registry
                    .callback(data)
                    .ok_or_else(|| DispatchError::NoRoute(format!("callback data {:?}", data)))
            }
            UpdateKind::InlineQuery(query) => self
                .registry
                .match_inline_query(&query.query)
                .ok_or_else(|| DispatchError::NoRoute(format!("inline query {:?}", query.query))),
            UpdateKind::ChosenInlineResult(_) => self.unary(UnaryKind::ChosenInlineResult),
            UpdateKind::Poll(_) => self.unary(UnaryKind::Poll),
            UpdateKind::PollAnswer(_) => self.unary(UnaryKind::PollAnswer),
            UpdateKind::Other => Err(DispatchError::NoRoute("update type other".to_string())),
        }
    }

    fn classify_message(&self, message: &Message) -> Result<HandlerId, DispatchError> {
        let text = message.text.as_deref().unwrap_or_default();

        if text.starts_with(COMMAND_MARKER) {
            let token = command_token(text);
            return self
                .registry
                .command(token)
                .ok_or_else(|| DispatchError::NoRoute(format!("command {}", token)));
        }

        if !text.is_empty() {
            return self
                .registry
                .match_text(text)
                .ok_or_else(|| DispatchError::NoRoute(format!("text message {:?}", text)));
        }

        match message_payload(message) {
            Some(kind) => self.unary(kind),
            None => Err(DispatchError::NoRoute("message without content".to_string())),
        }
    }

    fn unary(&self, kind: UnaryKind) -> Result<HandlerId, DispatchError> {
        self.registry
            .unary(kind)
            .ok_or_else(|| DispatchError::NoRoute(kind.to_string()))
    }
}

impl<S> fmt::Debug for Dispatcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.registry.len())
            .field("units", &self.container.len())
            .finish()
    }
}

/// Command token of a command message: text up to the first space, minus
/// any `@botname` suffix
fn command_token(text: &str) -> &str {
    let head = text.split(' ').next().unwrap_or(text);
    head.split('@').next().unwrap_or(head)
}

/// First non-text payload present on the message, by precedence
fn message_payload(message: &Message) -> Option<UnaryKind> {
    UnaryKind::MESSAGE_PRECEDENCE.into_iter().find(|kind| match kind {
        UnaryKind::Sticker => message.sticker.is_some(),
        UnaryKind::Photo => !message.photo.is_empty(),
        UnaryKind::Video => message.video.is_some(),
        UnaryKind::Document => message.document.is_some(),
        UnaryKind::Voice => message.voice.is_some(),
        UnaryKind::Audio => message.audio.is_some(),
        UnaryKind::Location => message.location.is_some(),
        UnaryKind::Contact => message.contact.is_some(),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{
        CallbackQuery, ChosenInlineResult, Contact, FileRef, InlineQuery, Poll, Sender, Sticker,
    };
    use crate::routing::{Discovery, Handler, HandlerUnit, MatchRule};
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tracing::Level;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    #[derive(Default)]
    struct Services {
        calls: Mutex<Vec<&'static str>>,
    }

    impl Services {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    /// Handler unit that records its name into the shared services.
    /// The instance gets a handle to the call log at build time.
    macro_rules! recording_unit {
        ($name:ident, [$($rule:expr),* $(,)?]) => {
            struct $name(Arc<Services>);

            #[async_trait]
            impl Handler for $name {
                async fn handle(&self, _update: &Update, _cancel: &CancellationToken) -> Result<()> {
                    self.0.calls.lock().unwrap().push(stringify!($name));
                    Ok(())
                }
            }

            impl HandlerUnit<Arc<Services>> for $name {
                fn rules() -> Vec<MatchRule> {
                    vec![$($rule),*]
                }

                fn build(services: &Arc<Services>) -> Result<Self> {
                    Ok($name(Arc::clone(services)))
                }
            }
        };
    }

    recording_unit!(H1, [MatchRule::command("/start")]);
    recording_unit!(H2, [MatchRule::text("hello")]);
    recording_unit!(H3, [MatchRule::callback("hello")]);
    recording_unit!(A, [MatchRule::command("/x")]);
    recording_unit!(B, [MatchRule::command("/x")]);
    recording_unit!(Hwild, [MatchRule::any_inline_query()]);
    recording_unit!(Hcats, [MatchRule::inline_query("cats")]);
    recording_unit!(StickerUnit, [MatchRule::Unary(UnaryKind::Sticker)]);
    recording_unit!(PhotoUnit, [MatchRule::Unary(UnaryKind::Photo)]);
    recording_unit!(ContactUnit, [MatchRule::Unary(UnaryKind::Contact)]);
    recording_unit!(
        ChosenUnit,
        [MatchRule::Unary(UnaryKind::ChosenInlineResult)]
    );

    struct Failing;

    #[async_trait]
    impl Handler for Failing {
        async fn handle(&self, _update: &Update, _cancel: &CancellationToken) -> Result<()> {
            bail!("reply could not be sent")
        }
    }

    impl HandlerUnit<Arc<Services>> for Failing {
        fn rules() -> Vec<MatchRule> {
            vec![MatchRule::command("/fail")]
        }

        fn build(_services: &Arc<Services>) -> Result<Self> {
            Ok(Failing)
        }
    }

    struct Panicking;

    #[async_trait]
    impl Handler for Panicking {
        async fn handle(&self, _update: &Update, _cancel: &CancellationToken) -> Result<()> {
            panic!("handler bug")
        }
    }

    impl HandlerUnit<Arc<Services>> for Panicking {
        fn rules() -> Vec<MatchRule> {
            vec![MatchRule::command("/panic")]
        }

        fn build(_services: &Arc<Services>) -> Result<Self> {
            Ok(Panicking)
        }
    }

    struct Unbuildable;

    #[async_trait]
    impl Handler for Unbuildable {
        async fn handle(&self, _update: &Update, _cancel: &CancellationToken) -> Result<()> {
            Ok(())
        }
    }

    impl HandlerUnit<Arc<Services>> for Unbuildable {
        fn rules() -> Vec<MatchRule> {
            vec![MatchRule::command("/broken")]
        }

        fn build(_services: &Arc<Services>) -> Result<Self> {
            bail!("missing dependency")
        }
    }

    struct CancelAware(Arc<Services>);

    #[async_trait]
    impl Handler for CancelAware {
        async fn handle(&self, _update: &Update, cancel: &CancellationToken) -> Result<()> {
            if cancel.is_cancelled() {
                self.0.calls.lock().unwrap().push("cancelled");
            }
            Ok(())
        }
    }

    impl HandlerUnit<Arc<Services>> for CancelAware {
        fn rules() -> Vec<MatchRule> {
            vec![MatchRule::command("/slow")]
        }

        fn build(services: &Arc<Services>) -> Result<Self> {
            Ok(CancelAware(Arc::clone(services)))
        }
    }

    /// Records the level of every event emitted while installed
    #[derive(Clone, Default)]
    struct LevelLog(Arc<Mutex<Vec<Level>>>);

    impl LevelLog {
        fn count(&self, level: Level) -> usize {
            self.0.lock().unwrap().iter().filter(|l| **l == level).count()
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for LevelLog {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            self.0.lock().unwrap().push(*event.metadata().level());
        }
    }

    fn capture_logs() -> (LevelLog, tracing::subscriber::DefaultGuard) {
        let log = LevelLog::default();
        let subscriber = tracing_subscriber::registry().with(log.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (log, guard)
    }

    fn scenario() -> (Dispatcher<Arc<Services>>, Arc<Services>) {
        let services = Arc::new(Services::default());
        let (registry, container) = Discovery::<Arc<Services>>::new()
            .unit::<H1>()
            .unit::<H2>()
            .unit::<H3>()
            .unit::<Failing>()
            .unit::<Panicking>()
            .unit::<Unbuildable>()
            .unit::<CancelAware>()
            .finish()
            .unwrap();
        (
            Dispatcher::new(registry, container, Arc::clone(&services)),
            services,
        )
    }

    fn sender() -> Sender {
        Sender {
            id: 7,
            first_name: "Ann".to_string(),
            username: None,
        }
    }

    fn text(text: &str) -> Update {
        Update::new(1, UpdateKind::Message(Message::text(42, text)))
    }

    fn callback(data: Option<&str>) -> Update {
        Update::new(
            2,
            UpdateKind::CallbackQuery(CallbackQuery {
                id: "cb".to_string(),
                from: sender(),
                data: data.map(str::to_owned),
                chat_id: Some(42),
            }),
        )
    }

    fn inline(query: &str) -> Update {
        Update::new(
            3,
            UpdateKind::InlineQuery(InlineQuery {
                id: "iq".to_string(),
                from: sender(),
                query: query.to_string(),
            }),
        )
    }

    fn sticker() -> Sticker {
        Sticker {
            file: FileRef::new("st"),
            emoji: Some("😎".to_string()),
            set_name: None,
        }
    }

    #[tokio::test]
    async fn test_scenario_routes_each_update_to_its_handler() {
        let (dispatcher, services) = scenario();
        let token = CancellationToken::new();

        let outcome = dispatcher.dispatch(text("/start"), token.clone()).await;
        assert_eq!(outcome.handler(), Some(HandlerId::of::<H1>()));

        let outcome = dispatcher.dispatch(text("say hello there"), token.clone()).await;
        assert_eq!(outcome.handler(), Some(HandlerId::of::<H2>()));

        let outcome = dispatcher.dispatch(callback(Some("hello")), token.clone()).await;
        assert_eq!(outcome.handler(), Some(HandlerId::of::<H3>()));

        let outcome = dispatcher.dispatch(text("bye"), token).await;
        assert!(matches!(outcome, DispatchOutcome::NoRoute));

        assert_eq!(services.calls(), vec!["H1", "H2", "H3"]);
    }

    #[test]
    fn test_classify_reads_the_frozen_registry() {
        let (dispatcher, services) = scenario();
        let registry = dispatcher.registry();

        assert_eq!(registry.command("/start"), Some(HandlerId::of::<H1>()));
        assert_eq!(
            dispatcher.classify(&text("/start now")).unwrap(),
            HandlerId::of::<H1>()
        );
        assert_eq!(
            dispatcher.classify(&callback(Some("hello"))).unwrap(),
            registry.callback("hello").unwrap()
        );
        assert!(matches!(
            dispatcher.classify(&text("bye")),
            Err(DispatchError::NoRoute(_))
        ));

        // Classification alone never builds or runs a handler
        assert!(services.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unmatched_text_logs_one_warning() {
        let (dispatcher, services) = scenario();
        let (log, _guard) = capture_logs();

        let outcome = dispatcher.dispatch(text("bye"), CancellationToken::new()).await;

        assert!(matches!(outcome, DispatchOutcome::NoRoute));
        assert!(services.calls().is_empty());
        assert_eq!(log.count(Level::WARN), 1);
        assert_eq!(log.count(Level::ERROR), 0);
    }

    #[tokio::test]
    async fn test_command_with_suffix_and_arguments() {
        let (dispatcher, services) = scenario();
        let token = CancellationToken::new();

        for input in ["/start", "/start@routebot", "/start now", "/start@routebot now please"] {
            let outcome = dispatcher.dispatch(text(input), token.clone()).await;
            assert_eq!(outcome.handler(), Some(HandlerId::of::<H1>()), "{}", input);
        }
        assert_eq!(services.calls(), vec!["H1"; 4]);
    }

    #[tokio::test]
    async fn test_command_does_not_fall_through_to_text_rules() {
        let (dispatcher, services) = scenario();

        // Unknown command containing a text pattern still routes nowhere
        let outcome = dispatcher
            .dispatch(text("/hello"), CancellationToken::new())
            .await;

        assert!(matches!(outcome, DispatchOutcome::NoRoute));
        assert!(services.calls().is_empty());
    }

    #[tokio::test]
    async fn test_text_match_ignores_case() {
        let (dispatcher, _) = scenario();

        let outcome = dispatcher
            .dispatch(text("HeLLo world"), CancellationToken::new())
            .await;
        assert_eq!(outcome.handler(), Some(HandlerId::of::<H2>()));
    }

    #[tokio::test]
    async fn test_duplicate_command_resolves_to_last_registration() {
        let services = Arc::new(Services::default());
        let (registry, container) = Discovery::<Arc<Services>>::new()
            .unit::<A>()
            .unit::<B>()
            .finish()
            .unwrap();
        let dispatcher = Dispatcher::new(registry, container, Arc::clone(&services));

        let outcome = dispatcher.dispatch(text("/x"), CancellationToken::new()).await;

        assert_eq!(outcome.handler(), Some(HandlerId::of::<B>()));
        assert_eq!(services.calls(), vec!["B"]);
    }

    #[tokio::test]
    async fn test_unbound_poll_invokes_nothing_and_warns_once() {
        let (dispatcher, services) = scenario();
        let (log, _guard) = capture_logs();

        let update = Update::new(9, UpdateKind::Poll(Poll { id: "p".to_string() }));
        let outcome = dispatcher.dispatch(update, CancellationToken::new()).await;

        assert!(matches!(outcome, DispatchOutcome::NoRoute));
        assert!(services.calls().is_empty());
        assert_eq!(log.count(Level::WARN), 1);
    }

    #[tokio::test]
    async fn test_failing_handler_is_isolated() {
        let (dispatcher, services) = scenario();
        let (log, _guard) = capture_logs();

        let outcome = dispatcher.dispatch(text("/fail"), CancellationToken::new()).await;
        match outcome {
            DispatchOutcome::Faulted(DispatchError::Handler { handler, cause }) => {
                assert_eq!(handler, HandlerId::of::<Failing>());
                assert!(cause.to_string().contains("reply could not be sent"));
            }
            other => panic!("expected handler failure, got {:?}", other),
        }
        assert_eq!(log.count(Level::ERROR), 1);

        let outcome = dispatcher.dispatch(text("/start"), CancellationToken::new()).await;
        assert!(outcome.is_completed());
        assert_eq!(services.calls(), vec!["H1"]);
        assert_eq!(log.count(Level::ERROR), 1);
    }

    #[tokio::test]
    async fn test_panicking_handler_is_contained() {
        let (dispatcher, services) = scenario();

        let outcome = dispatcher
            .dispatch(text("/panic"), CancellationToken::new())
            .await;
        assert!(matches!(
            outcome,
            DispatchOutcome::Faulted(DispatchError::Panic { .. })
        ));

        let outcome = dispatcher
            .dispatch(text("say hello"), CancellationToken::new())
            .await;
        assert!(outcome.is_completed());
        assert_eq!(services.calls(), vec!["H2"]);
    }

    #[tokio::test]
    async fn test_resolution_failure_skips_invocation() {
        let (dispatcher, services) = scenario();
        let (log, _guard) = capture_logs();

        let outcome = dispatcher
            .dispatch(text("/broken"), CancellationToken::new())
            .await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Faulted(DispatchError::Resolution { .. })
        ));
        assert_eq!(outcome.handler(), Some(HandlerId::of::<Unbuildable>()));
        assert!(services.calls().is_empty());
        assert_eq!(log.count(Level::ERROR), 1);
    }

    #[tokio::test]
    async fn test_inline_wildcard_registered_first_wins() {
        let services = Arc::new(Services::default());
        let (registry, container) = Discovery::<Arc<Services>>::new()
            .unit::<Hwild>()
            .unit::<Hcats>()
            .finish()
            .unwrap();
        let dispatcher = Dispatcher::new(registry, container, Arc::clone(&services));

        for query in ["cats", "dogs", ""] {
            let outcome = dispatcher.dispatch(inline(query), CancellationToken::new()).await;
            assert_eq!(outcome.handler(), Some(HandlerId::of::<Hwild>()));
        }
        assert_eq!(services.calls(), vec!["Hwild"; 3]);
    }

    #[tokio::test]
    async fn test_inline_specific_pattern_before_wildcard() {
        let services = Arc::new(Services::default());
        let (registry, container) = Discovery::<Arc<Services>>::new()
            .unit::<Hcats>()
            .unit::<Hwild>()
            .finish()
            .unwrap();
        let dispatcher = Dispatcher::new(registry, container, Arc::clone(&services));

        let outcome = dispatcher
            .dispatch(inline("Funny CATS"), CancellationToken::new())
            .await;
        assert_eq!(outcome.handler(), Some(HandlerId::of::<Hcats>()));

        let outcome = dispatcher.dispatch(inline("dogs"), CancellationToken::new()).await;
        assert_eq!(outcome.handler(), Some(HandlerId::of::<Hwild>()));
    }

    #[tokio::test]
    async fn test_callback_without_data_is_not_dispatched() {
        let (dispatcher, services) = scenario();

        let outcome = dispatcher.dispatch(callback(None), CancellationToken::new()).await;
        assert!(matches!(outcome, DispatchOutcome::NoRoute));

        let outcome = dispatcher
            .dispatch(callback(Some("HELLO")), CancellationToken::new())
            .await;
        assert!(matches!(outcome, DispatchOutcome::NoRoute));
        assert!(services.calls().is_empty());
    }

    #[tokio::test]
    async fn test_media_precedence_honors_first_payload_only() {
        let services = Arc::new(Services::default());
        let (registry, container) = Discovery::<Arc<Services>>::new()
            .unit::<StickerUnit>()
            .unit::<PhotoUnit>()
            .unit::<ContactUnit>()
            .finish()
            .unwrap();
        let dispatcher = Dispatcher::new(registry, container, Arc::clone(&services));

        let both = Message {
            chat_id: 42,
            sticker: Some(sticker()),
            photo: vec![FileRef::new("ph")],
            ..Default::default()
        };
        let outcome = dispatcher
            .dispatch(
                Update::new(1, UpdateKind::Message(both)),
                CancellationToken::new(),
            )
            .await;
        assert_eq!(outcome.handler(), Some(HandlerId::of::<StickerUnit>()));

        // Video outranks contact but has no binding, so nothing runs
        let unbound_first = Message {
            chat_id: 42,
            video: Some(FileRef::new("vid")),
            contact: Some(Contact {
                phone_number: "+100".to_string(),
                first_name: "Bob".to_string(),
            }),
            ..Default::default()
        };
        let outcome = dispatcher
            .dispatch(
                Update::new(2, UpdateKind::Message(unbound_first)),
                CancellationToken::new(),
            )
            .await;
        assert!(matches!(outcome, DispatchOutcome::NoRoute));

        // Text takes precedence over any attached payload
        let captioned = Message {
            chat_id: 42,
            text: Some("look".to_string()),
            photo: vec![FileRef::new("ph")],
            ..Default::default()
        };
        let outcome = dispatcher
            .dispatch(
                Update::new(3, UpdateKind::Message(captioned)),
                CancellationToken::new(),
            )
            .await;
        assert!(matches!(outcome, DispatchOutcome::NoRoute));

        assert_eq!(services.calls(), vec!["StickerUnit"]);
    }

    #[tokio::test]
    async fn test_empty_text_falls_through_to_payload() {
        let services = Arc::new(Services::default());
        let (registry, container) = Discovery::<Arc<Services>>::new()
            .unit::<PhotoUnit>()
            .finish()
            .unwrap();
        let dispatcher = Dispatcher::new(registry, container, Arc::clone(&services));

        let message = Message {
            chat_id: 42,
            text: Some(String::new()),
            photo: vec![FileRef::new("ph")],
            ..Default::default()
        };
        let outcome = dispatcher
            .dispatch(
                Update::new(1, UpdateKind::Message(message)),
                CancellationToken::new(),
            )
            .await;
        assert_eq!(outcome.handler(), Some(HandlerId::of::<PhotoUnit>()));
    }

    #[tokio::test]
    async fn test_chosen_inline_result_uses_its_slot() {
        let services = Arc::new(Services::default());
        let (registry, container) = Discovery::<Arc<Services>>::new()
            .unit::<ChosenUnit>()
            .finish()
            .unwrap();
        let dispatcher = Dispatcher::new(registry, container, Arc::clone(&services));

        let update = Update::new(
            5,
            UpdateKind::ChosenInlineResult(ChosenInlineResult {
                result_id: "r1".to_string(),
                from: sender(),
                query: "cats".to_string(),
            }),
        );
        let outcome = dispatcher.dispatch(update, CancellationToken::new()).await;
        assert_eq!(outcome.handler(), Some(HandlerId::of::<ChosenUnit>()));

        let outcome = dispatcher
            .dispatch(Update::new(6, UpdateKind::Other), CancellationToken::new())
            .await;
        assert!(matches!(outcome, DispatchOutcome::NoRoute));
    }

    #[tokio::test]
    async fn test_cancellation_reaches_handler() {
        let (dispatcher, services) = scenario();
        let token = CancellationToken::new();
        token.cancel();

        let outcome = dispatcher.dispatch(text("/slow"), token).await;

        assert!(outcome.is_completed());
        assert_eq!(services.calls(), vec!["cancelled"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_dispatches_share_registry() {
        let (dispatcher, services) = scenario();
        let dispatcher = Arc::new(dispatcher);

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let dispatcher = Arc::clone(&dispatcher);
                let input = if i % 2 == 0 { "/start" } else { "hello" };
                tokio::spawn(async move {
                    dispatcher
                        .dispatch(text(input), CancellationToken::new())
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().is_completed());
        }
        let calls = services.calls();
        assert_eq!(calls.iter().filter(|c| **c == "H1").count(), 8);
        assert_eq!(calls.iter().filter(|c| **c == "H2").count(), 8);
    }

    #[test]
    fn test_command_token() {
        assert_eq!(command_token("/start"), "/start");
        assert_eq!(command_token("/start@routebot"), "/start");
        assert_eq!(command_token("/start@routebot arg"), "/start");
        assert_eq!(command_token("/start arg@x"), "/start");
    }

    #[test]
    fn test_message_payload_precedence() {
        let message = Message {
            voice: Some(FileRef::new("v")),
            audio: Some(FileRef::new("a")),
            ..Default::default()
        };
        assert_eq!(message_payload(&message), Some(UnaryKind::Voice));
        assert_eq!(message_payload(&Message::default()), None);
    }
}
