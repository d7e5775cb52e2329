pub mod discovery;
pub mod dispatcher;
pub mod handler;
pub mod registry;

use std::fmt;

pub use discovery::{Container, Discovery};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use handler::{BoxedHandler, Handler, HandlerUnit};
pub use registry::Registry;

/// Prefix that marks a message text as a bot command
pub const COMMAND_MARKER: char = '/';

/// Update kinds that bind to at most one handler unit each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryKind {
    Sticker,
    Photo,
    Video,
    Document,
    Voice,
    Audio,
    Location,
    Contact,
    ChosenInlineResult,
    Poll,
    PollAnswer,
}

impl UnaryKind {
    pub const COUNT: usize = 11;

    /// Message payload kinds in the order the classifier tests them.
    /// Only the first one present on a message is honored.
    pub const MESSAGE_PRECEDENCE: [UnaryKind; 8] = [
        UnaryKind::Sticker,
        UnaryKind::Photo,
        UnaryKind::Video,
        UnaryKind::Document,
        UnaryKind::Voice,
        UnaryKind::Audio,
        UnaryKind::Location,
        UnaryKind::Contact,
    ];

    pub(crate) fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for UnaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnaryKind::Sticker => "sticker",
            UnaryKind::Photo => "photo",
            UnaryKind::Video => "video",
            UnaryKind::Document => "document",
            UnaryKind::Voice => "voice",
            UnaryKind::Audio => "audio",
            UnaryKind::Location => "location",
            UnaryKind::Contact => "contact",
            UnaryKind::ChosenInlineResult => "chosen_inline_result",
            UnaryKind::Poll => "poll",
            UnaryKind::PollAnswer => "poll_answer",
        };
        f.write_str(name)
    }
}

/// A declarative condition that selects the handler unit for an update
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatchRule {
    /// Exact command token, including the marker (e.g. `/start`)
    Command(String),
    /// Exact callback payload
    Callback(String),
    /// Case-insensitive substring of a plain text message
    Text(String),
    /// Case-insensitive substring of an inline query; empty matches any query
    InlineQuery(String),
    Unary(UnaryKind),
}

impl MatchRule {
    pub fn command(token: impl Into<String>) -> Self {
        Self::Command(token.into())
    }

    pub fn callback(data: impl Into<String>) -> Self {
        Self::Callback(data.into())
    }

    pub fn text(pattern: impl Into<String>) -> Self {
        Self::Text(pattern.into())
    }

    pub fn inline_query(pattern: impl Into<String>) -> Self {
        Self::InlineQuery(pattern.into())
    }

    /// Inline query rule that accepts every query
    pub fn any_inline_query() -> Self {
        Self::InlineQuery(String::new())
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchRule::Command(token) => write!(f, "command {}", token),
            MatchRule::Callback(data) => write!(f, "callback {:?}", data),
            MatchRule::Text(pattern) => write!(f, "text {:?}", pattern),
            MatchRule::InlineQuery(pattern) if pattern.is_empty() => f.write_str("inline query *"),
            MatchRule::InlineQuery(pattern) => write!(f, "inline query {:?}", pattern),
            MatchRule::Unary(kind) => write!(f, "{}", kind),
        }
    }
}

/// Opaque reference to a handler unit, derived from its type.
///
/// The registry maps rules to these ids only; instances are built by the
/// [`Container`] for each dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(&'static str);

impl HandlerId {
    pub fn of<H: 'static>() -> Self {
        Self(std::any::type_name::<H>())
    }

    /// Fully qualified type path of the handler unit
    pub fn type_name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short type name, without the module path
        let short = self.0.rsplit("::").next().unwrap_or(self.0);
        f.write_str(short)
    }
}
