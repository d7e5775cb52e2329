pub mod telegram;

use std::sync::Arc;

/// One inbound event from the chat platform
#[derive(Debug, Clone)]
pub struct Update {
    pub id: u64,
    pub kind: UpdateKind,
    /// Telegram update this one was converted from, for fields the
    /// routing model does not carry
    pub raw: Option<Arc<teloxide::types::Update>>,
}

impl Update {
    pub fn new(id: u64, kind: UpdateKind) -> Self {
        Self {
            id,
            kind,
            raw: None,
        }
    }

    pub fn with_raw(mut self, raw: Arc<teloxide::types::Update>) -> Self {
        self.raw = Some(raw);
        self
    }

    /// Chat the update belongs to, when there is one to reply into
    pub fn chat_id(&self) -> Option<i64> {
        match &self.kind {
            UpdateKind::Message(message) => Some(message.chat_id),
            UpdateKind::CallbackQuery(query) => query.chat_id,
            _ => None,
        }
    }

    /// User that caused the update, if known
    pub fn sender(&self) -> Option<&Sender> {
        match &self.kind {
            UpdateKind::Message(message) => message.from.as_ref(),
            UpdateKind::CallbackQuery(query) => Some(&query.from),
            UpdateKind::InlineQuery(query) => Some(&query.from),
            UpdateKind::ChosenInlineResult(result) => Some(&result.from),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum UpdateKind {
    Message(Message),
    CallbackQuery(CallbackQuery),
    InlineQuery(InlineQuery),
    ChosenInlineResult(ChosenInlineResult),
    Poll(Poll),
    PollAnswer(PollAnswer),
    /// Any update type the router does not classify
    Other,
}

impl UpdateKind {
    pub fn name(&self) -> &'static str {
        match self {
            UpdateKind::Message(_) => "message",
            UpdateKind::CallbackQuery(_) => "callback_query",
            UpdateKind::InlineQuery(_) => "inline_query",
            UpdateKind::ChosenInlineResult(_) => "chosen_inline_result",
            UpdateKind::Poll(_) => "poll",
            UpdateKind::PollAnswer(_) => "poll_answer",
            UpdateKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: u64,
    pub first_name: String,
    pub username: Option<String>,
}

/// A chat message. More than one payload may be set; the router picks one
/// by a fixed precedence.
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub chat_id: i64,
    pub from: Option<Sender>,
    pub text: Option<String>,
    pub sticker: Option<Sticker>,
    pub photo: Vec<FileRef>,
    pub video: Option<FileRef>,
    pub document: Option<FileRef>,
    pub voice: Option<FileRef>,
    pub audio: Option<FileRef>,
    pub location: Option<Location>,
    pub contact: Option<Contact>,
}

impl Message {
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub file_id: String,
}

impl FileRef {
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sticker {
    pub file: FileRef,
    pub emoji: Option<String>,
    pub set_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub phone_number: String,
    pub first_name: String,
}

#[derive(Debug, Clone)]
pub struct CallbackQuery {
    pub id: String,
    pub from: Sender,
    pub data: Option<String>,
    /// Chat of the message carrying the pressed button
    pub chat_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct InlineQuery {
    pub id: String,
    pub from: Sender,
    pub query: String,
}

#[derive(Debug, Clone)]
pub struct ChosenInlineResult {
    pub result_id: String,
    pub from: Sender,
    pub query: String,
}

#[derive(Debug, Clone)]
pub struct Poll {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct PollAnswer {
    pub poll_id: String,
}
