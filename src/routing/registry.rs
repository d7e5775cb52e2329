use std::collections::HashMap;

use tracing::debug;

use super::{HandlerId, MatchRule, UnaryKind};

/// Pattern table that keeps registration order.
/// Re-registering a pattern replaces its handler but keeps its position.
#[derive(Debug, Default, Clone)]
struct PatternTable {
    entries: Vec<PatternEntry>,
}

#[derive(Debug, Clone)]
struct PatternEntry {
    pattern: String,
    folded: String,
    handler: HandlerId,
}

impl PatternTable {
    fn set(&mut self, pattern: String, handler: HandlerId) -> Option<HandlerId> {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.pattern == pattern) {
            return Some(std::mem::replace(&mut entry.handler, handler));
        }
        self.entries.push(PatternEntry {
            folded: fold_case(&pattern),
            pattern,
            handler,
        });
        None
    }

    fn get(&self, pattern: &str) -> Option<HandlerId> {
        self.entries
            .iter()
            .find(|e| e.pattern == pattern)
            .map(|e| e.handler)
    }

    /// First entry, in registration order, whose pattern is a
    /// case-insensitive substring of `haystack`. An empty pattern matches.
    fn first_match(&self, haystack: &str) -> Option<HandlerId> {
        let folded = fold_case(haystack);
        self.entries
            .iter()
            .find(|e| folded.contains(&e.folded))
            .map(|e| e.handler)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Case-fold one character at a time with simple uppercase mapping.
/// Characters whose uppercase form is not a single character stay as they
/// are, so `İ` and the Kelvin sign only ever match themselves.
fn fold_case(text: &str) -> String {
    text.chars()
        .map(|c| {
            let mut upper = c.to_uppercase();
            match (upper.next(), upper.next()) {
                (Some(u), None) => u,
                _ => c,
            }
        })
        .collect()
}

/// Lookup tables from match rules to handler units.
///
/// Built once by [`Discovery`](super::Discovery) and read-only afterwards.
/// Absence of a binding is never an error, just "no match".
#[derive(Debug, Clone)]
pub struct Registry {
    commands: HashMap<String, HandlerId>,
    callbacks: HashMap<String, HandlerId>,
    texts: PatternTable,
    inline_queries: PatternTable,
    unary: [Option<HandlerId>; UnaryKind::COUNT],
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
            callbacks: HashMap::new(),
            texts: PatternTable::default(),
            inline_queries: PatternTable::default(),
            unary: [None; UnaryKind::COUNT],
        }
    }

    /// Bind `rule` to `handler`, replacing any earlier binding for the same key
    pub fn set(&mut self, rule: MatchRule, handler: HandlerId) {
        let label = rule.to_string();
        let previous = match rule {
            MatchRule::Command(token) => self.commands.insert(token, handler),
            MatchRule::Callback(data) => self.callbacks.insert(data, handler),
            MatchRule::Text(pattern) => self.texts.set(pattern, handler),
            MatchRule::InlineQuery(pattern) => self.inline_queries.set(pattern, handler),
            MatchRule::Unary(kind) => self.unary[kind.slot()].replace(handler),
        };

        if let Some(previous) = previous {
            debug!("Binding for {} moved from {} to {}", label, previous, handler);
        }
    }

    /// Exact lookup of the handler bound to `rule`
    pub fn get(&self, rule: &MatchRule) -> Option<HandlerId> {
        match rule {
            MatchRule::Command(token) => self.command(token),
            MatchRule::Callback(data) => self.callback(data),
            MatchRule::Text(pattern) => self.texts.get(pattern),
            MatchRule::InlineQuery(pattern) => self.inline_queries.get(pattern),
            MatchRule::Unary(kind) => self.unary(*kind),
        }
    }

    pub fn command(&self, token: &str) -> Option<HandlerId> {
        self.commands.get(token).copied()
    }

    pub fn callback(&self, data: &str) -> Option<HandlerId> {
        self.callbacks.get(data).copied()
    }

    pub fn unary(&self, kind: UnaryKind) -> Option<HandlerId> {
        self.unary[kind.slot()]
    }

    /// First text rule, in registration order, contained in `text`
    pub fn match_text(&self, text: &str) -> Option<HandlerId> {
        self.texts.first_match(text)
    }

    /// First inline query rule, in registration order, that accepts `query`
    pub fn match_inline_query(&self, query: &str) -> Option<HandlerId> {
        self.inline_queries.first_match(query)
    }

    /// Total number of bound rules across all tables
    pub fn len(&self) -> usize {
        self.commands.len()
            + self.callbacks.len()
            + self.texts.len()
            + self.inline_queries.len()
            + self.unary.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
