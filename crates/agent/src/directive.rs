//! Inline directives: `!word` tokens embedded in a chat message.
//!
//! A directive is any whitespace-delimited token that starts with `!`. Its
//! name is the token lower-cased with every `!` removed, so `!GPT4` and
//! `!gpt4` are the same directive. Parsing never fails.

use std::fmt;

/// Directive marker character.
pub const MARKER: char = '!';

/// A parsed directive.
///
/// Every reserved context name has its own variant; anything else names a
/// user-defined context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Directive {
    Help,
    Contexts,
    Me,
    Set,
    Unset,
    Topic,
    Stream,
    New,
    Gpt3,
    Gpt4,
    Admin,
    Stats,
    /// A named context, lower-cased
    Custom(String),
}

impl Directive {
    /// Map a lower-cased directive name to its variant.
    pub fn from_name(name: &str) -> Self {
        match name {
            "help" => Self::Help,
            "contexts" => Self::Contexts,
            "me" => Self::Me,
            "set" => Self::Set,
            "unset" => Self::Unset,
            "topic" => Self::Topic,
            "stream" => Self::Stream,
            "new" => Self::New,
            "gpt3" => Self::Gpt3,
            "gpt4" => Self::Gpt4,
            "admin" => Self::Admin,
            "stats" => Self::Stats,
            other => Self::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Help => "help",
            Self::Contexts => "contexts",
            Self::Me => "me",
            Self::Set => "set",
            Self::Unset => "unset",
            Self::Topic => "topic",
            Self::Stream => "stream",
            Self::New => "new",
            Self::Gpt3 => "gpt3",
            Self::Gpt4 => "gpt4",
            Self::Admin => "admin",
            Self::Stats => "stats",
            Self::Custom(name) => name,
        }
    }

    /// The context name this directive refers to, if it isn't reserved.
    pub fn context_name(&self) -> Option<&str> {
        match self {
            Self::Custom(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{MARKER}{}", self.as_str())
    }
}

/// Unique directives in order of first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveSet {
    items: Vec<Directive>,
}

impl DirectiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directive. Returns `false` if it was already present.
    pub fn insert(&mut self, directive: Directive) -> bool {
        if self.items.contains(&directive) {
            return false;
        }
        self.items.push(directive);
        true
    }

    pub fn contains(&self, directive: &Directive) -> bool {
        self.items.contains(directive)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Directive> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Directive names joined for logging, e.g. `cicada, gpt4`.
    pub fn names(&self) -> String {
        self.items
            .iter()
            .map(Directive::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl<'a> IntoIterator for &'a DirectiveSet {
    type Item = &'a Directive;
    type IntoIter = std::slice::Iter<'a, Directive>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl FromIterator<Directive> for DirectiveSet {
    fn from_iter<I: IntoIterator<Item = Directive>>(iter: I) -> Self {
        let mut set = Self::new();
        for directive in iter {
            set.insert(directive);
        }
        set
    }
}

/// A message split into its directives and the remaining text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMessage {
    /// Text with directive tokens removed, trimmed
    pub text: String,
    pub directives: DirectiveSet,
}

impl ParsedMessage {
    pub fn has(&self, directive: &Directive) -> bool {
        self.directives.contains(directive)
    }
}

/// Directive name for a token, or `None` if the token isn't one.
fn directive_name(token: &str) -> Option<String> {
    if !token.starts_with(MARKER) {
        return None;
    }
    let name = token.replace(MARKER, "").to_lowercase();
    (!name.is_empty()).then_some(name)
}

/// Byte spans of whitespace-delimited tokens.
fn token_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                spans.push((s, i));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

/// Split a message into directives and cleaned text.
///
/// Each directive token is removed together with one adjacent space: the
/// one after it if present, otherwise the one before it. Interior
/// whitespace elsewhere is left alone so code blocks survive.
pub fn parse(raw: &str) -> ParsedMessage {
    let bytes = raw.as_bytes();
    let mut directives = DirectiveSet::new();
    let mut removed: Vec<(usize, usize)> = Vec::new();

    for (start, end) in token_spans(raw) {
        let Some(name) = directive_name(&raw[start..end]) else {
            continue;
        };
        directives.insert(Directive::from_name(&name));

        let consumed = removed.last().map_or(0, |&(_, e)| e);
        let span = if bytes.get(end) == Some(&b' ') {
            (start, end + 1)
        } else if start > consumed && bytes[start - 1] == b' ' {
            (start - 1, end)
        } else {
            (start, end)
        };
        removed.push(span);
    }

    let mut text = String::with_capacity(raw.len());
    let mut cursor = 0;
    for (start, end) in removed {
        text.push_str(&raw[cursor..start]);
        cursor = end;
    }
    text.push_str(&raw[cursor..]);

    ParsedMessage {
        text: text.trim().to_string(),
        directives,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(parsed: &ParsedMessage) -> Vec<&str> {
        parsed.directives.iter().map(Directive::as_str).collect()
    }

    #[test]
    fn empty_input() {
        let parsed = parse("");
        assert_eq!(parsed.text, "");
        assert!(parsed.directives.is_empty());
    }

    #[test]
    fn plain_text_is_untouched() {
        let parsed = parse("  what is   the answer?  ");
        assert_eq!(parsed.text, "what is   the answer?");
        assert!(parsed.directives.is_empty());
    }

    #[test]
    fn leading_directives_are_removed() {
        let parsed = parse("!cicada !gpt4 summarize");
        assert_eq!(parsed.text, "summarize");
        assert_eq!(names(&parsed), vec!["cicada", "gpt4"]);
        assert!(parsed.has(&Directive::Gpt4));
        assert!(parsed.has(&Directive::Custom("cicada".into())));
    }

    #[test]
    fn trailing_directive_takes_preceding_space() {
        let parsed = parse("hello there !new");
        assert_eq!(parsed.text, "hello there");
        assert!(parsed.has(&Directive::New));
    }

    #[test]
    fn middle_directive_takes_one_space() {
        assert_eq!(parse("a !stream b").text, "a b");
        assert_eq!(parse("a  !stream  b").text, "a   b");
    }

    #[test]
    fn directives_are_case_insensitive_and_unique() {
        let parsed = parse("!GPT4 hi !gpt4 !Cicada");
        assert_eq!(names(&parsed), vec!["gpt4", "cicada"]);
        assert_eq!(parsed.text, "hi");
    }

    #[test]
    fn every_marker_is_stripped_from_the_name() {
        let parsed = parse("!!help");
        assert!(parsed.has(&Directive::Help));
        assert_eq!(parsed.text, "");
    }

    #[test]
    fn bare_marker_is_not_a_directive() {
        let parsed = parse("wow ! nice");
        assert!(parsed.directives.is_empty());
        assert_eq!(parsed.text, "wow ! nice");
    }

    #[test]
    fn embedded_marker_is_not_a_directive() {
        let parsed = parse("hello!world");
        assert!(parsed.directives.is_empty());
        assert_eq!(parsed.text, "hello!world");
    }

    #[test]
    fn newlines_are_preserved() {
        let parsed = parse("!new line one\nline two");
        assert_eq!(parsed.text, "line one\nline two");

        let parsed = parse("first\n!topic\nsecond");
        assert_eq!(parsed.text, "first\n\nsecond");
    }

    #[test]
    fn mixed_whitespace_and_repeated_directives() {
        let cases: &[(&str, &str, &[&str])] = &[
            ("!gpt4\t!gpt4 hi", "hi", &["gpt4"]),
            ("hi !gpt4\t!gpt4", "hi", &["gpt4"]),
            ("a\t!new\tb", "a\t\tb", &["new"]),
            ("!stream !STREAM\n!Cicada\tcode", "code", &["stream", "cicada"]),
            ("line one\n!new !new\nline two", "line one\n\nline two", &["new"]),
            ("!help!help x", "x", &["helphelp"]),
            ("\t!topic\n", "", &["topic"]),
        ];
        for (input, text, expected) in cases {
            let parsed = parse(input);
            assert_eq!(parsed.text, *text, "text of {input:?}");
            assert_eq!(names(&parsed), expected.to_vec(), "directives of {input:?}");
        }
    }

    #[test]
    fn set_command_text() {
        let parsed = parse("!set context cicada Cicada is a business wallet");
        assert!(parsed.has(&Directive::Set));
        assert_eq!(parsed.text, "context cicada Cicada is a business wallet");
    }

    #[test]
    fn non_ascii_text() {
        let parsed = parse("héllo !gpt3 wörld");
        assert_eq!(parsed.text, "héllo wörld");
        assert!(parsed.has(&Directive::Gpt3));
    }

    #[test]
    fn reserved_names_map_to_variants() {
        for name in zulipgpt_core::RESERVED_CONTEXT_NAMES {
            let directive = Directive::from_name(name);
            assert!(directive.context_name().is_none(), "{name}");
            assert_eq!(directive.as_str(), name);
        }
        assert_eq!(
            Directive::from_name("cicada").context_name(),
            Some("cicada")
        );
    }

    #[test]
    fn display_includes_marker() {
        assert_eq!(Directive::Gpt4.to_string(), "!gpt4");
    }
}
