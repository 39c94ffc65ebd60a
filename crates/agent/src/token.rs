//! Prompt token counting.
//!
//! Follows the chat-format accounting OpenAI documents for the gpt-3.5 and
//! gpt-4 families: every turn is framed as
//! `<|start|>{role/name}\n{content}<|end|>\n` (4 tokens plus the encoded
//! fields) and the reply is primed with `<|start|>assistant` (2 tokens).

use crate::error::TokenError;
use tiktoken_rs::CoreBPE;
use zulipgpt_core::message::ChatTurn;

/// Framing tokens per turn.
pub const TOKENS_PER_TURN: usize = 4;
/// Tokens priming the assistant reply.
pub const REPLY_PRIMING_TOKENS: usize = 2;

/// Counts the prompt tokens a list of turns costs for a model.
pub trait TokenCounter: Send + Sync {
    /// Cost of a single turn, including its framing.
    fn count_turn(&self, model: &str, turn: &ChatTurn) -> Result<usize, TokenError>;

    /// Fixed cost added once per request.
    fn reply_priming(&self) -> usize {
        REPLY_PRIMING_TOKENS
    }

    /// Total cost of a request made of `turns`.
    fn count(&self, model: &str, turns: &[ChatTurn]) -> Result<usize, TokenError> {
        let mut total = self.reply_priming();
        for turn in turns {
            total += self.count_turn(model, turn)?;
        }
        Ok(total)
    }
}

/// BPE encodings used by supported model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Cl100kBase,
}

/// Encoding for a model name; unknown families are an error.
pub fn encoding_for(model: &str) -> Result<Encoding, TokenError> {
    if model.starts_with("gpt-3.5") || model.starts_with("gpt-4") {
        Ok(Encoding::Cl100kBase)
    } else {
        Err(TokenError::UnknownModel(model.to_string()))
    }
}

/// Exact counter backed by the tiktoken BPE tables.
pub struct TiktokenCounter {
    cl100k: CoreBPE,
}

impl TiktokenCounter {
    pub fn new() -> Result<Self, TokenError> {
        let cl100k =
            tiktoken_rs::cl100k_base().map_err(|e| TokenError::Encoding(e.to_string()))?;
        Ok(Self { cl100k })
    }

    fn bpe(&self, encoding: Encoding) -> &CoreBPE {
        match encoding {
            Encoding::Cl100kBase => &self.cl100k,
        }
    }

    /// Number of tokens in `text` for `model`.
    pub fn count_text(&self, model: &str, text: &str) -> Result<usize, TokenError> {
        let bpe = self.bpe(encoding_for(model)?);
        Ok(bpe.encode_ordinary(text).len())
    }
}

impl TokenCounter for TiktokenCounter {
    fn count_turn(&self, model: &str, turn: &ChatTurn) -> Result<usize, TokenError> {
        let bpe = self.bpe(encoding_for(model)?);
        let mut tokens = TOKENS_PER_TURN
            + bpe.encode_ordinary(turn.role.as_str()).len()
            + bpe.encode_ordinary(&turn.content).len();
        if let Some(name) = &turn.name {
            // The name replaces the role token in the framing.
            tokens = (tokens + bpe.encode_ordinary(name).len()).saturating_sub(1);
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> TiktokenCounter {
        TiktokenCounter::new().unwrap()
    }

    #[test]
    fn model_families() {
        assert_eq!(encoding_for("gpt-3.5-turbo"), Ok(Encoding::Cl100kBase));
        assert_eq!(encoding_for("gpt-4-0613"), Ok(Encoding::Cl100kBase));
        assert_eq!(
            encoding_for("text-davinci-003"),
            Err(TokenError::UnknownModel("text-davinci-003".into()))
        );
    }

    #[test]
    fn text_tokens() {
        let c = counter();
        assert_eq!(c.count_text("gpt-4", "hello world").unwrap(), 2);
        assert_eq!(c.count_text("gpt-4", "").unwrap(), 0);
    }

    #[test]
    fn turn_includes_framing_and_role() {
        let c = counter();
        // 4 framing + 1 ("user") + 2 ("hello world")
        assert_eq!(c.count_turn("gpt-3.5-turbo", &ChatTurn::user("hello world")).unwrap(), 7);
    }

    #[test]
    fn name_adds_its_tokens_minus_one() {
        let c = counter();
        let plain = c.count_turn("gpt-4", &ChatTurn::user("hello world")).unwrap();
        let named = c
            .count_turn("gpt-4", &ChatTurn::user("hello world").with_name("hello"))
            .unwrap();
        assert_eq!(named, plain + 1 - 1);
    }

    #[test]
    fn request_adds_reply_priming() {
        let c = counter();
        let turns = vec![ChatTurn::user("hello world"), ChatTurn::user("hello world")];
        assert_eq!(c.count("gpt-4", &turns).unwrap(), 7 + 7 + 2);
        assert_eq!(c.count("gpt-4", &[]).unwrap(), 2);
    }

    #[test]
    fn unknown_model_is_an_error() {
        let c = counter();
        assert!(matches!(
            c.count("claude-2", &[ChatTurn::user("hi")]),
            Err(TokenError::UnknownModel(_))
        ));
    }
}
