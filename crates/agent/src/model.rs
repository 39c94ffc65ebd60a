//! Model profiles and per-message model selection.

use crate::directive::{Directive, DirectiveSet};
use crate::error::ModelError;

/// A completion model and how many prompt tokens it may be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelProfile {
    pub name: &'static str,
    pub input_token_budget: usize,
}

/// Known models. The budget leaves the rest of the context window for the reply.
pub const KNOWN_MODELS: &[ModelProfile] = &[
    // 4k context: 2.5k prompt, 1.5k reply
    ModelProfile {
        name: "gpt-3.5-turbo",
        input_token_budget: 2500,
    },
    ModelProfile {
        name: "gpt-3.5-turbo-0301",
        input_token_budget: 2500,
    },
    // 8k context: 6k prompt, 2k reply
    ModelProfile {
        name: "gpt-4",
        input_token_budget: 6000,
    },
    ModelProfile {
        name: "gpt-4-0314",
        input_token_budget: 6000,
    },
    ModelProfile {
        name: "gpt-4-0613",
        input_token_budget: 6000,
    },
];

/// Selected by `!gpt3` and used when nothing else is configured.
pub const BASELINE_MODEL: ModelProfile = KNOWN_MODELS[0];

/// Selected by `!gpt4`.
pub const HIGHEST_MODEL: ModelProfile = KNOWN_MODELS[2];

impl ModelProfile {
    /// Look up a model by exact name.
    pub fn lookup(name: &str) -> Result<Self, ModelError> {
        KNOWN_MODELS
            .iter()
            .find(|m| m.name == name)
            .copied()
            .ok_or_else(|| ModelError::UnknownModel {
                name: name.to_string(),
                known: KNOWN_MODELS
                    .iter()
                    .map(|m| m.name)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// Picks the model for a message from its directives and the configured default.
#[derive(Debug, Clone, Copy)]
pub struct ModelSelector {
    default: ModelProfile,
}

impl ModelSelector {
    /// Fails when the configured default isn't a known model.
    pub fn new(default_model: Option<&str>) -> Result<Self, ModelError> {
        let default = match default_model {
            Some(name) => ModelProfile::lookup(name)?,
            None => BASELINE_MODEL,
        };
        Ok(Self { default })
    }

    pub fn default_model(&self) -> ModelProfile {
        self.default
    }

    /// `!gpt4` beats `!gpt3`, which beats the configured default.
    pub fn select(&self, directives: &DirectiveSet) -> ModelProfile {
        if directives.contains(&Directive::Gpt4) {
            HIGHEST_MODEL
        } else if directives.contains(&Directive::Gpt3) {
            BASELINE_MODEL
        } else {
            self.default
        }
    }
}
