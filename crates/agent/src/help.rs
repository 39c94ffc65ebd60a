//! The `!help` reply.

/// Version reported in the help text.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Render the help text for a bot called `bot_name`.
pub fn help_text(bot_name: &str) -> String {
    format!(
        r#"# {bot_name}
I forward your messages to an OpenAI chat model and post the answer in the same conversation.

## Talking to me
Mention me in a stream, e.g. `@**{bot_name}** hello!`, or send me a private message (no mention needed).
Earlier messages of the conversation are sent along as context, as far as the model's prompt budget allows.

## Directives
Directives are words starting with `!`, placed anywhere in the message. They are removed before the text is sent to the model.

### General
- `!help` - show this message

### Conversation history
- `!topic` - use earlier messages from this topic (the default)
- `!stream` - use earlier messages from the whole stream
- `!new` - ignore earlier messages and start a fresh conversation

### Named contexts
- `!contexts` - list the named contexts and their text
- `!<name>` - add a named context as an extra system instruction, e.g. `!cicada`
- `!set context <name> <text>` - create or replace a named context, e.g. `!set context cicada Cicada is a business wallet`
- `!unset context <name>` - delete a named context

### Models
- `!gpt3` - use GPT-3.5 Turbo (4K context, up to 2.5K tokens of prompt)
- `!gpt4` - use GPT-4 (8K context, up to 6K tokens of prompt)

### User settings
- `!me` - show your settings (not implemented yet)

## Examples
- `@**{bot_name}** !gpt4 !stream Can you summarise the previous messages?`
- `@**{bot_name}** !new I have a question...`

Version: {VERSION}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mentions_bot_and_version() {
        let text = help_text("GPT");
        assert!(text.starts_with("# GPT"));
        assert!(text.contains("@**GPT**"));
        assert!(text.contains(VERSION));
    }

    #[test]
    fn lists_every_directive() {
        let text = help_text("GPT");
        for directive in ["!help", "!topic", "!stream", "!new", "!contexts", "!set", "!unset", "!gpt3", "!gpt4", "!me"] {
            assert!(text.contains(directive), "missing {directive}");
        }
    }
}
