use std::collections::BTreeMap;

use serde_json::Value;

use super::registry::{
    CommandSpec, INDEX_COMMANDS, MULTI_PATH_COMMANDS, NO_ARG_COMMANDS, RAW_ARG_COMMANDS,
    SINGLE_PATH_COMMANDS,
};

/// One parsed line of the interactive session. Plain text becomes a
/// `generate` command carrying the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub action: String,
    pub raw: String,
    pub prompt: Option<String>,
    pub args: BTreeMap<String, Value>,
}

impl Command {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            prompt: None,
            args: BTreeMap::new(),
        }
    }

    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.args
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn arg_index(&self, key: &str) -> Option<usize> {
        self.args
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|value| usize::try_from(value).ok())
    }

    pub fn arg_paths(&self, key: &str) -> Vec<String> {
        self.args
            .get(key)
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|entry| entry.command == command)
        .map(|entry| entry.action)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    parse_path_args(arg).join(" ")
}

pub fn parse_command(text: &str) -> Command {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Command::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, RAW_ARG_COMMANDS) {
                let mut parsed = Command::new(action, text);
                parsed
                    .args
                    .insert("value".to_string(), Value::String(arg.to_string()));
                return parsed;
            }

            if let Some(action) = find_action(&command, SINGLE_PATH_COMMANDS) {
                let mut parsed = Command::new(action, text);
                parsed.args.insert(
                    "path".to_string(),
                    Value::String(parse_single_path_arg(arg)),
                );
                return parsed;
            }

            if let Some(action) = find_action(&command, MULTI_PATH_COMMANDS) {
                let mut parsed = Command::new(action, text);
                parsed.args.insert(
                    "paths".to_string(),
                    Value::Array(
                        parse_path_args(arg)
                            .into_iter()
                            .map(Value::String)
                            .collect(),
                    ),
                );
                return parsed;
            }

            if let Some(action) = find_action(&command, INDEX_COMMANDS) {
                let mut parsed = Command::new(action, text);
                let index = arg
                    .parse::<u64>()
                    .map(Value::from)
                    .unwrap_or(Value::Null);
                parsed.args.insert("index".to_string(), index);
                return parsed;
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Command::new(action, text);
            }

            let mut parsed = Command::new("unknown", text);
            parsed
                .args
                .insert("command".to_string(), Value::String(command));
            parsed
                .args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return parsed;
        }
    }

    let mut parsed = Command::new("generate", text);
    parsed.prompt = Some(raw_trimmed.to_string());
    parsed
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_command;

    #[test]
    fn plain_text_is_a_generate_prompt() {
        let parsed = parse_command("  rainy neon city ");
        assert_eq!(parsed.action, "generate");
        assert_eq!(parsed.prompt.as_deref(), Some("rainy neon city"));
        assert_eq!(parse_command("   ").action, "noop");
    }

    #[test]
    fn parse_add_quoted_paths() {
        let parsed = parse_command("/add \"/tmp/a b.png\" c.jpg");
        assert_eq!(parsed.action, "add_files");
        assert_eq!(parsed.args["paths"], json!(["/tmp/a b.png", "c.jpg"]));
        assert_eq!(parsed.arg_paths("paths"), vec!["/tmp/a b.png", "c.jpg"]);
    }

    #[test]
    fn parse_raw_arg_commands() {
        let tab = parse_command("/tab History");
        assert_eq!(tab.action, "switch_tab");
        assert_eq!(tab.arg_str("value"), Some("History"));

        let model = parse_command("/model gpt-4o-mini");
        assert_eq!(model.action, "set_model");
        assert_eq!(model.arg_str("value"), Some("gpt-4o-mini"));

        let cleared = parse_command("/api_key");
        assert_eq!(cleared.action, "set_api_key");
        assert_eq!(cleared.arg_str("value"), None);
    }

    #[test]
    fn parse_index_commands() {
        let remove = parse_command("/remove 2");
        assert_eq!(remove.action, "remove_asset");
        assert_eq!(remove.arg_index("index"), Some(2));

        let bad = parse_command("/unpin two");
        assert_eq!(bad.action, "unpin");
        assert_eq!(bad.arg_index("index"), None);
    }

    #[test]
    fn parse_import_keeps_spaces_in_path() {
        let parsed = parse_command("/import  \"/tmp/my recipe.json\" ");
        assert_eq!(parsed.action, "import");
        assert_eq!(parsed.arg_str("path"), Some("/tmp/my recipe.json"));
    }

    #[test]
    fn parse_no_arg_and_unknown_commands() {
        assert_eq!(parse_command("/PIN").action, "pin");
        assert_eq!(parse_command("/export").action, "export");

        let unknown = parse_command("/magic foo bar");
        assert_eq!(unknown.action, "unknown");
        assert_eq!(unknown.args["command"], json!("magic"));
        assert_eq!(unknown.args["arg"], json!("foo bar"));
    }
}
