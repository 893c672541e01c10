use super::command_registry::{CommandSpec, NO_ARG_COMMANDS, SINGLE_PATH_COMMANDS};

/// One line of interactive session input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Noop,
    Open { path: String },
    Analyze,
    Status,
    Wait,
    Help,
    Quit,
    Unknown { command: String, arg: String },
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
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
    let parts = parse_path_args(arg);
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

fn no_arg_command(action: &str) -> Option<SessionCommand> {
    match action {
        "analyze" => Some(SessionCommand::Analyze),
        "status" => Some(SessionCommand::Status),
        "wait" => Some(SessionCommand::Wait),
        "help" => Some(SessionCommand::Help),
        "quit" => Some(SessionCommand::Quit),
        _ => None,
    }
}

/// Parses a session line. Bare (non-slash) input is treated as a path to
/// open.
pub fn parse_command(text: &str) -> SessionCommand {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return SessionCommand::Noop;
    }

    let Some(slash_tail) = raw_trimmed.strip_prefix('/') else {
        return SessionCommand::Open {
            path: parse_single_path_arg(raw_trimmed),
        };
    };

    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    let remainder = &slash_tail[command_len..];
    // "/tmp/scan.png" is an absolute path, not a command.
    if command_len == 0 || !(remainder.is_empty() || remainder.starts_with(char::is_whitespace))
    {
        return SessionCommand::Open {
            path: parse_single_path_arg(raw_trimmed),
        };
    }
    let command = slash_tail[..command_len].to_ascii_lowercase();
    let arg = remainder.trim();

    if find_action(&command, SINGLE_PATH_COMMANDS).is_some() {
        return SessionCommand::Open {
            path: parse_single_path_arg(arg),
        };
    }

    if let Some(parsed) = find_action(&command, NO_ARG_COMMANDS).and_then(no_arg_command) {
        return parsed;
    }

    SessionCommand::Unknown {
        command,
        arg: arg.to_string(),
    }
}
