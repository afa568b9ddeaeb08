use std::fmt;

use crate::audio::track::LoopMode;

/// A recognized prefix command with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Play(String),
    Now,
    Queue,
    Pause,
    Resume,
    Skip,
    Stop,
    Leave,
    Loop(LoopMode),
    LoopStatus,
    PlaylistCreate(String),
    PlaylistList,
    PlaylistAdd { name: String, query: String },
    PlaylistRemove { name: String, query: String },
    PlaylistShow(String),
    PlaylistPlay(String),
    PlaylistDelete(String),
    SetVc(String),
    SetText(String),
    SetRole(String),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Play(_) => "play",
            Command::Now => "now",
            Command::Queue => "queue",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Skip => "skip",
            Command::Stop => "stop",
            Command::Leave => "leave",
            Command::Loop(_) => "loop",
            Command::LoopStatus => "loop_status",
            Command::PlaylistCreate(_) => "playlist_create",
            Command::PlaylistList => "playlist_list",
            Command::PlaylistAdd { .. } => "playlist_add",
            Command::PlaylistRemove { .. } => "playlist_remove",
            Command::PlaylistShow(_) => "playlist_show",
            Command::PlaylistPlay(_) => "playlist_play",
            Command::PlaylistDelete(_) => "playlist_delete",
            Command::SetVc(_) => "set_vc",
            Command::SetText(_) => "set_text",
            Command::SetRole(_) => "set_role",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Prefixed, but not one of ours. Ignored silently.
    Unknown(String),
    /// Missing or invalid argument; `usage` is shown to the user.
    Usage(&'static str),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Unknown(verb) => write!(f, "unknown command '{}'", verb),
            ParseError::Usage(usage) => write!(f, "usage: {}", usage),
        }
    }
}

/// Splits `content` into a command. Returns `None` when the message does not
/// start with `prefix`.
///
/// Single-word arguments (playlist and channel names) take the next word;
/// trailing arguments (queries) take the rest of the line.
pub fn parse_command(prefix: &str, content: &str) -> Option<Result<Command, ParseError>> {
    let body = content.trim().strip_prefix(prefix)?;
    let (verb, rest) = split_word(body);
    if verb.is_empty() {
        return None;
    }
    Some(parse_verb(&verb.to_ascii_lowercase(), rest))
}

fn parse_verb(verb: &str, rest: &str) -> Result<Command, ParseError> {
    let command = match verb {
        "play" => Command::Play(required(rest, "play <url or search phrase>")?),
        "now" => Command::Now,
        "queue" | "queue_show" => Command::Queue,
        "pause" => Command::Pause,
        "resume" => Command::Resume,
        "skip" => Command::Skip,
        "stop" => Command::Stop,
        "leave" => Command::Leave,
        "loop" => Command::Loop(
            rest.parse::<LoopMode>()
                .map_err(|_| ParseError::Usage("loop off | loop song | loop queue"))?,
        ),
        "loop_status" => Command::LoopStatus,
        "playlist_create" => Command::PlaylistCreate(word(rest, "playlist_create <name>")?),
        "playlist_list" => Command::PlaylistList,
        "playlist_add" => {
            let usage = "playlist_add <name> <url or search phrase>";
            let (name, query) = split_word(rest);
            Command::PlaylistAdd {
                name: required(name, usage)?,
                query: required(query, usage)?,
            }
        }
        "playlist_remove" => {
            let usage = "playlist_remove <name> <entry>";
            let (name, query) = split_word(rest);
            Command::PlaylistRemove {
                name: required(name, usage)?,
                query: required(query, usage)?,
            }
        }
        "playlist_show" => Command::PlaylistShow(word(rest, "playlist_show <name>")?),
        "playlist_play" => Command::PlaylistPlay(word(rest, "playlist_play <name>")?),
        "playlist_delete" => Command::PlaylistDelete(word(rest, "playlist_delete <name>")?),
        "set_vc" => Command::SetVc(required(rest, "set_vc <voice channel>")?),
        "set_text" => Command::SetText(required(rest, "set_text <text channel>")?),
        "set_role" => Command::SetRole(required(rest, "set_role <role>")?),
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(command)
}

fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail.trim()),
        None => (input, ""),
    }
}

fn required(rest: &str, usage: &'static str) -> Result<String, ParseError> {
    let rest = rest.trim();
    if rest.is_empty() {
        Err(ParseError::Usage(usage))
    } else {
        Ok(rest.to_string())
    }
}

fn word(rest: &str, usage: &'static str) -> Result<String, ParseError> {
    let (first, _) = split_word(rest);
    required(first, usage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(content: &str) -> Option<Result<Command, ParseError>> {
        parse_command("!", content)
    }

    #[test]
    fn test_non_commands_are_skipped() {
        assert_eq!(parse("hello there"), None);
        assert_eq!(parse("!"), None);
        assert_eq!(parse("! "), None);
    }

    #[test]
    fn test_play_takes_rest_of_line() {
        assert_eq!(
            parse("!play  never gonna give you up "),
            Some(Ok(Command::Play("never gonna give you up".into())))
        );
        assert_eq!(parse("!play"), Some(Err(ParseError::Usage("play <url or search phrase>"))));
    }

    #[test]
    fn test_verbs_are_case_insensitive() {
        assert_eq!(parse("!SKIP"), Some(Ok(Command::Skip)));
        assert_eq!(parse("!queue_show"), Some(Ok(Command::Queue)));
    }

    #[test]
    fn test_loop_arguments() {
        assert_eq!(parse("!loop"), Some(Ok(Command::Loop(LoopMode::Off))));
        assert_eq!(parse("!loop song"), Some(Ok(Command::Loop(LoopMode::Song))));
        assert_eq!(parse("!loop QUEUE"), Some(Ok(Command::Loop(LoopMode::Queue))));
        assert_eq!(parse("!loop none"), Some(Ok(Command::Loop(LoopMode::Off))));
        assert!(matches!(parse("!loop forever"), Some(Err(ParseError::Usage(_)))));
    }

    #[test]
    fn test_playlist_arguments() {
        assert_eq!(
            parse("!playlist_add chill lofi hip hop radio"),
            Some(Ok(Command::PlaylistAdd {
                name: "chill".into(),
                query: "lofi hip hop radio".into()
            }))
        );
        assert_eq!(
            parse("!playlist_remove chill lofi hip hop radio"),
            Some(Ok(Command::PlaylistRemove {
                name: "chill".into(),
                query: "lofi hip hop radio".into()
            }))
        );
        assert_eq!(parse("!playlist_show chill extra"), Some(Ok(Command::PlaylistShow("chill".into()))));
        assert!(matches!(parse("!playlist_add chill"), Some(Err(ParseError::Usage(_)))));
        assert!(matches!(parse("!playlist_play"), Some(Err(ParseError::Usage(_)))));
    }

    #[test]
    fn test_unknown_verb() {
        assert_eq!(parse("!dance"), Some(Err(ParseError::Unknown("dance".into()))));
    }

    #[test]
    fn test_custom_prefix() {
        assert_eq!(parse_command("?", "?now"), Some(Ok(Command::Now)));
        assert_eq!(parse_command("?", "!now"), None);
    }
}
