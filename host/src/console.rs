//! Line commands understood by the simulator's stdin console.

use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Focus(usize),
    Blur(usize),
    Play(usize, String),
    Stop(usize),
    Clear(usize),
    Open,
    Close(usize),
    /// Save a setting; tabs opened afterwards use the new value.
    Set(String, String),
    Settings,
    Status,
    Quit,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

impl FromStr for ConsoleCommand {
    type Err = ConsoleError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(ConsoleError::Empty)?;
        let tab = |usage: &'static str, w: Option<&str>| -> Result<usize, ConsoleError> {
            w.and_then(|n| n.parse().ok()).ok_or(ConsoleError::Usage(usage))
        };

        let cmd = match verb.to_ascii_lowercase().as_str() {
            "focus" => Self::Focus(tab("focus <tab>", words.next())?),
            "blur" => Self::Blur(tab("blur <tab>", words.next())?),
            "play" => {
                let n = tab("play <tab> <resource>", words.next())?;
                let resource = words
                    .next()
                    .ok_or(ConsoleError::Usage("play <tab> <resource>"))?;
                Self::Play(n, resource.to_string())
            }
            "stop" => Self::Stop(tab("stop <tab>", words.next())?),
            "clear" => Self::Clear(tab("clear <tab>", words.next())?),
            "open" => Self::Open,
            "close" => Self::Close(tab("close <tab>", words.next())?),
            "set" => {
                let key = words.next().ok_or(ConsoleError::Usage("set <KEY> <value>"))?;
                // Values may contain spaces (paths); an empty value is allowed.
                let value = words.collect::<Vec<_>>().join(" ");
                Self::Set(key.to_ascii_uppercase(), value)
            }
            "settings" => Self::Settings,
            "status" => Self::Status,
            "quit" | "exit" => Self::Quit,
            other => return Err(ConsoleError::Unknown(other.to_string())),
        };
        Ok(cmd)
    }
}
