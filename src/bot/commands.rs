use lazy_static::lazy_static;
use regex::Regex;
use strum::{AsRefStr, Display, EnumString};

lazy_static! {
    static ref COMMAND: Regex =
        Regex::new(r"(?s)^!(eval|exec)(?:@(\w+))?(?:\s+(.*))?$").expect("command pattern");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum CommandKind {
    /// Evaluate an expression and reply with its value.
    Eval,
    /// Run a block and reply with what it printed.
    Exec,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdminCommand {
    pub kind: CommandKind,
    pub source: String,
}

impl AdminCommand {
    /// Recognizes `!eval <source>` and `!exec <source>`, optionally addressed
    /// as `!eval@name`. Commands addressed to a different bot are not ours.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let captures = COMMAND.captures(text.trim_start())?;
        if let (Some(addressed), Some(own)) = (captures.get(2), bot_username) {
            if !addressed.as_str().eq_ignore_ascii_case(own) {
                return None;
            }
        }
        let kind = captures.get(1)?.as_str().parse().ok()?;
        let source = captures
            .get(3)
            .map_or("", |source| source.as_str())
            .to_string();
        Some(Self { kind, source })
    }
}
