//! crates/tutor_core/src/commands.rs
//!
//! Slash-command recognition. Matching is case-insensitive against the whole
//! trimmed message; anything that is not a recognised command is a question.

use crate::domain::LearningStyle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Teacher,
    Student,
    Reload,
    Progress,
    Style(LearningStyle),
    /// `/style` with a missing or unknown value. Carries the raw value, if any.
    InvalidStyle(Option<String>),
}

impl Command {
    pub fn parse(message: &str) -> Option<Command> {
        let lowered = message.trim().to_lowercase();
        match lowered.as_str() {
            "/teacher" => return Some(Command::Teacher),
            "/student" => return Some(Command::Student),
            "/reload" => return Some(Command::Reload),
            "/progress" => return Some(Command::Progress),
            _ => {}
        }

        let mut words = lowered.split_whitespace();
        if words.next() != Some("/style") {
            return None;
        }
        let args: Vec<&str> = words.collect();
        match args.as_slice() {
            [value] => Some(match value.parse::<LearningStyle>() {
                Ok(style) => Command::Style(style),
                Err(_) => Command::InvalidStyle(Some(value.to_string())),
            }),
            [] => Some(Command::InvalidStyle(None)),
            many => Some(Command::InvalidStyle(Some(many.join(" ")))),
        }
    }
}
