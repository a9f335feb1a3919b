//! crates/tutor_core/src/tutor.rs
//!
//! The conversation orchestrator. Each chat session owns a `SessionContext`;
//! the `Tutor` itself is shared and holds no per-session state.

use crate::accounts::Accounts;
use crate::commands::Command;
use crate::domain::{DifficultyLevel, LearningStyle, Persona, UserUpdate};
use crate::knowledge::{IngestError, KnowledgeBase, DEFAULT_TOP_K};
use crate::ports::{LanguageModelService, TextStream};
use crate::prompts::{PromptRequest, PromptTemplates};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shown to the user whenever answering fails. Never carries error detail.
pub const RETRY_MESSAGE: &str =
    "Sorry, something went wrong while answering. Please try again later or rephrase your question.";

/// Mutable state of one chat session. Not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub username: String,
    pub persona: Persona,
    pub learning_style: Option<LearningStyle>,
    pub difficulty: DifficultyLevel,
    pub interaction_count: u64,
}

impl SessionContext {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            persona: Persona::default(),
            learning_style: None,
            difficulty: DifficultyLevel::default(),
            interaction_count: 0,
        }
    }
}

/// A fresh session plus the messages to show when it opens.
pub struct SessionOpening {
    pub session: SessionContext,
    pub messages: Vec<String>,
}

pub enum Reply {
    /// A direct message: command confirmations, reports and failures.
    Notice(String),
    /// A model answer, delivered incrementally.
    Answer {
        prompt: PromptRequest,
        stream: TextStream,
    },
}

pub struct Tutor {
    accounts: Accounts,
    knowledge: Arc<KnowledgeBase>,
    llm: Arc<dyn LanguageModelService>,
    templates: PromptTemplates,
    top_k: usize,
}

impl Tutor {
    pub fn new(
        accounts: Accounts,
        knowledge: Arc<KnowledgeBase>,
        llm: Arc<dyn LanguageModelService>,
        templates: PromptTemplates,
    ) -> Self {
        Self {
            accounts,
            knowledge,
            llm,
            templates,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    /// Starts a session for `username`: greets, builds the index on first use,
    /// and lists the available commands.
    pub async fn open_session(&self, username: &str) -> SessionOpening {
        let mut session = SessionContext::new(username);
        match self.accounts.get(username).await {
            Ok(Some(user)) => session.learning_style = user.learning_style,
            Ok(None) => warn!("Opening a session for unknown user {}", username),
            Err(e) => error!("Could not load profile for {}: {}", username, e),
        }

        let mut messages = vec![format!("Welcome, {}!", username)];
        if let Some(result) = self.knowledge.ensure_built().await {
            messages.push("Loading course content...".to_string());
            messages.push(match result {
                Ok(_) => "Course content loaded!".to_string(),
                Err(e) => {
                    warn!("Initial ingestion failed: {}", e);
                    "Course content could not be loaded, but you can still use the basic features."
                        .to_string()
                }
            });
        }
        messages.push(help_text(session.persona));
        SessionOpening { session, messages }
    }

    /// Handles one inbound message. Commands are answered directly; anything
    /// else is answered by the language model with retrieved course context.
    pub async fn handle_message(&self, session: &mut SessionContext, message: &str) -> Reply {
        if let Some(command) = Command::parse(message) {
            return Reply::Notice(self.run_command(session, command).await);
        }
        let message = message.trim();
        if message.is_empty() {
            return Reply::Notice("Please type a question or a topic to discuss.".to_string());
        }

        session.interaction_count += 1;
        let prompt = self.prepare_prompt(session, message).await;
        match self.llm.complete_streaming(&prompt.text).await {
            Ok(stream) => Reply::Answer { prompt, stream },
            Err(e) => {
                error!("Language model call failed for {}: {}", session.username, e);
                Reply::Notice(RETRY_MESSAGE.to_string())
            }
        }
    }

    /// Like `handle_message`, but waits for the whole answer.
    pub async fn respond(&self, session: &mut SessionContext, message: &str) -> String {
        match self.handle_message(session, message).await {
            Reply::Notice(text) => text,
            Reply::Answer { mut stream, .. } => {
                let mut answer = String::new();
                while let Some(piece) = stream.next().await {
                    match piece {
                        Ok(text) => answer.push_str(&text),
                        Err(e) => {
                            error!("Language model stream failed for {}: {}", session.username, e);
                            return RETRY_MESSAGE.to_string();
                        }
                    }
                }
                answer
            }
        }
    }

    /// Retrieves context for `message` and fills the active persona's template.
    pub async fn prepare_prompt(&self, session: &SessionContext, message: &str) -> PromptRequest {
        let hits = self.knowledge.query(message, self.top_k).await;
        let context = hits
            .iter()
            .map(|hit| hit.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        self.templates.build(session.persona, message, &context)
    }

    async fn run_command(&self, session: &mut SessionContext, command: Command) -> String {
        match command {
            Command::Teacher => {
                session.persona = Persona::Teacher;
                "Switched to teacher mode. I'm Professor AI, how can I help you?".to_string()
            }
            Command::Student => {
                session.persona = Persona::Student;
                "Switched to virtual student mode. I'm Student AI, glad to learn with you!".to_string()
            }
            Command::Reload => match self.knowledge.rebuild().await {
                Ok(report) => {
                    info!("{} reloaded the course content", session.username);
                    format!(
                        "Course content reloaded: {} passages from {} documents.",
                        report.entries, report.documents
                    )
                }
                Err(e) => {
                    warn!("Reload requested by {} failed: {}", session.username, e);
                    reload_failure(&e)
                }
            },
            Command::Style(style) => {
                session.learning_style = Some(style);
                let update = UserUpdate {
                    learning_style: Some(style),
                    ..Default::default()
                };
                match self.accounts.update(&session.username, update).await {
                    Ok(_) => format!("Your learning style is now: {}", style),
                    Err(e) => {
                        error!("Could not persist learning style for {}: {}", session.username, e);
                        format!(
                            "Your learning style is now {} for this session, but it could not be saved.",
                            style
                        )
                    }
                }
            }
            Command::InvalidStyle(value) => {
                let choices = LearningStyle::ALL
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                match value {
                    Some(value) => format!(
                        "Unknown learning style '{}'. Use /style followed by one of: {}.",
                        value, choices
                    ),
                    None => format!("Usage: /style followed by one of: {}.", choices),
                }
            }
            Command::Progress => {
                let stored_style = match self.accounts.get(&session.username).await {
                    Ok(Some(user)) => user.learning_style,
                    Ok(None) => None,
                    Err(e) => {
                        error!("Could not load profile for {}: {}", session.username, e);
                        session.learning_style
                    }
                };
                format!(
                    "Learning progress report:\n- Learning style: {}\n- Difficulty level: {}\n- Interactions: {}",
                    stored_style.map(|s| s.as_str()).unwrap_or("not set"),
                    session.difficulty.as_str(),
                    session.interaction_count
                )
            }
        }
    }
}

fn reload_failure(err: &IngestError) -> String {
    match err {
        IngestError::NoDocuments => {
            "Course content reload failed: no course documents were found.".to_string()
        }
        _ => "Course content reload failed.".to_string(),
    }
}

/// The command overview shown when a session opens.
pub fn help_text(persona: Persona) -> String {
    format!(
        "Welcome to the AI teaching assistant!\n\n\
         You can:\n\
         1. Ask me any course-related question\n\
         2. Ask me to summarise key points\n\
         3. Discuss what you have learned\n\
         4. Study and discuss with a virtual student\n\n\
         Commands:\n\
         - /teacher - switch to the AI teaching assistant\n\
         - /student - switch to the virtual student\n\
         - /reload - reload the course content\n\
         - /style [visual/logical/practical] - set your learning style\n\
         - /progress - show your learning progress report\n\n\
         Current mode: {}",
        persona.display_name()
    )
}
