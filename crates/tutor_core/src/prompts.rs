//! crates/tutor_core/src/prompts.rs
//!
//! Persona prompt templates and their rendering. A template is static text with
//! two slots: the persona's message slot (`{question}` for the teacher,
//! `{topic}` for the student) and `{context}`.

use crate::domain::Persona;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

const TEACHER_TEMPLATE: &str = r#"You are a professional AI teaching assistant named Professor AI.
Your responsibilities are to:
1. Answer students' course-related questions
2. Summarise key points
3. Help organise the course material
4. Adjust the depth of your answers to the student's level

Current question: {question}

Relevant course material: {context}

Answering rules:
1. Reply in the language the student used
2. Be professional, friendly and concrete
3. If the question is unclear, politely ask the student for more information
4. Use examples or analogies where they help understanding
5. You may finish with a follow-up question to think about
6. Prefer the provided course material when answering"#;

const STUDENT_TEMPLATE: &str = r#"You are an eager virtual classmate named Student AI.
Your traits:
1. You like to ask probing questions
2. You share your own thoughts openly
3. You enjoy discussing with other students
4. You are good at giving examples

Discussion topic: {topic}

Relevant course material: {context}

Response rules:
1. Reply in the language the other student used
2. Respond as a student, not as a teacher
3. Show curiosity and enthusiasm for learning
4. Raise related questions or your own ideas
5. Share your own learning experience
6. Quote the course material to support your points"#;

impl Persona {
    /// Name of the slot that receives the user's message.
    pub fn message_slot(&self) -> &'static str {
        match self {
            Persona::Teacher => "question",
            Persona::Student => "topic",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Persona::Teacher => "AI teaching assistant",
            Persona::Student => "virtual student",
        }
    }

    fn file_name(&self) -> &'static str {
        match self {
            Persona::Teacher => "teacher.txt",
            Persona::Student => "student.txt",
        }
    }
}

/// A fully assembled prompt for one message turn.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRequest {
    pub persona: Persona,
    pub message: String,
    pub context: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplates {
    teacher: String,
    student: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            teacher: TEACHER_TEMPLATE.to_string(),
            student: STUDENT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Loads `teacher.txt` and `student.txt` from `dir`, falling back to the
    /// built-in template for any file that is missing or lacks its slots.
    pub fn load(dir: &Path) -> Self {
        let mut templates = Self::default();
        for persona in [Persona::Teacher, Persona::Student] {
            let path = dir.join(persona.file_name());
            let Ok(text) = fs::read_to_string(&path) else {
                continue;
            };
            match templates.set(persona, text) {
                Ok(()) => info!("Loaded {:?} template from {}", persona, path.display()),
                Err(e) => warn!("Ignoring template {}: {}", path.display(), e),
            }
        }
        templates
    }

    /// Replaces the template for `persona` after checking its slots.
    pub fn set(&mut self, persona: Persona, template: String) -> Result<(), String> {
        for slot in [persona.message_slot(), "context"] {
            if !template.contains(&format!("{{{}}}", slot)) {
                return Err(format!("template is missing the {{{}}} slot", slot));
            }
        }
        match persona {
            Persona::Teacher => self.teacher = template,
            Persona::Student => self.student = template,
        }
        Ok(())
    }

    pub fn template(&self, persona: Persona) -> &str {
        match persona {
            Persona::Teacher => &self.teacher,
            Persona::Student => &self.student,
        }
    }

    pub fn build(&self, persona: Persona, message: &str, context: &str) -> PromptRequest {
        let text = render(
            self.template(persona),
            &[(persona.message_slot(), message), ("context", context)],
        );
        PromptRequest {
            persona,
            message: message.to_string(),
            context: context.to_string(),
            text,
        }
    }
}

/// Single-pass substitution, so slot markers inside substituted values stay literal.
fn render(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let name = &after[..close];
            slots
                .iter()
                .find(|(slot, _)| *slot == name)
                .map(|(_, value)| (*value, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn teacher_prompt_fills_question_and_context() {
        let templates = PromptTemplates::default();
        let prompt = templates.build(Persona::Teacher, "When is the deadline?", "The deadline is Friday");
        assert!(prompt.text.contains("Current question: When is the deadline?"));
        assert!(prompt.text.contains("Relevant course material: The deadline is Friday"));
        assert!(prompt.text.contains("Professor AI"));
        assert!(!prompt.text.contains("{question}"));
    }

    #[test]
    fn student_prompt_uses_topic_slot() {
        let prompt = PromptTemplates::default().build(Persona::Student, "recursion", "ctx");
        assert!(prompt.text.contains("Discussion topic: recursion"));
        assert!(prompt.text.contains("Student AI"));
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let out = render("Q: {question} C: {context}", &[("question", "{context}"), ("context", "x")]);
        assert_eq!(out, "Q: {context} C: x");
        assert_eq!(render("keep {braces} and {", &[]), "keep {braces} and {");
    }

    #[test]
    fn set_rejects_templates_without_slots() {
        let mut templates = PromptTemplates::default();
        assert!(templates.set(Persona::Student, "no slots".to_string()).is_err());
        assert!(templates
            .set(Persona::Student, "Topic {topic} / {context}".to_string())
            .is_ok());
        assert_eq!(templates.template(Persona::Student), "Topic {topic} / {context}");
    }

    #[test]
    fn load_from_missing_directory_keeps_builtins() {
        let templates = PromptTemplates::load(&PathBuf::from("/nonexistent/prompts"));
        assert_eq!(templates, PromptTemplates::default());
    }
}
