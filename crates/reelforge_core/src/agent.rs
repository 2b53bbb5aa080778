//! Argument grammars for the supported command-line agents.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Known agent CLIs, each with its own argument grammar.
///
/// # Examples
///
/// ```
/// use reelforge_core::CommandPreset;
///
/// assert_eq!(CommandPreset::from_command("codex"), CommandPreset::Codex);
/// assert_eq!(
///     CommandPreset::from_command("llm"),
///     CommandPreset::Custom("llm".to_string())
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandPreset {
    /// `codex exec ... -- -`, prompt on stdin, accepts images
    Codex,
    /// `gemini [--model m]`, prompt on stdin
    Gemini,
    /// `agent -p [--model m] <prompt>`, nothing on stdin
    Agent,
    /// Any other executable: no arguments, prompt on stdin
    Custom(String),
}

impl CommandPreset {
    /// Presets reported by the diagnostics endpoint.
    pub const KNOWN: [CommandPreset; 3] = [CommandPreset::Codex, CommandPreset::Gemini, CommandPreset::Agent];

    /// Select the preset for a `command` field.
    pub fn from_command(command: &str) -> Self {
        match command.trim() {
            "codex" => CommandPreset::Codex,
            "gemini" => CommandPreset::Gemini,
            "agent" => CommandPreset::Agent,
            other => CommandPreset::Custom(other.to_string()),
        }
    }

    /// The executable name looked up on `PATH`.
    pub fn command_name(&self) -> &str {
        match self {
            CommandPreset::Codex => "codex",
            CommandPreset::Gemini => "gemini",
            CommandPreset::Agent => "agent",
            CommandPreset::Custom(name) => name,
        }
    }

    /// Only codex takes image file arguments.
    pub fn accepts_images(&self) -> bool {
        matches!(self, CommandPreset::Codex)
    }
}

/// Whether a codex run starts fresh or resumes the most recent session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodexSession {
    /// Start a new session
    #[default]
    New,
    /// Append `resume --last`
    ResumeLast,
}

impl CodexSession {
    /// Parse the `codex_session` field. Anything but `resume_last` is a new session.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("resume_last") => CodexSession::ResumeLast,
            _ => CodexSession::New,
        }
    }
}

/// Validated settings for `provider=command`.
#[derive(Debug, Clone, PartialEq, Eq, derive_getters::Getters)]
pub struct CommandSettings {
    preset: CommandPreset,
    model: Option<String>,
    session: CodexSession,
}

impl CommandSettings {
    /// Create settings for a preset. `model` is the preset-specific model field.
    pub fn new(preset: CommandPreset, model: Option<String>, session: CodexSession) -> Self {
        Self {
            preset,
            model,
            session,
        }
    }

    /// Build the concrete invocation.
    ///
    /// `program` is the resolved executable (an override path or the bare
    /// command name); `images` are on-disk copies of the request attachments.
    ///
    /// # Examples
    ///
    /// ```
    /// use reelforge_core::{CodexSession, CommandPreset, CommandSettings};
    /// use std::path::PathBuf;
    ///
    /// let settings = CommandSettings::new(
    ///     CommandPreset::Codex,
    ///     Some("o4-mini".to_string()),
    ///     CodexSession::ResumeLast,
    /// );
    /// let plan = settings.plan("codex", "hello", &[PathBuf::from("/tmp/a.png")]);
    /// assert_eq!(
    ///     plan.args,
    ///     ["exec", "-m", "o4-mini", "--color", "never", "resume", "--last", "-i", "/tmp/a.png", "--", "-"]
    /// );
    /// assert_eq!(plan.stdin.as_deref(), Some("hello"));
    /// ```
    pub fn plan(&self, program: impl Into<String>, prompt: &str, images: &[PathBuf]) -> CommandPlan {
        let mut args: Vec<String> = Vec::new();
        let mut stdin = Some(prompt.to_string());

        match &self.preset {
            CommandPreset::Codex => {
                args.push("exec".into());
                if let Some(model) = &self.model {
                    args.extend(["-m".to_string(), model.clone()]);
                }
                args.extend(["--color".to_string(), "never".to_string()]);
                if self.session == CodexSession::ResumeLast {
                    args.extend(["resume".to_string(), "--last".to_string()]);
                }
                for image in images {
                    args.extend(["-i".to_string(), image.display().to_string()]);
                }
                args.extend(["--".to_string(), "-".to_string()]);
            }
            CommandPreset::Gemini => {
                if let Some(model) = &self.model {
                    args.extend(["--model".to_string(), model.clone()]);
                }
            }
            CommandPreset::Agent => {
                args.push("-p".into());
                if let Some(model) = &self.model {
                    args.extend(["--model".to_string(), model.clone()]);
                }
                args.push(prompt.to_string());
                stdin = None;
            }
            CommandPreset::Custom(_) => {}
        }

        CommandPlan {
            program: program.into(),
            args,
            stdin,
        }
    }
}

/// A fully-resolved agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPlan {
    /// Executable to spawn
    pub program: String,
    /// Argument vector
    pub args: Vec<String>,
    /// Bytes for standard input; `None` means stdin is closed immediately
    pub stdin: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codex_new_session_without_model() {
        let settings = CommandSettings::new(CommandPreset::Codex, None, CodexSession::New);
        let plan = settings.plan("codex", "write", &[]);
        assert_eq!(plan.args, ["exec", "--color", "never", "--", "-"]);
        assert_eq!(plan.stdin.as_deref(), Some("write"));
    }

    #[test]
    fn test_gemini_takes_model_flag() {
        let settings = CommandSettings::new(
            CommandPreset::Gemini,
            Some("gemini-2.5-pro".to_string()),
            CodexSession::New,
        );
        let plan = settings.plan("/opt/bin/gemini", "hi", &[]);
        assert_eq!(plan.program, "/opt/bin/gemini");
        assert_eq!(plan.args, ["--model", "gemini-2.5-pro"]);
        assert_eq!(plan.stdin.as_deref(), Some("hi"));
    }

    #[test]
    fn test_agent_takes_prompt_positionally() {
        let settings = CommandSettings::new(CommandPreset::Agent, None, CodexSession::ResumeLast);
        let plan = settings.plan("agent", "summarize this", &[]);
        assert_eq!(plan.args, ["-p", "summarize this"]);
        assert!(plan.stdin.is_none());
    }

    #[test]
    fn test_custom_command_gets_no_args() {
        let settings = CommandSettings::new(
            CommandPreset::from_command("llm"),
            Some("ignored".to_string()),
            CodexSession::New,
        );
        let plan = settings.plan("llm", "hi", &[]);
        assert!(plan.args.is_empty());
        assert_eq!(plan.stdin.as_deref(), Some("hi"));
    }

    #[test]
    fn test_session_parse() {
        assert_eq!(CodexSession::parse(Some("resume_last")), CodexSession::ResumeLast);
        assert_eq!(CodexSession::parse(Some("new")), CodexSession::New);
        assert_eq!(CodexSession::parse(None), CodexSession::New);
    }
}
