//! Interactive terminal chatbot.
//!
//! Keeps the conversation transcript in memory, sends the whole transcript
//! to Ollama on every turn, and prints a role/message summary table when the
//! user types `exit`.
//!
//! ```text
//! Welcome to panda chatbot.
//! About Me:
//!     Model: llama3:latest,Temperature: 0.5
//!     I am a Prompt Engineer
//! 🗣️ :hello
//! 🐼 : Hi! How can I help?
//! ```

use anyhow::Result;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::config::Config;
use crate::models::Message;
use crate::ollama::OllamaClient;

pub const PROMPT: &str = "🗣️ :";

const ROLE_WIDTH: usize = 15;
const MESSAGE_WIDTH: usize = 100;
const RULE_WIDTH: usize = 115;

/// Outcome of feeding one input line to a [`ChatSession`].
#[derive(Debug)]
pub enum Turn {
    /// The model answered; the reply is already in the transcript.
    Reply(String),
    /// The user typed `exit`.
    Exit,
    /// The completion call failed; the unanswered line was dropped.
    Failed(anyhow::Error),
}

pub struct ChatSession {
    client: OllamaClient,
    transcript: Vec<Message>,
}

impl ChatSession {
    /// Start a session whose transcript begins with the system message.
    pub fn new(client: OllamaClient, system_message: &str) -> Self {
        Self {
            client,
            transcript: vec![Message::system(system_message)],
        }
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn welcome(&self) -> String {
        let system = self
            .transcript
            .first()
            .map(|m| m.content.as_str())
            .unwrap_or("");
        format!(
            "Welcome to panda chatbot.\nAbout Me:\n\tModel: {},Temperature: {:?}\n\t{}\n",
            self.client.model(),
            self.client.temperature(),
            system
        )
    }

    /// Record `line` and, unless it is `exit`, ask the model for a reply.
    ///
    /// The `exit` line stays in the transcript so it shows in the summary.
    pub async fn handle_line(&mut self, line: &str) -> Turn {
        self.transcript.push(Message::human(line));

        if line.trim().to_lowercase() == "exit" {
            return Turn::Exit;
        }

        match self.client.chat(&self.transcript).await {
            Ok(reply) => {
                self.transcript.push(Message::ai(reply.clone()));
                Turn::Reply(reply)
            }
            Err(e) => {
                self.transcript.pop();
                tracing::warn!(error = %e, "chat completion failed");
                Turn::Failed(e)
            }
        }
    }
}

pub fn exit_message() -> String {
    format!("\n🐼 {}", "Nice Talking with you. bye bye ! ".italic())
}

/// Render the conversation as a fixed-width `Role | Message` table.
pub fn render_summary(messages: &[Message]) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = Vec::new();

    out.push(String::new());
    out.push(rule.clone());
    out.push(format!(
        "{:<rw$}| {:<mw$}",
        "Role",
        "Message",
        rw = ROLE_WIDTH,
        mw = MESSAGE_WIDTH
    ));
    out.push(rule.clone());

    for message in messages {
        let lines = wrap(&message.content, MESSAGE_WIDTH);
        let mut iter = lines.iter();
        if let Some(first) = iter.next() {
            out.push(format!(
                "{:<rw$}| {:<mw$}",
                message.role.label(),
                first,
                rw = ROLE_WIDTH,
                mw = MESSAGE_WIDTH
            ));
        }
        for line in iter {
            out.push(format!(
                "{:<rw$}| {:<mw$}",
                "",
                line,
                rw = ROLE_WIDTH,
                mw = MESSAGE_WIDTH
            ));
        }
    }

    out.push(rule);
    out.join("\n")
}

/// Greedy word wrap to `width` columns.
///
/// Runs of whitespace collapse to a single space and words longer than
/// `width` are broken across lines. Always returns at least one line.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if line_len == 0 && word_len <= width {
            line.push_str(word);
            line_len = word_len;
            continue;
        }
        if line_len > 0 && line_len + 1 + word_len <= width {
            line.push(' ');
            line.push_str(word);
            line_len += 1 + word_len;
            continue;
        }
        if word_len <= width {
            lines.push(std::mem::take(&mut line));
            line.push_str(word);
            line_len = word_len;
            continue;
        }

        // Over-long word: fill the current line, then emit full-width slices.
        let mut rest = word;
        if line_len > 0 {
            let room = width.saturating_sub(line_len + 1);
            if room > 0 {
                let (head, tail) = split_at_char(rest, room);
                line.push(' ');
                line.push_str(head);
                rest = tail;
            }
            lines.push(std::mem::take(&mut line));
        }
        while rest.chars().count() > width {
            let (head, tail) = split_at_char(rest, width);
            lines.push(head.to_string());
            rest = tail;
        }
        line.push_str(rest);
        line_len = rest.chars().count();
    }

    if !line.is_empty() || lines.is_empty() {
        lines.push(line);
    }
    lines
}

fn split_at_char(s: &str, n: usize) -> (&str, &str) {
    let idx = s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len());
    s.split_at(idx)
}

/// CLI entry point for `panda chat`.
pub async fn run_chat(config: &Config) -> Result<()> {
    let client = OllamaClient::new(&config.ollama)?;
    let mut session = ChatSession::new(client, &config.ollama.system_message);
    print!("{}", session.welcome());

    let mut editor = DefaultEditor::new()?;

    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("{}", exit_message());
                break;
            }
            Err(e) => return Err(e.into()),
        };
        let _ = editor.add_history_entry(line.as_str());

        match session.handle_line(&line).await {
            Turn::Exit => {
                println!("Here is the summary of our conversation:");
                println!("{}", render_summary(session.transcript()));
                println!("{}", exit_message());
                break;
            }
            Turn::Reply(reply) => {
                println!("🐼 : {}", reply);
                println!("\n");
            }
            Turn::Failed(e) => println!("Error: {:#}", e),
        }
    }

    Ok(())
}
