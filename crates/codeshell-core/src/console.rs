//! Terminal console: turns a line of text into transcript output.
//!
//! The console never returns an error to its host. Every failure of a
//! delegated command (missing language, runner error, non-zero exit) ends up
//! as transcript text.

use std::ops::Range;

use tracing::debug;

use crate::commands::{CommandRegistry, Operation};
use crate::config::ProjectConfig;
use crate::runner::{ProcessRunner, RunOutput, RunnerError};
use crate::task::{render_task_line, NewTask, Status, Task, TaskPatch};
use crate::task_store::TaskStore;

const HELP: &[&str] = &[
    "Available commands:",
    "  help                 Show this help",
    "  clear                Clear the console",
    "  pwd                  Print the current directory",
    "  cd <path>            Change directory (., .. or a sub-directory)",
    "  ls [args]            List files in the current directory",
    "  build <language>     Build the project",
    "  run <language>       Run the project",
    "  test <language>      Run the test suite",
    "  lint <language>      Lint the project",
    "  format <language>    Format the sources",
    "  task <subcommand>    Manage tasks (add, list, show, status, done, rm, search, stats)",
    "  version              Show version information",
    "Anything else is executed as an external command.",
];

const TASK_USAGE: &str =
    "Usage: task add <title> | list | show <id> | status <id> <status> | done <id> | rm <id> | search <query> | stats";

pub fn prompt(cwd: &str) -> String {
    format!("{cwd} $ ")
}

/// `cd` as pure string manipulation: `.` stays, `..` drops the last segment,
/// anything else is appended with its surrounding separators trimmed.
pub fn navigate(cwd: &str, target: &str) -> String {
    let is_sep = |c: char| c == '/' || c == '\\';
    match target {
        "." => cwd.to_string(),
        ".." => {
            let trimmed = cwd.trim_end_matches(is_sep);
            if trimmed.is_empty() {
                return cwd.to_string();
            }
            match trimmed.rfind(is_sep) {
                Some(0) => trimmed[..1].to_string(),
                Some(idx) => trimmed[..idx].to_string(),
                None => cwd.to_string(),
            }
        }
        segment => {
            let segment = segment.trim_matches(is_sep);
            if segment.is_empty() {
                cwd.to_string()
            } else if cwd.is_empty() || cwd.ends_with(is_sep) {
                format!("{cwd}{segment}")
            } else {
                format!("{cwd}/{segment}")
            }
        }
    }
}

/// One tokenized input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Lowercased first token.
    pub name: String,
    /// First token as typed, used when the line falls through to the runner.
    pub program: String,
    pub args: Vec<String>,
}

impl ParsedCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        let program = tokens.next()?.to_string();
        Some(Self {
            name: program.to_lowercase(),
            program,
            args: tokens.map(String::from).collect(),
        })
    }
}

/// Append-only list of console lines; the last line is always the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    lines: Vec<String>,
}

impl Transcript {
    pub fn new(cwd: &str) -> Self {
        Self {
            lines: vec![prompt(cwd)],
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Appends captured process text line by line, ignoring a trailing newline.
    fn push_text(&mut self, text: &str) {
        let text = text.trim_end_matches(['\r', '\n']);
        if text.is_empty() {
            return;
        }
        self.lines.extend(text.lines().map(String::from));
    }

    /// Writes the submitted input after the current prompt.
    fn echo(&mut self, cwd: &str, input: &str) {
        let prompt = prompt(cwd);
        match self.lines.last_mut() {
            Some(last) if *last == prompt => last.push_str(input),
            _ => self.lines.push(format!("{prompt}{input}")),
        }
    }

    fn reset(&mut self, cwd: &str) {
        self.lines.clear();
        self.lines.push(prompt(cwd));
    }
}

/// What a call to [`Console::execute`] did to the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Execution {
    /// Blank input; nothing changed.
    Skipped,
    /// The transcript was reset.
    Cleared,
    /// Output was appended; the range covers the new lines up to, but not
    /// including, the fresh prompt.
    Appended(Range<usize>),
}

pub struct Console<'a, R> {
    registry: &'a CommandRegistry,
    project: Option<&'a ProjectConfig>,
    runner: R,
    tasks: TaskStore,
    transcript: Transcript,
    cwd: String,
    input: String,
}

impl<'a, R: ProcessRunner> Console<'a, R> {
    pub fn new(registry: &'a CommandRegistry, runner: R, cwd: impl Into<String>) -> Self {
        let cwd = cwd.into();
        Self {
            registry,
            project: None,
            runner,
            tasks: TaskStore::new(),
            transcript: Transcript::new(&cwd),
            cwd,
            input: String::new(),
        }
    }

    /// Per-project command overrides take precedence over the registry.
    pub fn with_project(mut self, project: &'a ProjectConfig) -> Self {
        self.project = Some(project);
        self
    }

    pub fn with_tasks(mut self, tasks: TaskStore) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    pub fn tasks(&self) -> &TaskStore {
        &self.tasks
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn type_input(&mut self, text: &str) {
        self.input.push_str(text);
    }

    /// Executes the pending input buffer.
    pub fn submit(&mut self) -> Execution {
        let line = std::mem::take(&mut self.input);
        self.execute(&line)
    }

    pub fn execute(&mut self, raw: &str) -> Execution {
        let Some(command) = ParsedCommand::parse(raw) else {
            return Execution::Skipped;
        };
        debug!(command = %command.name, args = ?command.args, cwd = %self.cwd, "console command");

        if command.name == "clear" {
            self.transcript.reset(&self.cwd);
            self.input.clear();
            return Execution::Cleared;
        }

        self.transcript.echo(&self.cwd, raw.trim());
        let start = self.transcript.len();
        match command.name.as_str() {
            "help" => HELP.iter().for_each(|line| self.transcript.push(*line)),
            "pwd" => self.transcript.push(self.cwd.clone()),
            "cd" => self.change_directory(command.args.first().map(String::as_str)),
            "version" => self
                .transcript
                .push(format!("codeshell {}", crate::version())),
            "ls" => self.list_directory(&command.args),
            "task" | "tasks" => self.task_command(&command.args),
            name => match Operation::from_name(name) {
                Some(operation) => {
                    self.project_command(operation, command.args.first().map(String::as_str))
                }
                None => self.external_command(&command),
            },
        }
        self.transcript.push("");
        let end = self.transcript.len();
        self.transcript.push(prompt(&self.cwd));
        self.input.clear();
        Execution::Appended(start..end)
    }

    fn change_directory(&mut self, target: Option<&str>) {
        match target {
            Some(target) => self.cwd = navigate(&self.cwd, target),
            None => self.transcript.push("Usage: cd <path>"),
        }
    }

    fn list_directory(&mut self, args: &[String]) {
        let (program, mut list_args) = if cfg!(windows) {
            ("cmd", vec!["/C".to_string(), "dir".to_string()])
        } else {
            ("ls", Vec::new())
        };
        list_args.extend(args.iter().cloned());
        let result = self.runner.run(program, &list_args, &self.cwd);
        self.render_outcome("List", result);
    }

    fn project_command(&mut self, operation: Operation, language: Option<&str>) {
        let Some(language) = language else {
            self.transcript
                .push(format!("Usage: {operation} <language>"));
            return;
        };
        let Some(invocation) = self
            .registry
            .resolve_with(operation, language, self.project)
        else {
            self.transcript.push(format!(
                "Unsupported language for {operation}: {language}"
            ));
            return;
        };

        self.transcript.push(format!(
            "{} {language} project...",
            operation.progressive()
        ));
        let result = self
            .runner
            .run(&invocation.program, &invocation.args, &self.cwd);
        self.render_outcome(operation.label(), result);
    }

    fn render_outcome(&mut self, label: &str, result: Result<RunOutput, RunnerError>) {
        match result {
            Ok(out) if out.success => {
                self.transcript.push(format!("✓ {label} succeeded"));
                self.transcript.push_text(&out.output);
            }
            Ok(out) => {
                self.transcript.push(format!("✗ {label} failed"));
                self.transcript.push_text(&out.error);
            }
            Err(err) => self.render_error(&err),
        }
    }

    fn render_error(&mut self, err: &RunnerError) {
        debug!(error = %err, "runner error");
        self.transcript.push(format!("Error: {err}"));
    }

    fn external_command(&mut self, command: &ParsedCommand) {
        match self.runner.run(&command.program, &command.args, &self.cwd) {
            Ok(out) if out.success => self.transcript.push_text(&out.output),
            Ok(out) => {
                self.transcript.push_text(&out.error);
                self.command_not_found(&command.program);
            }
            Err(err) => {
                debug!(error = %err, "external command failed");
                self.command_not_found(&command.program);
            }
        }
    }

    fn command_not_found(&mut self, program: &str) {
        self.transcript
            .push(format!("Command not found: {program}"));
        self.transcript
            .push("Type 'help' for available commands");
    }

    fn task_command(&mut self, args: &[String]) {
        let Some((sub, rest)) = args.split_first() else {
            self.transcript.push(TASK_USAGE);
            return;
        };
        match (sub.to_lowercase().as_str(), rest) {
            ("add", title) => match self.tasks.create(NewTask::titled(title.join(" "))) {
                Ok(task) => self
                    .transcript
                    .push(format!("Created {}: {}", task.id, task.title)),
                Err(err) => self.transcript.push(format!("Error: {err}")),
            },
            ("list" | "ls", []) => {
                let tasks = self.tasks.list();
                if tasks.is_empty() {
                    self.transcript.push("No tasks");
                }
                for task in &tasks {
                    self.transcript.push(render_task_line(task));
                }
            }
            ("show", [id]) => match self.tasks.get(id).cloned() {
                Some(task) => self.render_task_details(&task),
                None => self.task_not_found(id),
            },
            ("status", [id, status]) => match status.parse::<Status>() {
                Ok(status) => self.set_status(id, status),
                Err(err) => self.transcript.push(format!("Error: {err}")),
            },
            ("done", [id]) => self.set_status(id, Status::Done),
            ("rm" | "delete", [id]) => {
                if self.tasks.delete(id) {
                    self.transcript.push(format!("Deleted {id}"));
                } else {
                    self.task_not_found(id);
                }
            }
            ("search", query) if !query.is_empty() => {
                let lines: Vec<String> = self
                    .tasks
                    .search(&query.join(" "))
                    .into_iter()
                    .map(render_task_line)
                    .collect();
                if lines.is_empty() {
                    self.transcript.push("No matching tasks");
                }
                lines.into_iter().for_each(|line| self.transcript.push(line));
            }
            ("stats", []) => {
                let stats = self.tasks.statistics();
                self.transcript.push(format!(
                    "Total: {} | Completed: {} | In progress: {} | Overdue: {} | Completion: {:.1}%",
                    stats.total,
                    stats.completed,
                    stats.in_progress,
                    stats.overdue,
                    stats.completion_rate
                ));
            }
            _ => self.transcript.push(TASK_USAGE),
        }
    }

    fn set_status(&mut self, id: &str, status: Status) {
        match self.tasks.update(id, TaskPatch::status(status)) {
            Ok(Some(task)) => self
                .transcript
                .push(format!("Updated {}: {}", task.id, task.status)),
            Ok(None) => self.task_not_found(id),
            Err(err) => self.transcript.push(format!("Error: {err}")),
        }
    }

    fn task_not_found(&mut self, id: &str) {
        self.transcript.push(format!("Task not found: {id}"));
    }

    fn render_task_details(&mut self, task: &Task) {
        self.transcript.push(format!("{}: {}", task.id, task.title));
        self.transcript.push(format!("  status:   {}", task.status));
        self.transcript
            .push(format!("  priority: {}", task.priority));
        if !task.description.is_empty() {
            self.transcript
                .push(format!("  description: {}", task.description));
        }
        if let Some(due) = task.due_date {
            self.transcript
                .push(format!("  due:      {}", due.format("%Y-%m-%d %H:%M")));
        }
        if !task.tags.is_empty() {
            self.transcript
                .push(format!("  tags:     {}", task.tags.join(", ")));
        }
        if let Some(assignee) = task.assignee.as_deref() {
            self.transcript.push(format!("  assignee: {assignee}"));
        }
        self.transcript.push(format!(
            "  created:  {}",
            task.created_at.format("%Y-%m-%d %H:%M")
        ));
    }
}
