use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::ProjectConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Build,
    Run,
    Test,
    Lint,
    Format,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Build,
        Operation::Run,
        Operation::Test,
        Operation::Lint,
        Operation::Format,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Operation::ALL
            .into_iter()
            .find(|operation| operation.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Build => "build",
            Operation::Run => "run",
            Operation::Test => "test",
            Operation::Lint => "lint",
            Operation::Format => "format",
        }
    }

    /// Present participle used when announcing the operation.
    pub fn progressive(&self) -> &'static str {
        match self {
            Operation::Build => "Building",
            Operation::Run => "Running",
            Operation::Test => "Testing",
            Operation::Lint => "Linting",
            Operation::Format => "Formatting",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Operation::Build => "Build",
            Operation::Run => "Run",
            Operation::Test => "Tests",
            Operation::Lint => "Lint",
            Operation::Format => "Format",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A program plus its ordered arguments, ready for a [`crate::runner::ProcessRunner`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("Command line is empty")]
    Empty,
    #[error("Failed to split command line: {0}")]
    Split(#[from] shell_words::ParseError),
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits a shell-style command line (`npx prettier --write "src dir"`).
    pub fn parse(line: &str) -> Result<Self, InvocationError> {
        let mut words = shell_words::split(line)?.into_iter();
        let program = words.next().ok_or(InvocationError::Empty)?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    pub fn command_line(&self) -> String {
        shell_words::join(std::iter::once(&self.program).chain(self.args.iter()))
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

const BUILTIN: &[(Operation, &str, &str, &[&str])] = &[
    (Operation::Build, "rust", "cargo", &["build"]),
    (Operation::Run, "rust", "cargo", &["run"]),
    (Operation::Test, "rust", "cargo", &["test"]),
    (Operation::Lint, "rust", "cargo", &["clippy"]),
    (Operation::Format, "rust", "cargo", &["fmt"]),
    (Operation::Build, "typescript", "npx", &["tsc"]),
    (Operation::Run, "typescript", "npm", &["start"]),
    (Operation::Test, "typescript", "npm", &["test"]),
    (Operation::Lint, "typescript", "npx", &["eslint", "."]),
    (Operation::Format, "typescript", "npx", &["prettier", "--write", "."]),
    (Operation::Build, "javascript", "npm", &["run", "build"]),
    (Operation::Run, "javascript", "node", &["index.js"]),
    (Operation::Test, "javascript", "npm", &["test"]),
    (Operation::Lint, "javascript", "npx", &["eslint", "."]),
    (Operation::Format, "javascript", "npx", &["prettier", "--write", "."]),
    (Operation::Build, "python", "python", &["-m", "compileall", "."]),
    (Operation::Run, "python", "python", &["main.py"]),
    (Operation::Test, "python", "python", &["-m", "pytest"]),
    (Operation::Lint, "python", "python", &["-m", "flake8", "."]),
    (Operation::Format, "python", "python", &["-m", "black", "."]),
    (Operation::Build, "go", "go", &["build", "./..."]),
    (Operation::Run, "go", "go", &["run", "."]),
    (Operation::Test, "go", "go", &["test", "./..."]),
    (Operation::Lint, "go", "go", &["vet", "./..."]),
    (Operation::Format, "go", "gofmt", &["-w", "."]),
    (Operation::Build, "csharp", "dotnet", &["build"]),
    (Operation::Run, "csharp", "dotnet", &["run"]),
    (Operation::Test, "csharp", "dotnet", &["test"]),
    (Operation::Lint, "csharp", "dotnet", &["format", "--verify-no-changes"]),
    (Operation::Format, "csharp", "dotnet", &["format"]),
    (Operation::Build, "java", "mvn", &["compile"]),
    (Operation::Run, "java", "mvn", &["exec:java"]),
    (Operation::Test, "java", "mvn", &["test"]),
    (Operation::Build, "cpp", "cmake", &["--build", "build"]),
    (Operation::Test, "cpp", "ctest", &["--test-dir", "build"]),
];

/// Immutable (operation, language) -> invocation table.
///
/// Built once at startup and handed to the console by reference. Language
/// keys are stored lowercase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandRegistry {
    entries: BTreeMap<(Operation, String), Invocation>,
}

impl CommandRegistry {
    pub fn builtin() -> Self {
        BUILTIN
            .iter()
            .fold(Self::default(), |registry, (operation, language, program, args)| {
                registry.with_entry(
                    *operation,
                    language,
                    Invocation::new(*program, args.iter().copied()),
                )
            })
    }

    pub fn with_entry(mut self, operation: Operation, language: &str, invocation: Invocation) -> Self {
        self.entries
            .insert((operation, normalize_language(language)), invocation);
        self
    }

    pub fn resolve(&self, operation: Operation, language: &str) -> Option<&Invocation> {
        self.entries
            .get(&(operation, normalize_language(language)))
    }

    /// Project override first, then the table entry.
    ///
    /// An override that cannot be split into words is skipped with a warning.
    pub fn resolve_with(
        &self,
        operation: Operation,
        language: &str,
        project: Option<&ProjectConfig>,
    ) -> Option<Invocation> {
        if let Some(line) = project.and_then(|config| config.override_for(operation, language)) {
            match Invocation::parse(line) {
                Ok(invocation) => return Some(invocation),
                Err(err) => warn!(
                    operation = %operation,
                    language,
                    error = %err,
                    "ignoring unusable command override"
                ),
            }
        }
        self.resolve(operation, language).cloned()
    }

    pub fn entries(&self) -> impl Iterator<Item = (Operation, &str, &Invocation)> {
        self.entries
            .iter()
            .map(|((operation, language), invocation)| (*operation, language.as_str(), invocation))
    }

    /// Sorted, de-duplicated language identifiers known to the table.
    pub fn languages(&self) -> Vec<&str> {
        let mut languages: Vec<&str> = self
            .entries
            .keys()
            .map(|(_, language)| language.as_str())
            .collect();
        languages.sort_unstable();
        languages.dedup();
        languages
    }
}

fn normalize_language(language: &str) -> String {
    language.trim().to_lowercase()
}
