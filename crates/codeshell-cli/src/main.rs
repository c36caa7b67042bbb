use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use codeshell_core::commands::CommandRegistry;
use codeshell_core::config::{self, ConfigFormat};
use codeshell_core::console::{prompt, Console, Execution};
use codeshell_core::fs::{FileSystem, LocalFileSystem};
use codeshell_core::language::language_from_path;
use codeshell_core::runner::SystemRunner;

#[derive(Parser)]
#[command(name = "codeshell", version, about = "Project console with build/run/test/lint/format shortcuts")]
struct Cli {
    /// Project root (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Enable debug logging (overridden by CODESHELL_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the interactive console
    Console,
    /// Execute a single console line and print its output
    Exec {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        line: Vec<String>,
    },
    /// Inspect or initialize the project configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Browse and edit the project tree
    Files {
        #[command(subcommand)]
        action: FilesAction,
    },
    /// Print the language detected for a file
    Detect { file: PathBuf },
    /// Print version information
    Version,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (defaults when none exists)
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Write the default configuration to the project root
    Init {
        #[arg(long)]
        json: bool,
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum FilesAction {
    /// List a directory (directories first, marked with a trailing `/`)
    Ls { dir: Option<PathBuf> },
    /// Create an empty file inside a directory
    Touch { dir: PathBuf, name: String },
    /// Create a directory inside a directory
    Mkdir { dir: PathBuf, name: String },
    /// Delete a file, or a whole directory with --recursive
    Rm {
        path: PathBuf,
        #[arg(short, long)]
        recursive: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().context("resolve current directory")?,
    };
    debug!(root = %root.display(), "project root");

    match cli.command {
        None | Some(Command::Console) => run_console(&root),
        Some(Command::Exec { line }) => run_line(&root, &line.join(" ")),
        Some(Command::Config { action }) => run_config(&root, action),
        Some(Command::Files { action }) => run_files(&root, action),
        Some(Command::Detect { file }) => {
            println!("{}", language_from_path(&file));
            Ok(())
        }
        Some(Command::Version) => {
            println!("codeshell {}", codeshell_core::version());
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("CODESHELL_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn print_execution<R>(console: &Console<'_, R>, execution: &Execution, out: &mut impl Write) -> Result<()>
where
    R: codeshell_core::runner::ProcessRunner,
{
    match execution {
        Execution::Skipped => {}
        // ANSI clear screen + cursor home.
        Execution::Cleared => write!(out, "\x1b[2J\x1b[H")?,
        Execution::Appended(range) => {
            for line in &console.transcript().lines()[range.clone()] {
                writeln!(out, "{line}")?;
            }
        }
    }
    Ok(())
}

fn run_console(root: &Path) -> Result<()> {
    let project = config::load_project(&LocalFileSystem, root);
    debug!(project = %project.name, languages = ?project.languages, "project loaded");
    let registry = CommandRegistry::builtin();
    let mut console = Console::new(&registry, SystemRunner, root.display().to_string())
        .with_project(&project);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    writeln!(
        stdout,
        "codeshell {} - project '{}'. Type 'help' for commands, 'exit' to leave.",
        codeshell_core::version(),
        project.name
    )?;
    loop {
        write!(stdout, "{}", prompt(console.cwd()))?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            writeln!(stdout)?;
            break;
        }
        let line = line.trim();
        if line == "exit" || line == "quit" {
            break;
        }
        console.type_input(line);
        let execution = console.submit();
        print_execution(&console, &execution, &mut stdout)?;
    }
    Ok(())
}

fn run_line(root: &Path, line: &str) -> Result<()> {
    let project = config::load_project(&LocalFileSystem, root);
    let registry = CommandRegistry::builtin();
    let mut console = Console::new(&registry, SystemRunner, root.display().to_string())
        .with_project(&project);
    let execution = console.execute(line);
    print_execution(&console, &execution, &mut io::stdout())
}

fn run_config(root: &Path, action: ConfigAction) -> Result<()> {
    let fs = LocalFileSystem;
    match action {
        ConfigAction::Show { json } => {
            let project = config::load_project(&fs, root);
            let format = if json {
                ConfigFormat::Json
            } else {
                ConfigFormat::Toml
            };
            println!("{}", config::render_config(&project, format)?);
        }
        ConfigAction::Init { json, force } => {
            let path = if json {
                root.join(".codeshell.json")
            } else {
                config::config_path(root)
            };
            if fs.exists(&path) && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            let name = root
                .canonicalize()
                .ok()
                .and_then(|dir| dir.file_name().map(|n| n.to_string_lossy().to_string()))
                .unwrap_or_else(|| "untitled".to_string());
            let project = config::ProjectConfig::default_for(&name);
            config::save(&fs, &path, &project)
                .with_context(|| format!("write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

fn run_files(root: &Path, action: FilesAction) -> Result<()> {
    let fs = LocalFileSystem;
    match action {
        FilesAction::Ls { dir } => {
            let dir = root.join(dir.unwrap_or_default());
            for entry in fs.list_directory(&dir)? {
                if entry.is_dir {
                    println!("{}/", entry.name);
                } else {
                    println!("{}", entry.name);
                }
            }
        }
        FilesAction::Touch { dir, name } => {
            let path = fs.create_file(&root.join(dir), &name)?;
            println!("Created {}", path.display());
        }
        FilesAction::Mkdir { dir, name } => {
            let path = fs.create_directory(&root.join(dir), &name)?;
            println!("Created {}", path.display());
        }
        FilesAction::Rm { path, recursive } => {
            let path = root.join(path);
            if path.is_dir() {
                if !recursive {
                    bail!("{} is a directory (use --recursive)", path.display());
                }
                fs.delete_directory(&path)?;
            } else {
                fs.delete_file(&path)?;
            }
            println!("Deleted {}", path.display());
        }
    }
    Ok(())
}
