//! The fixed catalog of sandboxed commands that accept user arguments.
//!
//! Every handler validates its own arguments before touching the filesystem
//! or spawning a process. Path arguments are resolved through the
//! [`PathSandbox`] relative to the chat's current working directory.

mod files;
mod probe;
mod search;

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chatgate_commons::CommandResponse;
use thiserror::Error;
use tracing::debug;

use crate::cwd::WorkingDirectoryStore;
use crate::runner::{ProcessOptions, run_process};
use crate::sandbox::{PathSandbox, SandboxError};

pub use probe::is_safe_host;
pub use search::{FIND_MAX_DEPTH, FIND_MAX_RESULTS};

const LS_PROGRAM: &str = "/bin/ls";
const CAT_PROGRAM: &str = "/bin/cat";
const LS_ALLOWED_FLAGS: &[&str] = &["-a", "-l", "-h", "-t", "-r", "-1", "-la", "-al"];
const LL_IMPLIED_FLAG: &str = "-la";

/// Largest content accepted by `write` and `append`.
pub const MAX_WRITE_BYTES: usize = 32 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamicCommand {
    Pwd,
    List { long: bool },
    Cat,
    Cd,
    Touch,
    Mkdir,
    Write { append: bool },
    Count,
    Find,
    Ping,
}

impl DynamicCommand {
    pub const NAMES: &'static [&'static str] = &[
        "pwd", "ls", "ll", "cat", "cd", "touch", "mkdir", "write", "append", "count", "find",
        "ping",
    ];

    /// Case-insensitive lookup. Unknown names have no variant.
    pub fn parse(name: &str) -> Option<Self> {
        let command = match name.trim().to_ascii_lowercase().as_str() {
            "pwd" => Self::Pwd,
            "ls" => Self::List { long: false },
            "ll" => Self::List { long: true },
            "cat" => Self::Cat,
            "cd" => Self::Cd,
            "touch" => Self::Touch,
            "mkdir" => Self::Mkdir,
            "write" => Self::Write { append: false },
            "append" => Self::Write { append: true },
            "count" => Self::Count,
            "find" => Self::Find,
            "ping" => Self::Ping,
            _ => return None,
        };
        Some(command)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Pwd => "pwd",
            Self::List { long: false } => "ls",
            Self::List { long: true } => "ll",
            Self::Cat => "cat",
            Self::Cd => "cd",
            Self::Touch => "touch",
            Self::Mkdir => "mkdir",
            Self::Write { append: false } => "write",
            Self::Write { append: true } => "append",
            Self::Count => "count",
            Self::Find => "find",
            Self::Ping => "ping",
        }
    }
}

/// Argument and I/O failures. The display text is what the caller sees.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unsupported dynamic command")]
    Unsupported,
    #[error("ls flag not allowed: {0}")]
    LsFlag(String),
    #[error("cat requires a file path")]
    CatMissingPath,
    #[error("cat flags not allowed")]
    CatFlag,
    #[error("cd accepts a single path")]
    CdArity,
    #[error("not a directory")]
    NotADirectory,
    #[error("touch requires a single file path")]
    TouchArity,
    #[error("mkdir requires a single directory path")]
    MkdirArity,
    #[error("write requires a file path and content")]
    WriteArity,
    #[error("content too large")]
    ContentTooLarge,
    #[error("count accepts at most one path")]
    CountArity,
    #[error("find requires a single name fragment")]
    FindArity,
    #[error("find requires a non-empty name fragment")]
    FindEmpty,
    #[error("ping requires a single host")]
    PingArity,
    #[error("ping requires a non-empty host")]
    PingEmpty,
    #[error("ping host not allowed")]
    PingHost,
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
    #[error("find task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

type HandlerResult = Result<CommandResponse, DispatchError>;

#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_output_bytes: 8 * 1024,
        }
    }
}

pub struct DynamicCommandDispatcher {
    sandbox: PathSandbox,
    dirs: WorkingDirectoryStore,
    settings: DispatchSettings,
}

impl DynamicCommandDispatcher {
    pub fn new(sandbox: PathSandbox, settings: DispatchSettings) -> Self {
        let dirs = WorkingDirectoryStore::new(sandbox.root());
        Self {
            sandbox,
            dirs,
            settings,
        }
    }

    pub fn sandbox(&self) -> &PathSandbox {
        &self.sandbox
    }

    pub fn working_dirs(&self) -> &WorkingDirectoryStore {
        &self.dirs
    }

    /// Dispatch by name; names outside the catalog are rejected.
    pub async fn dispatch_named(
        &self,
        chat_id: i64,
        name: &str,
        args: &[String],
    ) -> CommandResponse {
        match DynamicCommand::parse(name) {
            Some(command) => self.dispatch(chat_id, command, args).await,
            None => CommandResponse::rejected(DispatchError::Unsupported.to_string()),
        }
    }

    pub async fn dispatch(
        &self,
        chat_id: i64,
        command: DynamicCommand,
        args: &[String],
    ) -> CommandResponse {
        match self.run(chat_id, command, args).await {
            Ok(response) => response,
            Err(error) => {
                debug!(chat_id, command = command.name(), %error, "dynamic command rejected");
                CommandResponse::rejected(error.to_string())
            }
        }
    }

    async fn run(&self, chat_id: i64, command: DynamicCommand, args: &[String]) -> HandlerResult {
        match command {
            DynamicCommand::Pwd => Ok(CommandResponse::success(path_line(&self.dirs.get(chat_id)))),
            DynamicCommand::List { long } => self.list(chat_id, long, args).await,
            DynamicCommand::Cat => self.cat(chat_id, args).await,
            DynamicCommand::Cd => self.cd(chat_id, args).await,
            DynamicCommand::Touch => {
                let target = self.resolve_single(chat_id, args, DispatchError::TouchArity)?;
                files::touch(&target).await
            }
            DynamicCommand::Mkdir => {
                let target = self.resolve_single(chat_id, args, DispatchError::MkdirArity)?;
                files::mkdir(&target).await
            }
            DynamicCommand::Write { append } => self.write(chat_id, args, append).await,
            DynamicCommand::Count => self.count(chat_id, args).await,
            DynamicCommand::Find => self.find(chat_id, args).await,
            DynamicCommand::Ping => probe::ping(args).await,
        }
    }

    fn resolve(&self, chat_id: i64, user_path: &str) -> Result<PathBuf, DispatchError> {
        let current = self.dirs.get(chat_id);
        Ok(self.sandbox.resolve(&current, user_path)?)
    }

    fn resolve_single(
        &self,
        chat_id: i64,
        args: &[String],
        arity: DispatchError,
    ) -> Result<PathBuf, DispatchError> {
        match args {
            [path] => self.resolve(chat_id, path),
            _ => Err(arity),
        }
    }

    fn process(&self, program: &str, args: Vec<String>) -> ProcessOptions {
        ProcessOptions::new(program)
            .args(args)
            .current_dir(self.sandbox.root())
            .timeout(self.settings.timeout)
            .max_output_bytes(self.settings.max_output_bytes)
    }

    async fn list(&self, chat_id: i64, long: bool, args: &[String]) -> HandlerResult {
        let mut flags = Vec::new();
        if long {
            flags.push(LL_IMPLIED_FLAG.to_string());
        }
        let mut paths = Vec::new();
        for arg in args {
            if arg.starts_with('-') {
                if !LS_ALLOWED_FLAGS.contains(&arg.as_str()) {
                    return Err(DispatchError::LsFlag(arg.clone()));
                }
                flags.push(arg.clone());
            } else {
                paths.push(path_arg(&self.resolve(chat_id, arg)?));
            }
        }
        if paths.is_empty() {
            paths.push(path_arg(&self.dirs.get(chat_id)));
        }

        flags.extend(paths);
        Ok(run_process(&self.process(LS_PROGRAM, flags)).await)
    }

    async fn cat(&self, chat_id: i64, args: &[String]) -> HandlerResult {
        if args.is_empty() {
            return Err(DispatchError::CatMissingPath);
        }
        let mut paths = Vec::with_capacity(args.len());
        for arg in args {
            if arg.starts_with('-') {
                return Err(DispatchError::CatFlag);
            }
            paths.push(path_arg(&self.resolve(chat_id, arg)?));
        }
        Ok(run_process(&self.process(CAT_PROGRAM, paths)).await)
    }

    async fn cd(&self, chat_id: i64, args: &[String]) -> HandlerResult {
        let target = match args {
            [] => {
                self.dirs.reset(chat_id);
                return Ok(CommandResponse::success(path_line(self.sandbox.root())));
            }
            [path] => self.resolve(chat_id, path)?,
            _ => return Err(DispatchError::CdArity),
        };

        match tokio::fs::metadata(&target).await {
            Ok(metadata) if metadata.is_dir() => {}
            _ => return Err(DispatchError::NotADirectory),
        }
        self.dirs.set(chat_id, target.clone());
        Ok(CommandResponse::success(path_line(&target)))
    }

    async fn write(&self, chat_id: i64, args: &[String], append: bool) -> HandlerResult {
        let [path, words @ ..] = args else {
            return Err(DispatchError::WriteArity);
        };
        if words.is_empty() {
            return Err(DispatchError::WriteArity);
        }
        let target = self.resolve(chat_id, path)?;
        let content = words.join(" ");
        if content.len() > MAX_WRITE_BYTES {
            return Err(DispatchError::ContentTooLarge);
        }
        files::write(&target, &content, append).await
    }

    async fn count(&self, chat_id: i64, args: &[String]) -> HandlerResult {
        let target = match args {
            [] => self.dirs.get(chat_id),
            [path] => self.resolve(chat_id, path)?,
            _ => return Err(DispatchError::CountArity),
        };
        files::count(&target).await
    }

    async fn find(&self, chat_id: i64, args: &[String]) -> HandlerResult {
        let [fragment] = args else {
            return Err(DispatchError::FindArity);
        };
        let needle = fragment.trim().to_lowercase();
        if needle.is_empty() {
            return Err(DispatchError::FindEmpty);
        }
        search::find_directories(self.dirs.get(chat_id), needle).await
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn path_line(path: &Path) -> String {
    format!("{}\n", path.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_catalog_name_parses_back() {
        for name in DynamicCommand::NAMES {
            let command = DynamicCommand::parse(name).unwrap();
            assert_eq!(command.name(), *name);
        }
    }

    #[test]
    fn parse_is_case_insensitive_and_closed() {
        assert_eq!(DynamicCommand::parse("LL"), Some(DynamicCommand::List { long: true }));
        assert_eq!(DynamicCommand::parse("rm"), None);
        assert_eq!(DynamicCommand::parse(""), None);
    }
}
