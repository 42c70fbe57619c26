use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::policy::LogAndSwallow;

// ── Dialog request / outcome ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogRequest {
    pub multiple: bool,
    pub directory: bool,
}

impl DialogRequest {
    /// The only request the workflow issues: one file, no directories.
    pub const SINGLE_FILE: Self = Self { multiple: false, directory: false };
}

/// What a dialog came back with. Downstream code never re-inspects shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    Cancelled,
    SinglePath(String),
    /// Some platforms hand back a list even when `multiple` is off
    MultiplePaths(Vec<String>),
}

impl PickOutcome {
    pub fn from_paths(mut paths: Vec<String>) -> Self {
        match paths.len() {
            0 => PickOutcome::Cancelled,
            1 => PickOutcome::SinglePath(paths.remove(0)),
            _ => PickOutcome::MultiplePaths(paths),
        }
    }

    /// Normalize to at most one path: the first one wins.
    pub fn into_selection(self) -> Option<String> {
        match self {
            PickOutcome::Cancelled => None,
            PickOutcome::SinglePath(p) => Some(p),
            PickOutcome::MultiplePaths(ps) => ps.into_iter().next(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PickerError {
    #[error("failed to launch dialog `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("dialog exited with status {code}: {stderr}")]
    Exited { code: i32, stderr: String },
    #[error("dialog unavailable: {0}")]
    Unavailable(String),
}

// ── Picker trait ──────────────────────────────────────────────────────────────

#[async_trait]
pub trait FilePicker: Send + Sync {
    async fn pick(&self, request: DialogRequest) -> Result<PickOutcome, PickerError>;
}

const PICKER_POLICY: LogAndSwallow = LogAndSwallow::new("file picker");

/// Open the dialog for a single file. Cancellation and dialog errors both
/// come back as `None`; errors are logged, never returned.
pub async fn select_file(picker: &dyn FilePicker) -> Option<String> {
    PICKER_POLICY
        .apply(picker.pick(DialogRequest::SINGLE_FILE).await)?
        .into_selection()
}

// ── Native dialog (rfd) ───────────────────────────────────────────────────────

/// Platform file dialog. Awaited on the calling task, so aborting the task
/// drops the pending dialog request.
pub struct NativePicker {
    title: String,
}

impl NativePicker {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into() }
    }
}

#[async_trait]
impl FilePicker for NativePicker {
    async fn pick(&self, request: DialogRequest) -> Result<PickOutcome, PickerError> {
        let dialog = rfd::AsyncFileDialog::new().set_title(self.title.as_str());
        let handles = match (request.directory, request.multiple) {
            (true, true) => dialog.pick_folders().await,
            (true, false) => dialog.pick_folder().await.map(|h| vec![h]),
            (false, true) => dialog.pick_files().await,
            (false, false) => dialog.pick_file().await.map(|h| vec![h]),
        };
        let paths = handles
            .unwrap_or_default()
            .iter()
            .map(|h| path_string(h.path()))
            .collect();
        Ok(PickOutcome::from_paths(paths))
    }
}

fn path_string(path: &Path) -> String {
    path.display().to_string()
}

// ── External dialog program ───────────────────────────────────────────────────

/// Runs a dialog program such as `zenity --file-selection` and reads one path
/// per stdout line. Exit 1, or exit 0 with no output, means cancelled.
/// The dialog process is killed if the pick is dropped before it answers.
pub struct CommandPicker {
    argv: Vec<String>,
}

impl CommandPicker {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

#[async_trait]
impl FilePicker for CommandPicker {
    async fn pick(&self, _request: DialogRequest) -> Result<PickOutcome, PickerError> {
        let Some((program, args)) = self.argv.split_first() else {
            return Err(PickerError::Unavailable("no picker command configured".to_string()));
        };

        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| PickerError::Launch { program: program.clone(), source })?;

        let code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout);
        match code {
            0 => Ok(PickOutcome::from_paths(parse_paths(&stdout))),
            1 if stdout.trim().is_empty() => Ok(PickOutcome::Cancelled),
            _ => Err(PickerError::Exited {
                code,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }
}

fn parse_paths(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

// ── Preset answer ─────────────────────────────────────────────────────────────

/// Answers every dialog with a path given up front (`embedsearch embed PATH`).
pub struct PresetPicker {
    path: String,
}

impl PresetPicker {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FilePicker for PresetPicker {
    async fn pick(&self, _request: DialogRequest) -> Result<PickOutcome, PickerError> {
        Ok(PickOutcome::SinglePath(self.path.clone()))
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandPicker {
        CommandPicker::new(vec!["sh".to_string(), "-c".to_string(), script.to_string()])
    }

    struct Broken;

    #[async_trait]
    impl FilePicker for Broken {
        async fn pick(&self, _request: DialogRequest) -> Result<PickOutcome, PickerError> {
            Err(PickerError::Unavailable("no display".to_string()))
        }
    }

    // ── Normalization ───────────────────────────────────────────────────────────

    #[test]
    fn test_from_paths() {
        assert_eq!(PickOutcome::from_paths(vec![]), PickOutcome::Cancelled);
        assert_eq!(
            PickOutcome::from_paths(vec!["a.txt".to_string()]),
            PickOutcome::SinglePath("a.txt".to_string())
        );
        assert_eq!(
            PickOutcome::from_paths(vec!["a.txt".to_string(), "b.txt".to_string()]),
            PickOutcome::MultiplePaths(vec!["a.txt".to_string(), "b.txt".to_string()])
        );
    }

    #[test]
    fn test_into_selection_takes_first() {
        assert_eq!(PickOutcome::Cancelled.into_selection(), None);
        assert_eq!(
            PickOutcome::SinglePath("/tmp/a.txt".to_string()).into_selection(),
            Some("/tmp/a.txt".to_string())
        );
        let multi = PickOutcome::MultiplePaths(vec!["a.txt".to_string(), "b.txt".to_string()]);
        assert_eq!(multi.into_selection(), Some("a.txt".to_string()));
        assert_eq!(PickOutcome::MultiplePaths(vec![]).into_selection(), None);
    }

    #[test]
    fn test_parse_paths_skips_blank_lines() {
        assert_eq!(parse_paths("a.txt\n\n  b.txt  \n"), vec!["a.txt", "b.txt"]);
        assert!(parse_paths("\n").is_empty());
    }

    // ── Command picker ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_command_picker_single() {
        let out = sh("echo /tmp/a.txt").pick(DialogRequest::SINGLE_FILE).await.unwrap();
        assert_eq!(out, PickOutcome::SinglePath("/tmp/a.txt".to_string()));
    }

    #[tokio::test]
    async fn test_command_picker_multiple() {
        let out = sh("printf 'a.txt\\nb.txt\\n'").pick(DialogRequest::SINGLE_FILE).await.unwrap();
        assert_eq!(out.into_selection(), Some("a.txt".to_string()));
    }

    #[tokio::test]
    async fn test_command_picker_cancel() {
        let out = sh("exit 1").pick(DialogRequest::SINGLE_FILE).await.unwrap();
        assert_eq!(out, PickOutcome::Cancelled);

        let out = sh("true").pick(DialogRequest::SINGLE_FILE).await.unwrap();
        assert_eq!(out, PickOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_command_picker_failure() {
        let err = sh("echo boom >&2; exit 5").pick(DialogRequest::SINGLE_FILE).await.unwrap_err();
        match err {
            PickerError::Exited { code, stderr } => {
                assert_eq!(code, 5);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_command_picker_missing_binary() {
        let picker = CommandPicker::new(vec!["this_dialog_does_not_exist_12345".to_string()]);
        let err = picker.pick(DialogRequest::SINGLE_FILE).await.unwrap_err();
        assert!(matches!(err, PickerError::Launch { .. }));

        let err = CommandPicker::new(vec![]).pick(DialogRequest::SINGLE_FILE).await.unwrap_err();
        assert!(matches!(err, PickerError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_command_picker_killed_when_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("answered");
        let picker = sh(&format!("sleep 1; touch '{}'; echo /tmp/late.txt", marker.display()));

        let task = tokio::spawn(async move { picker.pick(DialogRequest::SINGLE_FILE).await });
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "dialog kept running after its pick was dropped");
    }

    #[test]
    fn test_native_pick_is_lazy_and_send() {
        fn assert_send<T: Send>(_: &T) {}
        // Building the future opens nothing; dropping it unpolled is a no-op
        let picker = NativePicker::new("Choose a file to embed");
        let fut = picker.pick(DialogRequest::SINGLE_FILE);
        assert_send(&fut);
        drop(fut);
    }

    // ── select_file ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_select_file_swallows_errors() {
        assert_eq!(select_file(&Broken).await, None);
    }

    #[tokio::test]
    async fn test_select_file_normalizes() {
        assert_eq!(select_file(&sh("echo /tmp/a.txt")).await, Some("/tmp/a.txt".to_string()));
        assert_eq!(select_file(&sh("exit 1")).await, None);
        assert_eq!(
            select_file(&PresetPicker::new("/srv/notes.md")).await,
            Some("/srv/notes.md".to_string())
        );
    }
}
