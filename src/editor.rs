use std::path::Path;
use std::process::Command;

use crate::error::{Result, WatchError};

/// A resolved editor: program plus its leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl EditorCommand {
    /// Pick the user's editor.
    /// Checks the configured value -> VISUAL -> EDITOR -> "vi"
    pub fn resolve(configured: Option<&str>) -> Result<Self> {
        Self::resolve_with(configured, |var| std::env::var(var).ok())
    }

    fn resolve_with(configured: Option<&str>, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw = configured
            .map(str::to_string)
            .into_iter()
            .chain(lookup("VISUAL"))
            .chain(lookup("EDITOR"))
            .find(|candidate| !candidate.trim().is_empty())
            .unwrap_or_else(|| "vi".to_string());

        let parts = shell_words::split(&raw)
            .map_err(|e| WatchError::Editor(format!("cannot parse editor command {:?}: {}", raw, e)))?;
        let Some((program, args)) = parts.split_first() else {
            return Err(WatchError::Editor(format!("empty editor command {:?}", raw)));
        };

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// Open `dir` in the editor and wait for it to exit.
    /// The caller suspends the terminal around this call.
    pub fn open(&self, dir: &Path) -> Result<()> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(dir)
            .current_dir(dir)
            .status()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    WatchError::Editor(format!(
                        "editor '{}' not found; set general.editor or $VISUAL/$EDITOR",
                        self.program
                    ))
                } else {
                    WatchError::Editor(format!("failed to launch '{}': {}", self.program, e))
                }
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(WatchError::Editor(format!("'{}' exited with {}", self.program, status)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(configured: Option<&str>, visual: Option<&str>, editor: Option<&str>) -> Result<EditorCommand> {
        EditorCommand::resolve_with(configured, |var| match var {
            "VISUAL" => visual.map(str::to_string),
            "EDITOR" => editor.map(str::to_string),
            _ => None,
        })
    }

    #[test]
    fn configured_editor_wins() {
        let cmd = resolve(Some("code -n"), Some("nvim"), Some("nano")).unwrap();
        assert_eq!(cmd.program, "code");
        assert_eq!(cmd.args, vec!["-n"]);
    }

    #[test]
    fn visual_before_editor() {
        let cmd = resolve(None, Some("nvim"), Some("nano")).unwrap();
        assert_eq!(cmd.program, "nvim");
    }

    #[test]
    fn blank_values_are_skipped() {
        let cmd = resolve(Some("  "), Some(""), Some("nano")).unwrap();
        assert_eq!(cmd.program, "nano");
    }

    #[test]
    fn falls_back_to_vi() {
        let cmd = resolve(None, None, None).unwrap();
        assert_eq!(cmd.program, "vi");
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn quoted_arguments_are_kept_together() {
        let cmd = resolve(Some(r#"emacsclient -c -a """#), None, None).unwrap();
        assert_eq!(cmd.program, "emacsclient");
        assert_eq!(cmd.args, vec!["-c", "-a", ""]);
    }

    #[test]
    fn unbalanced_quotes_are_an_editor_error() {
        let err = resolve(Some("vim 'oops"), None, None).unwrap_err();
        assert!(matches!(err, WatchError::Editor(_)));
    }

    #[test]
    fn missing_program_is_reported() {
        let cmd = EditorCommand {
            program: "prwatch-no-such-editor".to_string(),
            args: vec![],
        };
        let err = cmd.open(Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
