//! 外部コマンド実行の共通処理

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::domain::ToolError;

/// Whether `program` resolves to a file on `PATH`.
pub(crate) fn command_exists(program: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| is_executable(&dir.join(program)))
}

fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

/// Run once and return stdout. Non-zero exit is an error carrying stderr.
pub(crate) async fn run<I, S>(program: &str, args: I) -> Result<String, ToolError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<_> = args
        .into_iter()
        .map(|a| a.as_ref().to_os_string())
        .collect();
    debug!(program, ?args, "running external command");

    let output = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(ToolError::Failed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// First line of a version banner.
pub(crate) fn first_line(output: &str) -> String {
    output.lines().next().unwrap_or_default().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_line_of_banner() {
        let banner = "Version: ImageMagick 7.1.1-21 Q16-HDRI\nCopyright: (C)\n";
        assert_eq!(first_line(banner), "Version: ImageMagick 7.1.1-21 Q16-HDRI");
        assert_eq!(first_line(""), "");
    }

    #[test]
    fn unknown_programs_do_not_exist() {
        assert!(!command_exists("definitely-not-a-real-program-name"));
    }

    #[tokio::test]
    async fn spawning_an_unknown_program_fails() {
        let err = run("definitely-not-a-real-program-name", ["--version"])
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }
}
