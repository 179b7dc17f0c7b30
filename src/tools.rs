use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::error::{ToolError, ToolFailure};

/// The two external executables the build delegates to. Both run to
/// completion before the call returns.
pub trait ExternalTool {
    /// Decompress `archive` into `output_dir` and return the path of the
    /// decompressed file. With `replace_original` the decompressed file is
    /// moved over `archive` and `archive` is returned.
    fn decompress(
        &self,
        archive: &Path,
        output_dir: &Path,
        replace_original: bool,
    ) -> Result<PathBuf, ToolError>;

    /// Run the archive patcher over every package in `archive_dir` using the
    /// instructions in `instructions`. Returns the tool's stdout.
    fn apply_archive_patch(
        &self,
        archive_dir: &Path,
        instructions: &Path,
    ) -> Result<String, ToolError>;
}

/// Invokes the real tools as subprocesses.
#[derive(Debug, Clone)]
pub struct ProcessTools {
    pub decompressor: PathBuf,
    pub archive_patcher: PathBuf,
}

impl ProcessTools {
    pub fn new(decompressor: PathBuf, archive_patcher: PathBuf) -> Self {
        Self {
            decompressor,
            archive_patcher,
        }
    }
}

/// Tools resolve their helper files relative to their own directory.
fn tool_command(program: &Path) -> Command {
    let mut command = Command::new(program);
    if let Some(dir) = program.parent().filter(|d| !d.as_os_str().is_empty()) {
        command.current_dir(dir);
    }
    command
}

fn run(mut command: Command, program: &Path) -> Result<Output, ToolFailure> {
    log::debug!("Running {command:?}");
    let output = command.output().map_err(|source| ToolFailure::Spawn {
        program: program.to_path_buf(),
        source,
    })?;
    if !output.status.success() {
        return Err(ToolFailure::Exit {
            program: program.to_path_buf(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

impl ExternalTool for ProcessTools {
    fn decompress(
        &self,
        archive: &Path,
        output_dir: &Path,
        replace_original: bool,
    ) -> Result<PathBuf, ToolError> {
        let fail = |cause: ToolFailure| ToolError::Decompression {
            archive: archive.to_path_buf(),
            cause,
        };

        fs::create_dir_all(output_dir).map_err(|e| fail(e.into()))?;

        // decompress "<archive>" -out="<dir>"
        let mut command = tool_command(&self.decompressor);
        let mut out_arg = std::ffi::OsString::from("-out=");
        out_arg.push(output_dir);
        command.arg(archive).arg(out_arg);
        run(command, &self.decompressor).map_err(fail)?;

        let file_name = archive.file_name().unwrap_or(archive.as_os_str());
        let decompressed = output_dir.join(file_name);
        if !replace_original {
            return Ok(decompressed);
        }
        fs::rename(&decompressed, archive).map_err(|e| fail(e.into()))?;
        Ok(archive.to_path_buf())
    }

    fn apply_archive_patch(
        &self,
        archive_dir: &Path,
        instructions: &Path,
    ) -> Result<String, ToolError> {
        // PatchUPK <instructions> "<archive dir>"
        let mut command = tool_command(&self.archive_patcher);
        command.arg(instructions).arg(archive_dir);
        let output = run(command, &self.archive_patcher).map_err(|cause| ToolError::ArchivePatch {
            instructions: instructions.to_path_buf(),
            cause,
        })?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
