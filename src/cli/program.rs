use crate::error::{Result, RsuvError};
use crate::model::ProgramSpec;
use std::path::Path;

/// Build the spec submitted by `add`.
///
/// The executable is looked up on `PATH` relative to `cwd`, which also
/// becomes the program's working directory. Everything here runs before the
/// daemon is contacted.
pub fn build_spec(
    name: Option<&str>,
    env: &[String],
    command: &[String],
    cwd: &Path,
) -> Result<ProgramSpec> {
    let Some((program, args)) = command.split_first() else {
        return Err(RsuvError::Usage("add requires a command to run".to_string()));
    };

    let resolved = which::which_in(program, std::env::var_os("PATH"), cwd).map_err(|e| {
        RsuvError::Usage(format!("cannot find executable '{program}': {e}"))
    })?;
    let resolved = if resolved.is_absolute() {
        resolved
    } else {
        cwd.join(resolved)
    };

    let mut argv = Vec::with_capacity(command.len());
    argv.push(resolved.to_string_lossy().into_owned());
    argv.extend(args.iter().cloned());

    let spec = ProgramSpec {
        name: name.unwrap_or(program.as_str()).to_string(),
        dir: cwd.to_path_buf(),
        command: argv,
        environ: env.to_vec(),
    };
    spec.validate()?;

    Ok(spec)
}
