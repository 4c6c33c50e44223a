//! Report delivery

use std::io::{self, Write};
use std::path::Path;

/// Write the finished report to stdout or, atomically, to `path`.
pub fn write_report(contents: &str, path: Option<&Path>) -> io::Result<()> {
    let Some(path) = path else {
        let mut stdout = io::stdout().lock();
        stdout.write_all(contents.as_bytes())?;
        return stdout.flush();
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut builder = tempfile::Builder::new();
    builder.prefix(".spectree-").rand_bytes(8);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o644));
    }
    let mut file = builder.tempfile_in(dir)?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;

    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
