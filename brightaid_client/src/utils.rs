use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::Result;

pub fn save_json<T: Serialize + ?Sized>(data: &T, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut file = File::create(path)?;
    file.write_all(serde_json::to_string_pretty(data)?.as_bytes())?;
    info!(path = %path.display(), "written");
    Ok(())
}

/// Pretty JSON to `path`, or to stdout when there is none.
pub fn emit_json<T: Serialize + ?Sized>(data: &T, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => save_json(data, path),
        None => {
            let mut out = std::io::stdout().lock();
            writeln!(out, "{}", serde_json::to_string_pretty(data)?)?;
            Ok(())
        }
    }
}
