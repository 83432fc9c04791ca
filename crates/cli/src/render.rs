//! Presentation of recovered files: text inline, everything else saved and
//! labelled by kind.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use guestvault_crypto::{Decrypted, PreviewKind, DEFAULT_FILENAME};

#[derive(Debug)]
pub struct Rendered {
    pub kind: PreviewKind,
    pub path: PathBuf,
    /// True when the content was also written to the terminal.
    pub inline: bool,
}

/// Final path component of a header-supplied name, so a hostile envelope
/// cannot write outside the output directory.
pub fn safe_filename(name: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_FILENAME)
        .to_string()
}

pub fn render(decrypted: &Decrypted, out_dir: &Path, out: &mut impl Write) -> Result<Rendered> {
    let kind = decrypted.preview_kind();

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create output directory: {}", out_dir.display()))?;
    let path = out_dir.join(safe_filename(&decrypted.filename));
    std::fs::write(&path, &decrypted.data)
        .with_context(|| format!("failed to write file: {}", path.display()))?;

    let inline = kind == PreviewKind::Text;
    if inline {
        out.write_all(String::from_utf8_lossy(&decrypted.data).as_bytes())?;
        if !decrypted.data.ends_with(b"\n") {
            out.write_all(b"\n")?;
        }
        out.flush()?;
    }

    Ok(Rendered { kind, path, inline })
}

/// One-line summary printed after rendering.
pub fn describe(rendered: &Rendered) -> String {
    match rendered.kind {
        PreviewKind::Download => format!("Saved download: {}", rendered.path.display()),
        kind => format!("Saved {}: {}", kind.label(), rendered.path.display()),
    }
}
