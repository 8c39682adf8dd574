//! Document text extraction through external tools.

use anyhow::{bail, Context};
use std::{path::Path, process::Command};

/// `pdftotext` from poppler-utils, writing to stdout.
pub fn pdf_to_text(pdf: &Path) -> anyhow::Result<String> {
    let pdftotext =
        which::which("pdftotext").context("pdftotext not found; install poppler utils")?;
    let output = Command::new(pdftotext)
        .arg("-layout")
        .arg("-enc")
        .arg("UTF-8")
        .arg(pdf)
        .arg("-")
        .output()
        .with_context(|| format!("running pdftotext on {}", pdf.display()))?;
    if !output.status.success() {
        bail!(
            "pdftotext failed on {}: {}",
            pdf.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// `pandoc` plain-text conversion.
pub fn docx_to_text(docx: &Path) -> anyhow::Result<String> {
    let pandoc = which::which("pandoc").context("pandoc not found; install pandoc to read DOCX")?;
    let output = Command::new(pandoc)
        .arg("--from=docx")
        .arg("--to=plain")
        .arg("--wrap=none")
        .arg(docx)
        .output()
        .with_context(|| format!("running pandoc on {}", docx.display()))?;
    if !output.status.success() {
        bail!(
            "pandoc failed on {}: {}",
            docx.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
