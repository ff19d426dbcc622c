use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::llm::Attachment;

/// Extensions accepted by the document picker.
pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["pdf", "doc", "docx", "txt"];

pub fn is_accepted_document(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Finds accepted documents under `dir`, sorted by path.
pub fn collect_documents(dir: &Path) -> Vec<PathBuf> {
    let mut documents: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| {
            let accepted = is_accepted_document(path);
            if !accepted {
                debug!("Skipping unsupported file: {}", path.display());
            }
            accepted
        })
        .collect();
    documents.sort();

    info!("Found {} documents in {}", documents.len(), dir.display());
    documents
}

pub fn load_attachment(path: &Path) -> Result<Attachment> {
    let content = std::fs::read(path)
        .with_context(|| format!("Failed to read attachment {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Attachment::new(name, content))
}

pub fn load_attachments<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Attachment>> {
    paths.iter().map(|p| load_attachment(p.as_ref())).collect()
}
