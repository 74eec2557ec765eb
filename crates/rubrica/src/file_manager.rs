use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::bridge::MarkdownEditor;

const LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024;
const LARGE_CONTENT_THRESHOLD: usize = 50 * 1024 * 1024;
const MAX_SAVE_ATTEMPTS: u32 = 3;

/// Tracks the Markdown file being edited.
pub struct FileManager {
    pub current_path: Option<PathBuf>,
    pub is_readonly: bool,
}

impl FileManager {
    pub fn new() -> Self {
        Self {
            current_path: None,
            is_readonly: false,
        }
    }

    pub fn get_current_path(&self) -> Option<&PathBuf> {
        self.current_path.as_ref()
    }

    pub fn is_readonly(&self) -> bool {
        self.is_readonly
    }

    pub fn has_file(&self) -> bool {
        self.current_path.is_some()
    }

    /// Read a Markdown file, remembering its path and whether it is
    /// writable.
    pub async fn open_file(&mut self, path: PathBuf) -> Result<String> {
        if !path.exists() {
            return Err(anyhow!("File not found: {}", path.display()));
        }
        if !path.is_file() {
            return Err(anyhow!("Not a file: {}", path.display()));
        }

        match fs::metadata(&path).await {
            Ok(metadata) => {
                self.is_readonly = metadata.permissions().readonly();
                if metadata.len() > LARGE_FILE_THRESHOLD {
                    log::warn!("Large file detected ({} bytes): {}", metadata.len(), path.display());
                }
            }
            Err(e) => {
                log::warn!("Failed to get file metadata: {}", e);
                self.is_readonly = false;
            }
        }

        match fs::read_to_string(&path).await {
            Ok(content) => {
                if content.contains('\0') {
                    return Err(anyhow!("File looks binary: {}", path.display()));
                }
                self.current_path = Some(path.clone());
                log::info!("Opened file: {}", path.display());
                Ok(content)
            }
            Err(e) => {
                let message = match e.kind() {
                    std::io::ErrorKind::PermissionDenied => {
                        format!("Permission denied: {}", path.display())
                    }
                    std::io::ErrorKind::NotFound => format!("File not found: {}", path.display()),
                    std::io::ErrorKind::InvalidData => {
                        format!("File is not valid UTF-8: {}", path.display())
                    }
                    _ => format!("Failed to read {}: {}", path.display(), e),
                };
                Err(anyhow!(message))
            }
        }
    }

    /// Write the editor's Markdown back to the current file, keeping a
    /// `.bak` copy of the previous content.
    pub async fn save_file(&self, editor: &MarkdownEditor) -> Result<String> {
        let Some(path) = self.current_path.as_ref() else {
            return Err(anyhow!("No file path set"));
        };
        if self.is_readonly {
            return Err(anyhow!("File is read-only: {}", path.display()));
        }
        let content = editor.markdown();
        check_size(&content)?;

        if let Ok(metadata) = fs::metadata(path).await {
            if metadata.len() > 0 {
                let backup_path = path.with_extension("bak");
                match fs::copy(path, &backup_path).await {
                    Ok(_) => log::info!("Created backup: {}", backup_path.display()),
                    Err(e) => log::warn!("Failed to create backup: {}", e),
                }
            }
        }

        write_with_retry(path, &content).await?;
        log::info!("Saved file: {}", path.display());
        Ok(format!("{} lines written", line_count(&content)))
    }

    pub async fn save_file_as(&mut self, path: PathBuf, editor: &MarkdownEditor) -> Result<String> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| anyhow!("Failed to create directory {}: {}", parent.display(), e))?;
                log::info!("Created directory: {}", parent.display());
            }
        }

        if path.exists() {
            match fs::metadata(&path).await {
                Ok(metadata) if metadata.permissions().readonly() => {
                    return Err(anyhow!("Target file is read-only: {}", path.display()));
                }
                Ok(_) => {}
                Err(e) => log::warn!("Failed to check target file metadata: {}", e),
            }
        }

        let content = editor.markdown();
        check_size(&content)?;
        write_with_retry(&path, &content).await?;

        log::info!("Saved file as: {}", path.display());
        let message = format!("{} lines written to '{}'", line_count(&content), path.display());
        self.current_path = Some(path);
        self.is_readonly = false;
        Ok(message)
    }
}

impl Default for FileManager {
    fn default() -> Self {
        Self::new()
    }
}

fn check_size(content: &str) -> Result<()> {
    if content.len() > LARGE_CONTENT_THRESHOLD {
        return Err(anyhow!("Content too large to save ({} bytes)", content.len()));
    }
    Ok(())
}

fn line_count(content: &str) -> usize {
    content.lines().count()
}

async fn write_with_retry(path: &Path, content: &str) -> Result<()> {
    let mut attempts = 0;
    loop {
        match fs::write(path, content.as_bytes()).await {
            Ok(_) => return Ok(()),
            Err(e) => {
                attempts += 1;
                if attempts >= MAX_SAVE_ATTEMPTS {
                    let message = match e.kind() {
                        std::io::ErrorKind::PermissionDenied => {
                            format!("No write permission: {}", path.display())
                        }
                        std::io::ErrorKind::WriteZero => {
                            format!("Disk may be full: {}", path.display())
                        }
                        _ => format!("Failed to write {}: {}", path.display(), e),
                    };
                    return Err(anyhow!(message));
                }
                tokio::time::sleep(tokio::time::Duration::from_millis(100 * attempts as u64)).await;
                log::warn!("Save attempt {} failed for {}, retrying...", attempts, path.display());
            }
        }
    }
}
