//! Output sink collaborator
//!
//! The crawl core hands each successful page to a [`MarkdownSink`] as a
//! `(derived name, markdown text)` pair. Name derivation and the file
//! writer live here at the edge of the system; nothing inside the crawl
//! depends on them.

use std::fs;
use std::io;
use std::path::PathBuf;
use url::Url;

/// Receives `(derived name, markdown text)` pairs for persistence
pub trait MarkdownSink: Send + Sync {
    fn persist(&self, stem: &str, markdown: &str) -> io::Result<()>;
}

/// Derives a readable file stem from a URL
///
/// `https://console.groq.com/docs/libraries` becomes `docs_libraries`:
/// the last path component prefixed by its parent. Root URLs fall back to
/// the registrable part of the host, then to `index`. Anything outside
/// `[A-Za-z0-9_.-]` becomes `_`.
pub fn derive_stem(url: &Url) -> String {
    let path = url.path().trim_end_matches('/');

    let mut stem = if !path.is_empty() {
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        match parts.as_slice() {
            [] => String::new(),
            [only] => (*only).to_string(),
            [.., parent, last] => format!("{}_{}", parent, last),
        }
    } else {
        String::new()
    };

    if stem.is_empty() {
        // Root URL: use the second-to-last host label ("example" for
        // example.com, "groq" for console.groq.com)
        let host = url.host_str().unwrap_or("");
        let labels: Vec<&str> = host.split('.').collect();
        if labels.len() >= 2 {
            stem = labels[labels.len() - 2].to_string();
        }
    }

    if stem.is_empty() {
        stem = "index".to_string();
    }

    stem.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// File-writing sink: `<dir>/<stem>.md`
pub struct DirSink {
    dir: PathBuf,
}

impl DirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl MarkdownSink for DirSink {
    fn persist(&self, stem: &str, markdown: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.md", stem));
        fs::write(&path, markdown)?;
        tracing::debug!("Wrote markdown to {}", path.display());
        Ok(())
    }
}
