//! Count the lines of every TypeScript and JavaScript file under a directory.
//!
//! walk -> keep .ts/.js -> count lines on four branches -> merge -> print
//!
//! Run with: cargo run --example line_count -- <dir>

use async_trait::async_trait;
use pipewright::prelude::*;
use std::path::{Path, PathBuf};

/// Depth-first directory walk.
///
/// Within a directory, files come before subdirectories and both are
/// visited in name order, so the traversal is deterministic.
struct WalkSource {
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
    pending: Vec<std::result::Result<PathBuf, Rejection>>,
}

impl WalkSource {
    fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            files: Vec::new(),
            dirs: vec![root.into()],
            pending: Vec::new(),
        }
    }

    async fn expand(&mut self, dir: PathBuf) {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) => {
                let rejection = Rejection::from(err).with_item(dir.display().to_string());
                self.pending.push(Err(rejection));
                return;
            }
        };

        let mut files = Vec::new();
        let mut dirs = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => match entry.file_type().await {
                    Ok(kind) if kind.is_dir() => dirs.push(entry.path()),
                    Ok(_) => files.push(entry.path()),
                    Err(err) => {
                        let item = entry.path().display().to_string();
                        self.pending.push(Err(Rejection::from(err).with_item(item)));
                    }
                },
                Ok(None) => break,
                Err(err) => {
                    let item = dir.display().to_string();
                    self.pending.push(Err(Rejection::from(err).with_item(item)));
                    break;
                }
            }
        }

        // Both lists are consumed from the back.
        files.sort_unstable_by(|a, b| b.cmp(a));
        dirs.sort_unstable_by(|a, b| b.cmp(a));
        self.files = files;
        self.dirs.extend(dirs);
    }
}

#[async_trait]
impl Source for WalkSource {
    type Item = PathBuf;

    async fn produce(&mut self) -> Option<std::result::Result<Self::Item, Rejection>> {
        loop {
            if let Some(entry) = self.pending.pop() {
                return Some(entry);
            }
            if let Some(file) = self.files.pop() {
                return Some(Ok(file));
            }
            let dir = self.dirs.pop()?;
            self.expand(dir).await;
        }
    }
}

fn is_script(path: &PathBuf) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("ts") | Some("js")
    )
}

async fn count_lines(path: PathBuf) -> Outcome<(PathBuf, usize)> {
    match tokio::fs::read_to_string(&path).await {
        Ok(text) if text.is_empty() => {
            Outcome::Reject(Rejection::new("empty file").with_item(path.display().to_string()))
        }
        Ok(text) => Outcome::Emit((path, text.lines().count())),
        Err(err) => Outcome::Reject(Rejection::from(err).with_item(path.display().to_string())),
    }
}

fn relative<'a>(root: &Path, path: &'a Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let root = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| ".".to_string()));

    let running = Pipeline::source("walk", WalkSource::new(&root))
        .stage("scripts", FilterProcessor::new(is_script))
        .parallel("count", 4, processor_from_fn(count_lines))
        .buffer_size(16)
        .spawn(CollectSink::new())?;

    let cancel = running.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let report = running.join().await?;

    let mut counts = report.output.clone();
    counts.sort();
    let mut total = 0;
    for (path, lines) in &counts {
        println!("{:>8}  {}", lines, relative(&root, path).display());
        total += lines;
    }
    println!("{:>8}  total ({} files)", total, counts.len());

    for err in &report.errors {
        match &err.item {
            Some(item) => eprintln!("error [{}] {}: {}", err.stage, item, err.message),
            None => eprintln!("error [{}] {}", err.stage, err.message),
        }
    }

    if report.is_cancelled() {
        eprintln!("interrupted, results are partial");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn walk(root: &Path) -> Vec<PathBuf> {
        let mut source = WalkSource::new(root);
        let mut seen = Vec::new();
        while let Some(entry) = source.produce().await {
            seen.push(relative(root, &entry.unwrap()).to_path_buf());
        }
        seen
    }

    #[tokio::test]
    async fn walk_visits_files_before_subdirectories_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("b/inner")).unwrap();
        std::fs::create_dir_all(root.join("a")).unwrap();
        for file in ["z.ts", "m.js", "a/2.ts", "a/1.ts", "b/x.js", "b/inner/y.ts"] {
            std::fs::write(root.join(file), "x\n").unwrap();
        }

        let expected: Vec<PathBuf> = ["m.js", "z.ts", "a/1.ts", "a/2.ts", "b/x.js", "b/inner/y.ts"]
            .iter()
            .map(PathBuf::from)
            .collect();
        assert_eq!(walk(root).await, expected);
        assert_eq!(walk(root).await, expected);
    }
}
