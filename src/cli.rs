//! Command-line surface: argument parsing and the command runners used by the binary.

use crate::processing::{
    FileSearchService, PollProgress, ServiceError, validate::validate_upload,
};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Arguments accepted by the `filesearch` binary.
#[derive(Parser, Debug)]
#[command(
    name = "filesearch",
    version,
    about = "Upload documents to a Gemini File Search store and ask questions about them"
)]
pub struct Cli {
    /// Command to run; defaults to `serve`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Supported subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server.
    Serve,
    /// Upload files (directories are walked recursively) and wait for indexing.
    Upload {
        /// Files or directories to upload.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// List documents in the store.
    List,
    /// Delete every document in the store.
    Clear,
    /// Delete one document by filename.
    Remove {
        /// Filename as shown by `list`.
        filename: String,
    },
    /// Ask a question grounded in the uploaded documents.
    Ask {
        /// Question text.
        question: String,
    },
}

impl Cli {
    /// Selected command, falling back to `serve`.
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Serve)
    }
}

/// Expand the given paths into a sorted, de-duplicated list of regular files.
pub fn expand_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        let metadata =
            fs::metadata(path).with_context(|| format!("failed to read {}", path.display()))?;
        if metadata.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .filter(|entry| !is_hidden(entry.path()))
                .map(|entry| entry.into_path())
                .collect();
            files.append(&mut found);
        } else {
            files.push(path.clone());
        }
    }
    let mut seen = std::collections::HashSet::new();
    files.retain(|file| seen.insert(file.clone()));
    Ok(files)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

/// Totals reported after an upload run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UploadSummary {
    /// Files indexed during this run.
    pub indexed: usize,
    /// Files skipped because their filename was already present.
    pub skipped: usize,
    /// Files that failed.
    pub failed: usize,
}

/// Upload each file in turn, printing a line per poll and per result.
///
/// Failures are reported and the run continues with the next file.
pub async fn run_upload<W>(
    service: &FileSearchService,
    paths: &[PathBuf],
    out: &mut W,
) -> Result<UploadSummary>
where
    W: Write + Send,
{
    let files = expand_paths(paths)?;
    if files.is_empty() {
        bail!("no files found under the given paths");
    }

    let mut summary = UploadSummary::default();
    for path in files {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = match read_upload(&path, &filename, service.policy().max_upload_bytes) {
            Ok(bytes) => bytes,
            Err(error) => {
                summary.failed += 1;
                writeln!(out, "Failed {filename}: {error:#}")?;
                continue;
            }
        };
        writeln!(out, "Uploading {filename} ({} bytes)", bytes.len())?;

        let result = service
            .upload_and_index(&filename, bytes, |progress| {
                let _ = writeln!(out, "{}", progress_line(progress));
            })
            .await;

        match result {
            Ok(document) if document.skipped => {
                summary.skipped += 1;
                writeln!(out, "Skipped {filename}: already in the store")?;
            }
            Ok(document) => {
                summary.indexed += 1;
                writeln!(
                    out,
                    "Indexed {filename} as {} after {} poll(s)",
                    document.record.id, document.polls
                )?;
            }
            Err(error) => {
                summary.failed += 1;
                writeln!(out, "Failed {filename}: {}", render_error(&error))?;
            }
        }
    }

    writeln!(
        out,
        "{} indexed, {} skipped, {} failed",
        summary.indexed, summary.skipped, summary.failed
    )?;
    Ok(summary)
}

/// Read a file for upload, rejecting oversized files from their metadata alone.
fn read_upload(path: &Path, filename: &str, max_bytes: usize) -> Result<Vec<u8>> {
    let metadata =
        fs::metadata(path).with_context(|| format!("failed to read {}", path.display()))?;
    let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
    if size > max_bytes {
        validate_upload(filename, size, max_bytes).context("Invalid input")?;
    }
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn progress_line(progress: &PollProgress) -> String {
    format!(
        "  poll {}: {} is {} ({}s elapsed)",
        progress.poll,
        progress.record.filename,
        progress.record.state,
        progress.elapsed.as_secs()
    )
}

fn render_error(error: &ServiceError) -> String {
    if error.is_retryable() {
        format!("{error} (retryable)")
    } else {
        error.to_string()
    }
}

/// Print every document in the store.
pub async fn run_list<W: Write>(service: &FileSearchService, out: &mut W) -> Result<()> {
    let documents = service.list_documents().await?;
    if documents.is_empty() {
        writeln!(out, "No documents in {}", service.store().display_name)?;
        return Ok(());
    }
    for document in documents {
        writeln!(
            out,
            "{}\t{}\t{} bytes\t{}",
            document.filename,
            document.state,
            document.size_bytes,
            document.mime_type.as_deref().unwrap_or("-")
        )?;
    }
    Ok(())
}

/// Delete every document, listing any that could not be removed.
pub async fn run_clear<W: Write>(service: &FileSearchService, out: &mut W) -> Result<()> {
    match service.clear_store().await {
        Ok(report) => {
            writeln!(out, "Deleted {} document(s)", report.deleted.len())?;
            Ok(())
        }
        Err(ServiceError::ClearIncomplete(report)) => {
            writeln!(
                out,
                "Deleted {} of {} document(s)",
                report.deleted.len(),
                report.attempted()
            )?;
            for failure in &report.failed {
                writeln!(
                    out,
                    "  could not delete {}: {}",
                    failure.filename, failure.error
                )?;
            }
            bail!("{} deletion(s) failed", report.failed.len())
        }
        Err(error) => Err(error.into()),
    }
}

/// Delete a single document by filename.
pub async fn run_remove<W: Write>(
    service: &FileSearchService,
    filename: &str,
    out: &mut W,
) -> Result<()> {
    if service.remove_document(filename).await? {
        writeln!(out, "Removed {filename}")?;
        Ok(())
    } else {
        bail!(
            "no document named '{filename}' in {}",
            service.store().display_name
        )
    }
}

/// Ask a question and print the answer followed by its sources.
pub async fn run_ask<W: Write>(
    service: &FileSearchService,
    question: &str,
    out: &mut W,
) -> Result<()> {
    let answer = service.ask(question).await?;
    writeln!(out, "{}", answer.text)?;
    if !answer.citations.is_empty() {
        writeln!(out)?;
        writeln!(out, "Sources:")?;
        for citation in &answer.citations {
            match &citation.uri {
                Some(uri) if *uri != citation.source => {
                    writeln!(out, "- {} ({uri})", citation.source)?
                }
                _ => writeln!(out, "- {}", citation.source)?,
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::{DocumentState, IndexingPolicy};
    use crate::remote::fake::FakeRemote;
    use std::time::Duration;

    async fn service(remote: FakeRemote) -> FileSearchService {
        let policy = IndexingPolicy {
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(3),
            max_transient_retries: 0,
            max_upload_bytes: 32,
        };
        FileSearchService::connect(Box::new(remote), "papers", policy)
            .await
            .expect("service")
    }

    fn output(buffer: Vec<u8>) -> String {
        String::from_utf8(buffer).expect("utf8")
    }

    #[test]
    fn command_defaults_to_serve() {
        let cli = Cli::parse_from(["filesearch"]);
        assert_eq!(cli.command(), &Command::Serve);

        let cli = Cli::parse_from(["filesearch", "ask", "what is this?"]);
        assert_eq!(
            cli.command(),
            &Command::Ask {
                question: "what is this?".into()
            }
        );
        assert!(Cli::try_parse_from(["filesearch", "upload"]).is_err());
    }

    #[test]
    fn directories_are_expanded_recursively() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).expect("nested dir");
        fs::write(dir.path().join("b.txt"), "b").expect("b");
        fs::write(dir.path().join(".hidden"), "h").expect("hidden");
        fs::write(nested.join("a.md"), "a").expect("a");
        let single = dir.path().join("b.txt");

        let files = expand_paths(&[dir.path().to_path_buf(), single.clone()]).expect("expand");
        assert_eq!(files, vec![single, nested.join("a.md")]);

        assert!(expand_paths(&[dir.path().join("missing")]).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn upload_prints_progress_and_continues_after_failures() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.txt"), "alpha").expect("a");
        fs::write(dir.path().join("b.txt"), "").expect("b");
        fs::write(dir.path().join("c.txt"), "gamma").expect("c");
        let remote = FakeRemote::new()
            .with_documents(&["c.txt"])
            .with_status_script(vec![
                Ok(DocumentState::Processing),
                Ok(DocumentState::Active),
            ]);
        let service = service(remote).await;

        let mut buffer = Vec::new();
        let summary = run_upload(&service, &[dir.path().to_path_buf()], &mut buffer)
            .await
            .expect("upload run");
        let text = output(buffer);

        assert_eq!(
            summary,
            UploadSummary {
                indexed: 1,
                skipped: 1,
                failed: 1
            }
        );
        assert!(text.contains("poll 1: a.txt is processing (1s elapsed)"));
        assert!(text.contains("poll 2: a.txt is active (2s elapsed)"));
        assert!(text.contains(
            "Failed b.txt: Invalid input: 'b.txt' is empty"
        ));
        assert!(text.contains("Skipped c.txt"));
    }

    #[tokio::test]
    async fn oversized_files_fail_without_stopping_the_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("big.bin"), vec![b'x'; 40]).expect("big");
        fs::write(dir.path().join("small.txt"), "ok").expect("small");
        let remote = FakeRemote::new().with_upload_state(DocumentState::Active);
        let service = service(remote).await;

        let mut buffer = Vec::new();
        let summary = run_upload(&service, &[dir.path().to_path_buf()], &mut buffer)
            .await
            .expect("upload run");
        let text = output(buffer);

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.indexed, 1);
        assert!(text.contains(
            "Failed big.bin: Invalid input: 'big.bin' is 40 bytes, above the 32 byte limit"
        ));
        assert!(!text.contains("Uploading big.bin"));
        assert!(text.contains("Indexed small.txt"));
    }

    #[tokio::test]
    async fn list_and_remove_report_documents() {
        let service = service(FakeRemote::new().with_documents(&["a.txt"])).await;
        let mut buffer = Vec::new();
        run_list(&service, &mut buffer).await.expect("list");
        assert!(output(buffer).starts_with("a.txt\tactive\t0 bytes"));

        let mut buffer = Vec::new();
        run_remove(&service, "a.txt", &mut buffer)
            .await
            .expect("remove");
        assert_eq!(output(buffer), "Removed a.txt\n");
        let missing = run_remove(&service, "a.txt", &mut Vec::new()).await;
        assert!(missing.is_err());

        let mut buffer = Vec::new();
        run_list(&service, &mut buffer).await.expect("empty list");
        assert_eq!(output(buffer), "No documents in papers\n");
    }

    #[tokio::test]
    async fn partial_clear_lists_failures_and_errors() {
        let remote = FakeRemote::new()
            .with_documents(&["a.txt", "b.txt"])
            .with_failing_delete("b.txt");
        let service = service(remote).await;
        let mut buffer = Vec::new();
        let err = run_clear(&service, &mut buffer).await.expect_err("partial");
        assert_eq!(err.to_string(), "1 deletion(s) failed");
        let text = output(buffer);
        assert!(text.contains("Deleted 1 of 2 document(s)"));
        assert!(text.contains("could not delete b.txt"));
    }

    #[tokio::test]
    async fn ask_prints_answer_and_sources() {
        let service = service(FakeRemote::new()).await;
        let mut buffer = Vec::new();
        run_ask(&service, "what?", &mut buffer).await.expect("ask");
        assert_eq!(output(buffer), "echo: what?\n\nSources:\n- seed.pdf\n");
    }
}
