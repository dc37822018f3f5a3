//! Terminal output for session events.
//!
//! A single task owns the terminal while a session runs: it draws the
//! progress bar, prints per-item status lines and asks overwrite
//! questions, so none of these interleave mid-line.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use bridge_session::{ItemFailure, ItemOutcome, SessionEvent};
use bridge_transfer::{Direction, TransferProgress};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tracing::debug;

const BAR_TEMPLATE: &str = "[{bar:70}] {msg}";
const BAR_RESOLUTION: u64 = 10_000;
const PREPARING: &str = "Preparing File...";

/// Blocking overwrite question. Returns `true` to overwrite.
type Prompt = Arc<dyn Fn(&Path) -> io::Result<bool> + Send + Sync>;

/// Consumes session events until the runner drops its sender.
pub async fn forward_events(rx: mpsc::Receiver<SessionEvent>, show_progress: bool) {
    let prompt: Prompt =
        Arc::new(|path: &Path| ask_overwrite(path, &mut io::stdin().lock(), &mut io::stderr()));
    forward_events_with(rx, show_progress, prompt).await;
}

async fn forward_events_with(
    mut rx: mpsc::Receiver<SessionEvent>,
    show_progress: bool,
    prompt: Prompt,
) {
    let mut renderer = Renderer::new(show_progress, prompt);
    while let Some(event) = rx.recv().await {
        renderer.handle(event).await;
    }
    renderer.clear();
}

struct Renderer {
    show_progress: bool,
    /// Whether the item in flight gets a bar. Never for standard output.
    draw_bar: bool,
    bar: Option<ProgressBar>,
    prompt: Prompt,
}

impl Renderer {
    fn new(show_progress: bool, prompt: Prompt) -> Self {
        Self {
            show_progress,
            draw_bar: show_progress,
            bar: None,
            prompt,
        }
    }

    async fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::ItemStarted {
                index,
                total,
                direction,
                name,
                to_stdout,
            } => {
                debug!(index, total, %direction, name = %name, "item started");
                self.draw_bar = self.show_progress && !to_stdout;
                if total > 1 {
                    self.line(&format!("[{index}/{total}] {}", started_line(direction, &name)));
                }
            }
            SessionEvent::Progress(progress) => self.progress(progress),
            SessionEvent::ItemFinished {
                direction, outcome, ..
            } => {
                self.finish_bar();
                if let Some(line) = outcome_line(direction, &outcome) {
                    self.line(&line);
                }
            }
            SessionEvent::ConfirmOverwrite { path, mut reply } => {
                self.clear();
                let prompt = Arc::clone(&self.prompt);
                let question = tokio::task::spawn_blocking(move || prompt(&path));

                // The executor drops its receiver when the transfer is
                // cancelled; the stdin read is then left behind.
                let answer = tokio::select! {
                    answer = question => Some(matches!(answer, Ok(Ok(true)))),
                    _ = reply.closed() => None,
                };
                match answer {
                    Some(overwrite) => {
                        let _ = reply.send(overwrite);
                    }
                    None => debug!("overwrite prompt abandoned"),
                }
            }
        }
    }

    fn progress(&mut self, progress: TransferProgress) {
        if !self.draw_bar {
            debug!(
                transferred = progress.transferred_bytes,
                total = progress.total_bytes,
                "transfer progress"
            );
            return;
        }
        let bar = self.bar.get_or_insert_with(new_bar);
        if progress.is_preparing() {
            bar.set_message(PREPARING);
        } else {
            bar.set_position((progress.fraction * BAR_RESOLUTION as f64) as u64);
            bar.set_message(format!("{:.2}%", progress.percentage()));
        }
    }

    fn finish_bar(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
    }

    fn clear(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }

    fn line(&self, text: &str) {
        match &self.bar {
            Some(bar) => bar.suspend(|| eprintln!("{text}")),
            None => eprintln!("{text}"),
        }
    }
}

fn new_bar() -> ProgressBar {
    let style = ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    let bar = ProgressBar::new(BAR_RESOLUTION);
    bar.set_style(style);
    bar
}

fn started_line(direction: Direction, name: &str) -> String {
    match direction {
        Direction::Upload => format!("Uploading {name}"),
        Direction::Download => format!("Downloading {name}"),
    }
}

/// Status line printed once an item reaches its outcome.
pub fn outcome_line(direction: Direction, outcome: &ItemOutcome) -> Option<String> {
    let line = match outcome {
        ItemOutcome::Uploaded { file_id } => format!("Upload Success! File ID: {file_id}"),
        ItemOutcome::Downloaded { .. } => "Download Success!".to_string(),
        ItemOutcome::Skipped { path } => {
            format!("Canceled overwriting of [{}].", path.display())
        }
        ItemOutcome::Failed(failure @ ItemFailure::Service(_)) => match direction {
            Direction::Upload => format!("Upload failure: {failure}"),
            Direction::Download => format!("Download failure: {failure}"),
        },
        ItemOutcome::Failed(failure) => failure.to_string(),
        ItemOutcome::Cancelled => return None,
    };
    Some(line)
}

/// Asks whether to overwrite `path`, repeating until the answer is `y` or
/// `n`. End of input counts as `n`.
pub fn ask_overwrite<R: BufRead, W: Write>(
    path: &Path,
    input: &mut R,
    output: &mut W,
) -> io::Result<bool> {
    writeln!(output, "Warning: File already exists at path [{}].", path.display())?;
    loop {
        write!(output, "Would you like to overwrite [{}]: [y/n] ", path.display())?;
        output.flush()?;

        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            return Ok(false);
        }
        match answer.trim() {
            "y" => return Ok(true),
            "n" => return Ok(false),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    use bridge_protocol::ServiceError;
    use tokio::sync::oneshot;

    fn answering(overwrite: bool) -> Prompt {
        Arc::new(move |_: &Path| -> io::Result<bool> { Ok(overwrite) })
    }

    fn started(to_stdout: bool) -> SessionEvent {
        SessionEvent::ItemStarted {
            index: 1,
            total: 1,
            direction: Direction::Download,
            name: "a.txt".into(),
            to_stdout,
        }
    }

    #[test]
    fn success_lines() {
        let line = outcome_line(
            Direction::Upload,
            &ItemOutcome::Uploaded {
                file_id: "f-1".into(),
            },
        );
        assert_eq!(line.as_deref(), Some("Upload Success! File ID: f-1"));

        let line = outcome_line(Direction::Download, &ItemOutcome::Downloaded { path: None });
        assert_eq!(line.as_deref(), Some("Download Success!"));
    }

    #[test]
    fn failure_lines_name_the_direction() {
        let failed = ItemOutcome::Failed(ItemFailure::Service(ServiceError::Status(500)));
        assert_eq!(
            outcome_line(Direction::Upload, &failed).as_deref(),
            Some("Upload failure: request failed with status code: 500")
        );

        let decrypt = ItemOutcome::Failed(ItemFailure::Service(ServiceError::FileDecryption));
        let line = outcome_line(Direction::Download, &decrypt).unwrap();
        assert!(line.starts_with("Download failure: unable to properly decrypt file"));
    }

    #[test]
    fn local_failures_print_as_is() {
        let failed = ItemOutcome::Failed(ItemFailure::InvalidFilePath("../x".into()));
        assert_eq!(
            outcome_line(Direction::Download, &failed).as_deref(),
            Some("Invalid file path: ../x")
        );
    }

    #[test]
    fn skipped_and_cancelled() {
        let skipped = ItemOutcome::Skipped {
            path: PathBuf::from("out/a.txt"),
        };
        assert_eq!(
            outcome_line(Direction::Download, &skipped).as_deref(),
            Some("Canceled overwriting of [out/a.txt].")
        );
        assert_eq!(outcome_line(Direction::Download, &ItemOutcome::Cancelled), None);
    }

    #[test]
    fn overwrite_yes() {
        let mut out = Vec::new();
        let yes = ask_overwrite(Path::new("a.txt"), &mut "y\n".as_bytes(), &mut out).unwrap();
        assert!(yes);
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("Warning: File already exists at path [a.txt].\n"));
        assert!(out.ends_with("Would you like to overwrite [a.txt]: [y/n] "));
    }

    #[test]
    fn overwrite_reprompts_on_other_input() {
        let mut out = Vec::new();
        let yes = ask_overwrite(Path::new("a.txt"), &mut "maybe\nn\n".as_bytes(), &mut out).unwrap();
        assert!(!yes);
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.matches("Would you like to overwrite").count(), 2);
    }

    #[test]
    fn overwrite_end_of_input_is_no() {
        let mut out = Vec::new();
        assert!(!ask_overwrite(Path::new("a.txt"), &mut "".as_bytes(), &mut out).unwrap());
    }

    #[tokio::test]
    async fn forwarder_drains_until_sender_dropped() {
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(forward_events(rx, false));

        tx.send(SessionEvent::ItemStarted {
            index: 1,
            total: 1,
            direction: Direction::Upload,
            name: "a.txt".into(),
            to_stdout: false,
        })
        .await
        .unwrap();
        tx.send(SessionEvent::Progress(TransferProgress::new(1, 2)))
            .await
            .unwrap();
        tx.send(SessionEvent::ItemFinished {
            index: 1,
            total: 1,
            direction: Direction::Upload,
            name: "a.txt".into(),
            outcome: ItemOutcome::Uploaded {
                file_id: "f-1".into(),
            },
        })
        .await
        .unwrap();
        drop(tx);

        task.await.unwrap();
    }

    #[tokio::test]
    async fn prompt_answer_is_sent_back() {
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(forward_events_with(rx, false, answering(true)));

        let (reply, answer) = oneshot::channel();
        tx.send(SessionEvent::ConfirmOverwrite {
            path: PathBuf::from("a.txt"),
            reply,
        })
        .await
        .unwrap();
        assert!(answer.await.unwrap());

        drop(tx);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn abandoned_prompt_does_not_hold_forwarder() {
        // Stays blocked, like an unanswered stdin read, until released.
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let prompt: Prompt = Arc::new(move |_: &Path| -> io::Result<bool> {
            let _ = release_rx.lock().unwrap().recv();
            Ok(true)
        });

        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(forward_events_with(rx, false, prompt));

        let (reply, answer) = oneshot::channel();
        tx.send(SessionEvent::ConfirmOverwrite {
            path: PathBuf::from("a.txt"),
            reply,
        })
        .await
        .unwrap();
        // An interrupt makes the executor give up on the answer.
        drop(answer);
        drop(tx);

        let finished = tokio::time::timeout(Duration::from_secs(3), task).await;
        let _ = release_tx.send(());
        assert!(matches!(finished, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn no_bar_for_standard_output() {
        let mut renderer = Renderer::new(true, answering(false));

        renderer.handle(started(true)).await;
        renderer
            .handle(SessionEvent::Progress(TransferProgress::new(1, 2)))
            .await;
        assert!(renderer.bar.is_none());

        renderer.handle(started(false)).await;
        renderer
            .handle(SessionEvent::Progress(TransferProgress::new(1, 2)))
            .await;
        assert!(renderer.bar.is_some());
        renderer.clear();
    }

    #[tokio::test]
    async fn no_bar_when_logging() {
        let mut renderer = Renderer::new(false, answering(false));
        renderer.handle(started(false)).await;
        renderer
            .handle(SessionEvent::Progress(TransferProgress::new(1, 2)))
            .await;
        assert!(renderer.bar.is_none());
    }
}
