//! A terminal rendering of the loading surface.

use std::io::Write;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::controller::LoaderView;

/// Width of the bar in cells.
const BAR_WIDTH: usize = 24;

/// `[######------------------]  25%  message`
pub fn format_line(view: &LoaderView) -> String {
    let percent = view.percent();
    let filled = (percent as usize * BAR_WIDTH) / 100;
    format!(
        "[{}{}] {:>3}%  {}",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        percent,
        view.message
    )
}

/// Redraws a single stderr line whenever the view changes, until the run
/// reaches a terminal phase or [`ProgressLine::stop`] is called.
pub struct ProgressLine {
    handle: JoinHandle<()>,
    cancel: watch::Sender<bool>,
}

impl ProgressLine {
    pub fn start(mut view: watch::Receiver<LoaderView>) -> Self {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            loop {
                let (line, terminal) = {
                    let view = view.borrow_and_update();
                    (format_line(&view), view.phase.is_terminal())
                };
                // \r moves to start of line, \x1b[2K clears the line
                eprint!("\x1b[2K\r{line}");
                let _ = std::io::stderr().flush();

                if terminal {
                    break;
                }
                tokio::select! {
                    changed = view.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = cancel_rx.changed() => break,
                }
            }
            eprint!("\x1b[2K\r");
            let _ = std::io::stderr().flush();
        });

        Self {
            handle,
            cancel: cancel_tx,
        }
    }

    /// Stop drawing and clear the line.
    pub async fn stop(self) {
        let _ = self.cancel.send(true);
        let _ = self.handle.await;
    }
}
