//! Line-oriented operator input.
//!
//! Reading a terminal blocks, so input is read on its own OS thread and handed
//! to the event loop through the intent channel. The event loop never waits on
//! the reader: when it returns, the reader thread is simply left behind and
//! exits on its next read or at process exit.

use super::intent::Intent;
use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;

/// Spawn a thread that parses `input` line by line and sends each intent to
/// `tx`.
///
/// Blank lines and lines starting with `#` are skipped. Lines that do not
/// parse are passed to `on_error` and reading continues. The thread ends at
/// end of input, on a read error or once the receiving side is gone.
pub fn spawn_intent_reader<R, F>(
    input: R,
    tx: mpsc::Sender<Intent>,
    mut on_error: F,
) -> io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
    F: FnMut(String) + Send + 'static,
{
    thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            for line in input.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!("Failed to read console input: {}", e);
                        break;
                    }
                };

                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }

                match trimmed.parse::<Intent>() {
                    Ok(intent) => {
                        if tx.blocking_send(intent).is_err() {
                            break;
                        }
                    }
                    Err(e) => on_error(e.to_string()),
                }
            }
            tracing::debug!("Console input closed");
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Trigger;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_reader_skips_comments_and_reports_bad_lines() {
        let (tx, mut rx) = mpsc::channel(8);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);

        let input = Cursor::new("init\n\n   # warm up first\nwobble\n  start  \n");
        let reader =
            spawn_intent_reader(input, tx, move |e| sink.lock().unwrap().push(e)).unwrap();
        reader.join().unwrap();

        assert_eq!(rx.try_recv().unwrap(), Intent::trigger(Trigger::Init));
        assert_eq!(rx.try_recv().unwrap(), Intent::trigger(Trigger::Start));
        // sender dropped at end of input
        assert!(rx.try_recv().is_err());
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("wobble"));
    }

    #[test]
    fn test_reader_stops_when_receiver_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let reader = spawn_intent_reader(Cursor::new("init\nstart\n"), tx, |_| {}).unwrap();
        reader.join().unwrap();
    }
}
