//! Terminal implementation of the user-interaction port.
//!
//! Notifications go to the diagnostic stream so command output on stdout
//! stays pipeable. Confirmations read one line and accept only `y`/`yes`.

use std::io::{self, BufRead, BufReader, Stderr, Stdin, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::domain::ports::{Notification, UserInteraction};

/// Prompts and notices over a line-oriented terminal.
#[derive(Debug)]
pub struct ConsoleInteraction<R, W> {
    assume_yes: bool,
    input: Mutex<R>,
    output: Mutex<W>,
}

impl ConsoleInteraction<BufReader<Stdin>, Stderr> {
    /// Console bound to the process's stdin and stderr.
    #[must_use]
    pub fn stdio(assume_yes: bool) -> Self {
        Self::new(BufReader::new(io::stdin()), io::stderr(), assume_yes)
    }
}

impl<R, W> ConsoleInteraction<R, W> {
    /// Console over arbitrary streams.
    ///
    /// With `assume_yes` every confirmation is granted without reading input.
    pub const fn new(input: R, output: W, assume_yes: bool) -> Self {
        Self {
            assume_yes,
            input: Mutex::new(input),
            output: Mutex::new(output),
        }
    }

    /// Release the output stream, e.g. to inspect what was written.
    pub fn into_output(self) -> W {
        self.output.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn output(&self) -> MutexGuard<'_, W> {
        self.output.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_agreement(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

impl<R, W> UserInteraction for ConsoleInteraction<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn notify(&self, notification: Notification) {
        if let Err(error) = writeln!(self.output(), "{notification}") {
            warn!(%error, "failed to write notification");
        }
    }

    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            debug!(prompt, "confirmation assumed");
            return true;
        }
        {
            let mut output = self.output();
            let prompted = write!(output, "{prompt} [y/N] ").and_then(|()| output.flush());
            if let Err(error) = prompted {
                warn!(%error, "failed to write prompt");
                return false;
            }
        }
        let mut answer = String::new();
        let read = self
            .input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .read_line(&mut answer);
        match read {
            Ok(0) => false,
            Ok(_) => is_agreement(&answer),
            Err(error) => {
                warn!(%error, "failed to read confirmation");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Behaviour of the terminal prompt adapter.

    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    fn console(input: &str, assume_yes: bool) -> ConsoleInteraction<Cursor<Vec<u8>>, Vec<u8>> {
        ConsoleInteraction::new(Cursor::new(input.as_bytes().to_vec()), Vec::new(), assume_yes)
    }

    fn written(console: ConsoleInteraction<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8(console.into_output()).expect("utf-8 output")
    }

    #[rstest]
    #[case::short("y\n", true)]
    #[case::long("YES\n", true)]
    #[case::padded("  yes  \n", true)]
    #[case::no("n\n", false)]
    #[case::blank("\n", false)]
    #[case::eof("", false)]
    #[case::other("sure\n", false)]
    fn confirm_accepts_only_explicit_agreement(#[case] input: &str, #[case] expected: bool) {
        let console = console(input, false);

        assert_eq!(console.confirm("Remove from group?"), expected);
        assert_eq!(written(console), "Remove from group? [y/N] ");
    }

    #[rstest]
    fn assume_yes_skips_the_prompt() {
        let console = console("n\n", true);

        assert!(console.confirm("Delete John Doe? This cannot be undone."));
        assert_eq!(written(console), "");
    }

    #[rstest]
    fn notifications_are_written_one_per_line() {
        let console = console("", false);

        console.notify(Notification::success("Saved John Doe"));
        console.notify(Notification::error("Client is already in this group."));

        assert_eq!(
            written(console),
            "Saved John Doe\nerror: Client is already in this group.\n"
        );
    }
}
