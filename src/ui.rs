//! Terminal prompts for PINs, passphrases and keystore passwords.

use std::io::{self, BufRead, Write};

use is_terminal::IsTerminal;
use zeroize::Zeroizing;

/// Sensitive input and status output used by the device state machines.
pub trait Prompt {
    /// Reads one line of sensitive input without echo.
    fn read_secret(&self, prompt: &str) -> io::Result<Zeroizing<String>>;

    /// Emits a status line for the user (not a log record).
    fn status(&self, line: &str);

    /// Reads a password twice and requires both entries to match.
    fn read_new_password(&self) -> io::Result<Zeroizing<String>> {
        let first = self.read_secret("New password: ")?;
        let second = self.read_secret("Repeat password: ")?;
        if *first != *second {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "passwords do not match",
            ));
        }
        Ok(first)
    }
}

/// Prompts on the controlling terminal; falls back to plain stdin lines
/// when stdin is not a TTY so the tool stays scriptable.
#[derive(Debug, Default, Clone, Copy)]
pub struct Terminal;

impl Terminal {
    pub fn new() -> Self {
        Self
    }
}

impl Prompt for Terminal {
    fn read_secret(&self, prompt: &str) -> io::Result<Zeroizing<String>> {
        if io::stdin().is_terminal() {
            return rpassword::prompt_password(prompt).map(Zeroizing::new);
        }

        let mut stderr = io::stderr();
        write!(stderr, "{}", prompt)?;
        stderr.flush()?;

        let mut line = Zeroizing::new(String::new());
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stdin closed",
            ));
        }
        let trimmed = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed);
        Ok(line)
    }

    fn status(&self, line: &str) {
        eprintln!("{}", line);
    }
}
