use std::io::{self, BufRead, Write};

use storage::CredentialPrompt;
use tracing::warn;

/// Reads the access key from the terminal. An empty line declines.
pub struct StdinPrompt;

impl CredentialPrompt for StdinPrompt {
    fn prompt(&self, label: &str) -> Option<String> {
        let mut stderr = io::stderr();
        let _ = write!(stderr, "{label} (leave empty to skip): ");
        let _ = stderr.flush();

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim().to_string()).filter(|value| !value.is_empty()),
            Err(err) => {
                warn!("failed to read api key from stdin: {err}");
                None
            }
        }
    }
}
