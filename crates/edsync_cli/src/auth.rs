//! Console authentication flow.

use edsync_engine::{parse_auth_title, AuthSignal, Authenticator, Notifier, SyncError, SyncResult};
use std::io::{BufRead, Write};

/// Interactive authenticator for terminal sessions.
///
/// Points the user at the service's authorization page and reads the
/// completion code back from stdin. The page ends on a title carrying
/// `Success=<token>` or `Denied=<reason>`; pasting either works, as does
/// pasting the bare token.
pub struct ConsoleAuthenticator {
    server_url: String,
}

impl ConsoleAuthenticator {
    /// Creates an authenticator for the given service.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
        }
    }
}

impl Authenticator for ConsoleAuthenticator {
    fn authenticate(&self) -> SyncResult<String> {
        println!("Authorize edsync in your browser:");
        println!("  {}/authentication/app", self.server_url);
        print!("Paste the completion code (empty line to cancel): ");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        let stdin = std::io::stdin();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => return Err(SyncError::AuthWindowClosed),
            Ok(_) => {}
            Err(_) => return Err(SyncError::AuthWindowClosed),
        }

        let line = line.trim();
        if line.is_empty() {
            return Err(SyncError::AuthWindowClosed);
        }

        match parse_auth_title(line) {
            Some(AuthSignal::Success(token)) => Ok(token),
            Some(AuthSignal::Denied(reason)) => Err(SyncError::AuthDenied(reason)),
            None => Ok(line.to_string()),
        }
    }
}

/// Notifier that prints sync results to the terminal.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn success(&self, message: &str) {
        println!("{}", message);
    }
}
