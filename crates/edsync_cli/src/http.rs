//! ureq-backed HTTP client.

use edsync_engine::HttpClient;
use std::io::Read;
use std::time::Duration;

/// An [`HttpClient`] over a blocking `ureq` agent.
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    /// Creates a client with the given request timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl Default for UreqClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl HttpClient for UreqClient {
    fn get(&self, url: &str) -> Result<Vec<u8>, String> {
        match self.agent.get(url).call() {
            Ok(response) => read_body(response),
            // Non-2xx responses still carry the service's error envelope.
            Err(ureq::Error::Status(_, response)) => read_body(response),
            Err(err) => Err(err.to_string()),
        }
    }

    fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<Vec<u8>, String> {
        match self.agent.post(url).send_form(fields) {
            Ok(response) => read_body(response),
            Err(ureq::Error::Status(_, response)) => read_body(response),
            Err(err) => Err(err.to_string()),
        }
    }
}

fn read_body(response: ureq::Response) -> Result<Vec<u8>, String> {
    let mut body = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut body)
        .map_err(|e| e.to_string())?;
    Ok(body)
}
