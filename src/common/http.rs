//! Blocking HTTP transport with bounded exponential backoff.
//!
//! Connection problems, timeouts and `5xx`/`429` responses are retried transparently.  All
//! other responses, including `4xx` business errors, are handed back to the caller together
//! with their body so that the application layer can decide what to do.

use std::time::Duration;

use reqwest::{
    blocking::{Client, RequestBuilder},
    StatusCode,
};

use crate::err::TransportError;

/// Retry budget for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry, doubled for each further retry.
    pub backoff_factor: Duration,
    /// Upper bound for a single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            backoff_factor: Duration::from_millis(500),
            max_backoff: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Policy with `max_attempts` attempts and otherwise default settings.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Default::default()
        }
    }

    /// Delay to wait after the failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff_factor
            .saturating_mul(1 << exponent)
            .min(self.max_backoff)
    }

    /// Whether a response with `status` is worth another attempt.
    pub fn is_transient(status: StatusCode) -> bool {
        status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
    }
}

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub body: String,
}

/// Blocking client that retries transient failures.
#[derive(Debug, Clone)]
pub struct RetryingClient {
    client: Client,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(policy: RetryPolicy) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(super::user_agent())
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self { client, policy })
    }

    /// Send the request produced by `build`, rebuilding it for every attempt.
    pub fn send<F>(&self, build: F) -> Result<Response, TransportError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let request = build(&self.client).build().map_err(TransportError::Client)?;
            let method = request.method().clone();
            let url = request.url().to_string();
            tracing::debug!("{} {} (attempt #{})", method, url, attempt);

            let error = match self.client.execute(request) {
                Ok(response) if RetryPolicy::is_transient(response.status()) => {
                    if attempt >= self.policy.max_attempts {
                        return Err(TransportError::Status {
                            url,
                            attempts: attempt,
                            status: response.status(),
                        });
                    }
                    format!("status {}", response.status())
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().map_err(|source| TransportError::Request {
                        url: url.clone(),
                        attempts: attempt,
                        source,
                    })?;
                    return Ok(Response { status, body });
                }
                Err(source) => {
                    let retryable =
                        source.is_connect() || source.is_timeout() || source.is_request();
                    if !retryable || attempt >= self.policy.max_attempts {
                        return Err(TransportError::Request {
                            url,
                            attempts: attempt,
                            source,
                        });
                    }
                    source.to_string()
                }
            };

            let delay = self.policy.backoff(attempt);
            tracing::warn!(
                "{} {} failed with {} (retry #{} in {:?})",
                method,
                url,
                error,
                attempt,
                delay
            );
            std::thread::sleep(delay);
        }
    }
}

/// Minimal single-threaded HTTP server replaying canned responses.
#[cfg(test)]
pub(crate) mod test_server {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    /// A request as seen by the server.
    #[derive(Debug, Clone)]
    pub(crate) struct Captured {
        pub request_line: String,
        pub headers: Vec<(String, String)>,
        pub body: String,
    }

    impl Captured {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(key, _)| key == &name.to_ascii_lowercase())
                .map(|(_, value)| value.as_str())
        }
    }

    /// Placeholder in canned bodies that is replaced by the server's base URL.
    pub(crate) const BASE_URL: &str = "$BASE_URL";

    /// Serve `responses` in order, one connection each, and return the captured requests.
    pub(crate) fn serve(responses: Vec<(u16, String)>) -> (String, JoinHandle<Vec<Captured>>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("could not bind");
        let url = format!("http://{}", listener.local_addr().expect("no local address"));
        let base_url = url.clone();
        let handle = std::thread::spawn(move || {
            let mut captured = Vec::new();
            for (status, body) in responses {
                let body = body.replace(BASE_URL, &base_url);
                let (mut stream, _) = listener.accept().expect("could not accept");
                let mut reader = BufReader::new(stream.try_clone().expect("could not clone"));

                let mut request_line = String::new();
                reader.read_line(&mut request_line).expect("no request line");
                let mut headers = Vec::new();
                let mut content_length = 0;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).expect("no header line");
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    if let Some((key, value)) = line.split_once(':') {
                        let key = key.trim().to_ascii_lowercase();
                        let value = value.trim().to_string();
                        if key == "content-length" {
                            content_length = value.parse().expect("bad content length");
                        }
                        headers.push((key, value));
                    }
                }
                let mut request_body = vec![0; content_length];
                reader.read_exact(&mut request_body).expect("short body");

                write!(
                    stream,
                    "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                )
                .expect("could not write response");
                stream.flush().expect("could not flush");

                captured.push(Captured {
                    request_line: request_line.trim_end().to_string(),
                    headers,
                    body: String::from_utf8(request_body).expect("body not UTF-8"),
                });
            }
            captured
        });
        (url, handle)
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use reqwest::StatusCode;

    use super::{test_server, RetryPolicy, RetryingClient};
    use crate::err::TransportError;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_factor: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    #[rstest::rstest]
    #[case(1, 500)]
    #[case(2, 1_000)]
    #[case(3, 2_000)]
    #[case(9, 120_000)]
    fn backoff_doubles_and_caps(#[case] attempt: u32, #[case] expected_ms: u64) {
        let policy = RetryPolicy::default();

        assert_eq!(policy.backoff(attempt), Duration::from_millis(expected_ms));
    }

    #[rstest::rstest]
    #[case(StatusCode::INTERNAL_SERVER_ERROR, true)]
    #[case(StatusCode::BAD_GATEWAY, true)]
    #[case(StatusCode::TOO_MANY_REQUESTS, true)]
    #[case(StatusCode::UNPROCESSABLE_ENTITY, false)]
    #[case(StatusCode::CONFLICT, false)]
    #[case(StatusCode::OK, false)]
    fn transient_statuses(#[case] status: StatusCode, #[case] expected: bool) {
        assert_eq!(RetryPolicy::is_transient(status), expected);
    }

    #[test]
    fn retries_server_errors_then_succeeds() -> Result<(), anyhow::Error> {
        let (url, server) = test_server::serve(vec![
            (503, String::new()),
            (502, String::new()),
            (200, String::from(r#"{"id":"SUB999"}"#)),
        ]);
        let client = RetryingClient::new(fast_policy(5))?;

        let response = client.send(|c| c.get(format!("{}/ping", url)))?;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, r#"{"id":"SUB999"}"#);
        let captured = server.join().expect("server panicked");
        assert_eq!(captured.len(), 3);
        assert_eq!(captured[2].request_line, "GET /ping HTTP/1.1");

        Ok(())
    }

    #[test]
    fn business_errors_are_not_retried() -> Result<(), anyhow::Error> {
        let (url, server) = test_server::serve(vec![(
            422,
            String::from(r#"{"errors":[{"detail":"Invalid HPO term"}]}"#),
        )]);
        let client = RetryingClient::new(fast_policy(5))?;

        let response = client.send(|c| c.post(format!("{}/phenotypes", url)).body("{}"))?;

        assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response.body.contains("Invalid HPO term"));
        assert_eq!(server.join().expect("server panicked").len(), 1);

        Ok(())
    }

    #[test]
    fn exhausted_budget_is_an_error() -> Result<(), anyhow::Error> {
        let (url, server) =
            test_server::serve(vec![(500, String::new()), (500, String::new())]);
        let client = RetryingClient::new(fast_policy(2))?;

        let result = client.send(|c| c.get(format!("{}/ping", url)));

        match result {
            Err(TransportError::Status {
                attempts, status, ..
            }) => {
                assert_eq!(attempts, 2);
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(server.join().expect("server panicked").len(), 2);

        Ok(())
    }
}
