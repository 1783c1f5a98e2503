use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) attempts: usize,
    pub(crate) retry_delay: Duration,
}

impl RetryPolicy {
    pub(crate) fn single(connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            read_timeout,
            attempts: 1,
            retry_delay: Duration::ZERO,
        }
    }
}

fn should_retry_http_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}

fn build_agent(policy: &RetryPolicy) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(policy.connect_timeout)
        .timeout_read(policy.read_timeout)
        .timeout_write(policy.read_timeout)
        .build()
}

fn describe_status(status: u16, response: ureq::Response) -> String {
    let response_body = response.into_string().ok().unwrap_or_default();
    let body = response_body.trim();
    if body.is_empty() {
        format!("HTTP status {status}")
    } else {
        let truncated = body.chars().take(240).collect::<String>();
        format!("HTTP status {status} ({truncated})")
    }
}

pub(crate) fn get_text_with_retries(
    url: &str,
    query: &[(&str, String)],
    policy: &RetryPolicy,
) -> Result<String, String> {
    let attempts = policy.attempts.max(1);
    let agent = build_agent(policy);

    for attempt in 1..=attempts {
        let mut request = agent.get(url).set("Accept", "application/json");
        for (key, value) in query {
            request = request.query(key, value);
        }

        match request.call() {
            Ok(response) => {
                return response
                    .into_string()
                    .map_err(|err| format!("request failed: response decode failed: {err}"));
            }
            Err(ureq::Error::Status(status, response)) => {
                let status_error = describe_status(status, response);
                if should_retry_http_status(status) && attempt < attempts {
                    thread::sleep(policy.retry_delay);
                    continue;
                }
                if should_retry_http_status(status) {
                    return Err(format!(
                        "request failed after {attempts} attempt(s): {status_error}"
                    ));
                }
                return Err(format!("request failed: {status_error}"));
            }
            Err(ureq::Error::Transport(err)) => {
                if attempt < attempts {
                    thread::sleep(policy.retry_delay);
                    continue;
                }
                return Err(format!(
                    "request failed after {attempts} attempt(s): transport error: {err}"
                ));
            }
        }
    }

    Err("request failed: exhausted attempts without a concrete error".to_string())
}

/// One-shot JSON POST; non-2xx statuses are errors and are never retried.
pub(crate) fn post_json(url: &str, body: &str, policy: &RetryPolicy) -> Result<String, String> {
    let agent = build_agent(policy);
    match agent
        .post(url)
        .set("Content-Type", "application/json")
        .set("Accept", "application/json")
        .send_string(body)
    {
        Ok(response) => response
            .into_string()
            .map_err(|err| format!("request failed: response decode failed: {err}")),
        Err(ureq::Error::Status(status, response)) => Err(format!(
            "request failed: {}",
            describe_status(status, response)
        )),
        Err(ureq::Error::Transport(err)) => Err(format!("request failed: transport error: {err}")),
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    use std::collections::VecDeque;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Clone)]
    pub(crate) enum Reply {
        Status(u16, String),
        Delayed(Duration, u16, String),
    }

    /// Minimal HTTP/1.1 responder that replays scripted replies and records raw requests.
    pub(crate) struct ScriptedServer {
        pub(crate) base_url: String,
        requests: Arc<Mutex<Vec<String>>>,
        shutdown_tx: mpsc::Sender<()>,
        join_handle: Option<std::thread::JoinHandle<()>>,
    }

    impl ScriptedServer {
        pub(crate) fn spawn(replies: Vec<Reply>) -> Self {
            let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind test server");
            listener.set_nonblocking(true).expect("set nonblocking");
            let addr = listener.local_addr().expect("local addr");

            let requests = Arc::new(Mutex::new(Vec::new()));
            let recorded = Arc::clone(&requests);
            let script = Arc::new(Mutex::new(VecDeque::from(replies)));
            let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

            let join_handle = std::thread::spawn(move || {
                loop {
                    if shutdown_rx.try_recv().is_ok() {
                        break;
                    }
                    match listener.accept() {
                        Ok((mut stream, _)) => {
                            let reply = script
                                .lock()
                                .expect("lock script")
                                .pop_front()
                                .unwrap_or_else(|| Reply::Status(200, "{}".to_string()));
                            let recorded = Arc::clone(&recorded);
                            std::thread::spawn(move || {
                                let raw = read_request(&mut stream);
                                recorded.lock().expect("lock requests").push(raw);
                                serve(&mut stream, reply);
                            });
                        }
                        Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                            std::thread::sleep(Duration::from_millis(5));
                        }
                        Err(_) => break,
                    }
                }
            });

            Self {
                base_url: format!("http://{addr}"),
                requests,
                shutdown_tx,
                join_handle: Some(join_handle),
            }
        }

        pub(crate) fn requests(&self) -> Vec<String> {
            self.requests.lock().expect("lock requests").clone()
        }
    }

    impl Drop for ScriptedServer {
        fn drop(&mut self) {
            let _ = self.shutdown_tx.send(());
            if let Some(handle) = self.join_handle.take() {
                let _ = handle.join();
            }
        }
    }

    fn read_request(stream: &mut TcpStream) -> String {
        let _ = stream.set_read_timeout(Some(Duration::from_millis(200)));
        let mut buf = [0_u8; 2048];
        let mut data = Vec::new();
        let mut expected_len = None::<usize>;
        loop {
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(read) => {
                    data.extend_from_slice(&buf[..read]);
                    if let Some(header_end) = find_header_end(&data) {
                        let body_len = content_length(&data[..header_end]);
                        let total = *expected_len.get_or_insert(header_end + body_len);
                        if data.len() >= total {
                            break;
                        }
                    }
                }
                Err(_) => break,
            }
        }
        String::from_utf8_lossy(&data).into_owned()
    }

    fn find_header_end(data: &[u8]) -> Option<usize> {
        data.windows(4)
            .position(|window| window == b"\r\n\r\n")
            .map(|pos| pos + 4)
    }

    fn content_length(headers: &[u8]) -> usize {
        String::from_utf8_lossy(headers)
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.trim()
                    .eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0)
    }

    fn serve(stream: &mut TcpStream, reply: Reply) {
        let (status, body) = match reply {
            Reply::Status(status, body) => (status, body),
            Reply::Delayed(delay, status, body) => {
                std::thread::sleep(delay);
                (status, body)
            }
        };
        let reason = match status {
            200 => "OK",
            404 => "Not Found",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            _ => "Status",
        };
        let _ = write!(
            stream,
            "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = stream.flush();
    }
}
