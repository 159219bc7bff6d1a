//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use digit_relay::config::ServiceConfig;
use digit_relay::inference::{EngineError, InferenceEngine, ModelHandle, OutputTensor, QuantizationParams};
use digit_relay::net::Listener;
use digit_relay::{PredictionServer, Shutdown};

/// Engine that returns fixed scores and remembers the last input it saw.
pub struct ScriptedEngine {
    pub scores: Vec<i8>,
    pub output_params: QuantizationParams,
    pub fail_invoke: bool,
    pub last_input: Arc<Mutex<Vec<i8>>>,
    input: Vec<i8>,
}

impl ScriptedEngine {
    pub fn new(scores: Vec<i8>) -> Self {
        Self {
            scores,
            output_params: QuantizationParams::new(1.0 / 256.0, -128),
            fail_invoke: false,
            last_input: Arc::new(Mutex::new(Vec::new())),
            input: Vec::new(),
        }
    }
}

impl InferenceEngine for ScriptedEngine {
    fn initialize(&mut self) -> Result<(), EngineError> {
        self.input = vec![0; 784];
        Ok(())
    }

    fn input_params(&self) -> QuantizationParams {
        QuantizationParams::new(1.0 / 255.0, -128)
    }

    fn input_len(&self) -> usize {
        784
    }

    fn set_input(&mut self, input: &[i8]) -> Result<(), EngineError> {
        self.input.copy_from_slice(input);
        Ok(())
    }

    fn invoke(&mut self) -> Result<(), EngineError> {
        if self.fail_invoke {
            return Err(EngineError::Invoke("scripted failure".into()));
        }
        *self.last_input.lock().unwrap() = self.input.clone();
        Ok(())
    }

    fn read_output(&self) -> OutputTensor<'_> {
        OutputTensor {
            scores: &self.scores,
            params: self.output_params,
        }
    }

    fn resident_bytes(&self) -> usize {
        4096
    }
}

/// Scores where `winner` holds the maximum.
pub fn scores_with_winner(winner: usize) -> Vec<i8> {
    let mut scores = vec![-100; 10];
    scores[winner] = 127;
    scores
}

/// Initialized handle around a scripted engine.
pub fn scripted_model(engine: ScriptedEngine) -> ModelHandle {
    let mut handle = ModelHandle::new(Box::new(engine));
    handle.initialize().unwrap();
    handle
}

/// Config for tests: ephemeral port, short grace, peer disabled.
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.timeouts.close_grace_ms = 10;
    config.peer.enabled = false;
    config
}

/// A running server and the handles needed to stop it.
pub struct RunningServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub task: JoinHandle<()>,
}

impl RunningServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the accept loop to exit.
    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("server did not stop")
            .unwrap();
    }
}

/// Start the server on an ephemeral port.
pub async fn start_server(config: ServiceConfig, model: ModelHandle) -> RunningServer {
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr();
    let server = PredictionServer::new(&config, model).unwrap();

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    let task = tokio::spawn(server.run(listener, stop));

    RunningServer { addr, shutdown, task }
}

/// Client that never goes through an environment proxy.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Write `raw` to the server and read the whole reply until it closes.
pub async fn send_raw(addr: SocketAddr, raw: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();
    read_to_close(&mut stream).await
}

pub async fn read_to_close(stream: &mut TcpStream) -> String {
    let mut reply = Vec::new();
    tokio::time::timeout(Duration::from_secs(15), stream.read_to_end(&mut reply))
        .await
        .expect("server did not close the connection")
        .unwrap();
    String::from_utf8(reply).unwrap()
}

/// Split a raw HTTP message into head and body.
pub fn split_message(raw: &str) -> (&str, &str) {
    raw.split_once("\r\n\r\n").expect("no header terminator")
}

/// Body of a raw HTTP reply, parsed as JSON.
pub fn json_body(raw: &str) -> serde_json::Value {
    serde_json::from_str(split_message(raw).1).unwrap()
}

/// Request bodies a recording peer has received.
pub type Received = Arc<Mutex<Vec<String>>>;

/// Start a peer that records every request body and answers with `status`.
pub async fn start_recording_peer(status: u16) -> (SocketAddr, Received) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let log = received.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let log = log.clone();
                    tokio::spawn(async move {
                        let body = read_request_body(&mut socket).await;
                        log.lock().unwrap().push(body);

                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
                            status_text
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, received)
}

/// Start a peer that records every request body and never answers.
///
/// Each connection is held open until the client gives up on it.
pub async fn start_silent_peer() -> (SocketAddr, Received) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let log = received.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let log = log.clone();
            tokio::spawn(async move {
                let body = read_request_body(&mut socket).await;
                log.lock().unwrap().push(body);

                let mut sink = [0u8; 256];
                while socket.read(&mut sink).await.unwrap_or(0) > 0 {}
            });
        }
    });

    (addr, received)
}

/// Read one request off `socket` and return its body.
async fn read_request_body(socket: &mut TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = socket.read(&mut buf).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);

        let text = String::from_utf8_lossy(&raw);
        if let Some((head, body)) = text.split_once("\r\n\r\n") {
            let declared = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if body.len() >= declared {
                return body.to_string();
            }
        }
    }
    String::new()
}

/// A `{"pixels": [...]}` body.
pub fn pixel_body(pixels: &[u8]) -> String {
    serde_json::json!({ "pixels": pixels }).to_string()
}
