mod common;

use std::time::{Duration, Instant};

use digit_relay::inference::{DenseEngine, ModelHandle};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use common::*;

fn uninitialized_model() -> ModelHandle {
    ModelHandle::new(Box::new(DenseEngine::new(Vec::new(), 1024)))
}

#[tokio::test]
async fn test_predict_blank_image() {
    let engine = ScriptedEngine::new(scores_with_winner(4));
    let seen = engine.last_input.clone();
    let server = start_server(test_config(), scripted_model(engine)).await;

    let res = http_client()
        .post(server.url("/predict"))
        .header("Content-Type", "application/json")
        .body(pixel_body(&[0; 784]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "application/json");
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    assert_eq!(res.headers()["connection"], "close");

    let text = res.text().await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["success"], true);
    assert_eq!(value["predicted_digit"], 4);
    assert_eq!(value["error_message"], "");
    assert_eq!(value["model_initialized"], true);
    assert!(text.contains("\"confidence\": 0.996094,"));

    // Every black pixel maps to the bottom of the input range.
    assert!(seen.lock().unwrap().iter().all(|&q| q == -128));

    server.stop().await;
}

#[tokio::test]
async fn test_white_pixels_quantize_to_top_of_range() {
    let engine = ScriptedEngine::new(scores_with_winner(0));
    let seen = engine.last_input.clone();
    let server = start_server(test_config(), scripted_model(engine)).await;

    let reply = send_raw(
        server.addr,
        format!(
            "POST /predict HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}",
            pixel_body(&[255; 784]).len(),
            pixel_body(&[255; 784])
        )
        .as_bytes(),
    )
    .await;

    assert_eq!(json_body(&reply)["success"], true);
    assert!(seen.lock().unwrap().iter().all(|&q| q == 127));

    server.stop().await;
}

#[tokio::test]
async fn test_short_array_reports_count() {
    let server = start_server(test_config(), scripted_model(ScriptedEngine::new(scores_with_winner(1)))).await;

    let body = "{\"pixels\":[1,2,3]}";
    let reply = send_raw(
        server.addr,
        format!("POST /predict HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}", body.len(), body).as_bytes(),
    )
    .await;

    assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
    let value = json_body(&reply);
    assert_eq!(value["success"], false);
    assert_eq!(value["predicted_digit"], -1);
    assert_eq!(value["confidence"].as_f64(), Some(0.0));
    assert_eq!(
        value["error_message"],
        "Array must have exactly 784 pixels (28x28), received: 3"
    );

    server.stop().await;
}

#[tokio::test]
async fn test_missing_key_and_bad_token() {
    let server = start_server(test_config(), scripted_model(ScriptedEngine::new(scores_with_winner(1)))).await;
    let client = http_client();

    let missing = client
        .post(server.url("/predict"))
        .body("{\"data\": [0, 0]}")
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert_eq!(missing["error_message"], "Field 'pixels' not found");

    let mut tokens = vec!["0".to_string(); 784];
    tokens[5] = "abc".to_string();
    let bad = client
        .post(server.url("/predict"))
        .body(format!("{{\"pixels\": [{}]}}", tokens.join(",")))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert_eq!(bad["success"], false);
    assert_eq!(bad["error_message"], "Invalid value at index 5: 'abc'");

    server.stop().await;
}

#[tokio::test]
async fn test_engine_failure_is_reported() {
    let mut engine = ScriptedEngine::new(scores_with_winner(1));
    engine.fail_invoke = true;
    let server = start_server(test_config(), scripted_model(engine)).await;

    let body = pixel_body(&[0; 784]);
    let reply = send_raw(
        server.addr,
        format!("POST /predict HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}", body.len(), body).as_bytes(),
    )
    .await;

    let value = json_body(&reply);
    assert_eq!(value["success"], false);
    assert_eq!(value["predicted_digit"], -1);
    assert_eq!(
        value["error_message"],
        "Inference execution failed: scripted failure"
    );
    assert_eq!(value["model_initialized"], true);

    server.stop().await;
}

#[tokio::test]
async fn test_status_before_initialization() {
    let server = start_server(test_config(), uninitialized_model()).await;

    let reply = send_raw(server.addr, b"GET /status HTTP/1.1\r\nHost: x\r\n\r\n").await;
    let value = json_body(&reply);

    assert_eq!(value["success"], false);
    assert_eq!(value["predicted_digit"], -1);
    assert_eq!(value["error_message"], "Model not initialized");
    assert_eq!(value["model_initialized"], false);

    // Predictions are refused the same way.
    let body = pixel_body(&[0; 784]);
    let reply = send_raw(
        server.addr,
        format!("POST /predict HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}", body.len(), body).as_bytes(),
    )
    .await;
    assert_eq!(json_body(&reply)["error_message"], "Model not initialized");

    server.stop().await;
}

#[tokio::test]
async fn test_status_is_idempotent() {
    let server = start_server(test_config(), scripted_model(ScriptedEngine::new(scores_with_winner(2)))).await;

    let first = send_raw(server.addr, b"GET /status HTTP/1.1\r\n\r\n").await;
    let second = send_raw(server.addr, b"GET /status HTTP/1.1\r\n\r\n").await;
    assert_eq!(first, second);

    let value = json_body(&first);
    assert_eq!(value["success"], true);
    assert_eq!(value["model_initialized"], true);
    assert!(value["heap_free"].as_u64().unwrap() > 0);

    let (head, body) = split_message(&first);
    assert!(head.contains(&format!("Content-Length: {}", body.len())));

    server.stop().await;
}

#[tokio::test]
async fn test_oversized_body_is_not_read() {
    let server = start_server(test_config(), scripted_model(ScriptedEngine::new(scores_with_winner(2)))).await;

    let started = Instant::now();
    let reply = send_raw(server.addr, b"POST /predict HTTP/1.1\r\nContent-Length: 60000\r\n\r\n").await;

    // No body wait: the declared length is outside the buffered range.
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(json_body(&reply)["error_message"], "Field 'pixels' not found");

    server.stop().await;
}

#[tokio::test]
async fn test_lowercase_content_length() {
    let server = start_server(test_config(), scripted_model(ScriptedEngine::new(scores_with_winner(9)))).await;

    let body = pixel_body(&[7; 784]);
    let reply = send_raw(
        server.addr,
        format!("POST /predict HTTP/1.1\r\ncontent-length: {}\r\n\r\n{}", body.len(), body).as_bytes(),
    )
    .await;

    assert_eq!(json_body(&reply)["predicted_digit"], 9);

    server.stop().await;
}

#[tokio::test]
async fn test_partial_body_times_out_into_decode_error() {
    let mut config = test_config();
    config.timeouts.body_secs = 1;
    let server = start_server(config, scripted_model(ScriptedEngine::new(scores_with_winner(2)))).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"POST /predict HTTP/1.1\r\nContent-Length: 100\r\n\r\n{\"pixels\": [1, 2")
        .await
        .unwrap();

    let reply = read_to_close(&mut stream).await;
    assert_eq!(json_body(&reply)["error_message"], "Pixel array end ']' not found");

    server.stop().await;
}

#[tokio::test]
async fn test_silent_client_gets_help_after_header_deadline() {
    let mut config = test_config();
    config.timeouts.header_secs = 1;
    let server = start_server(config, scripted_model(ScriptedEngine::new(scores_with_winner(2)))).await;

    let started = Instant::now();
    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    let reply = read_to_close(&mut stream).await;

    assert!(started.elapsed() >= Duration::from_millis(900));
    assert!(reply.contains("Content-Type: text/html"));
    assert!(reply.contains("Digit Relay API"));

    server.stop().await;
}

#[tokio::test]
async fn test_help_page_for_unknown_routes() {
    let server = start_server(test_config(), uninitialized_model()).await;

    let res = http_client().get(server.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "text/html");
    assert_eq!(res.headers()["access-control-allow-methods"], "GET, POST, OPTIONS");

    let page = res.text().await.unwrap();
    assert!(page.contains("POST /predict"));
    assert!(page.contains("GET /status"));
    assert!(page.contains(&server.addr.to_string()));

    server.stop().await;
}

#[tokio::test]
async fn test_connections_are_served_in_order() {
    let mut config = test_config();
    config.timeouts.header_secs = 1;
    let server = start_server(config, scripted_model(ScriptedEngine::new(scores_with_winner(2)))).await;

    // The first client stalls; the second is only served after the first times out.
    let mut stalled = TcpStream::connect(server.addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = Instant::now();
    let status = send_raw(server.addr, b"GET /status HTTP/1.1\r\n\r\n").await;
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert_eq!(json_body(&status)["success"], true);

    let help = read_to_close(&mut stalled).await;
    assert!(help.contains("text/html"));

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_stops_accept_loop() {
    let server = start_server(test_config(), uninitialized_model()).await;
    let addr = server.addr;
    server.stop().await;

    assert!(TcpStream::connect(addr).await.is_err());
}
