//! HTTP API server for the EmpowerAI query service
//! Plain HTTP/1.1 over tokio, one request per connection

use empower_ai::clarification::CandidateMatch;
use empower_ai::error::EmpowerError;
use empower_ai::mock_data::DEFAULT_SUGGESTIONS;
use empower_ai::uploader::{DocumentUploader, IncomingFile};
use empower_ai::{AppConfig, QueryService};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const MAX_REQUEST_BYTES: usize = 1_000_000;
const READ_TIMEOUT: Duration = Duration::from_secs(5);

struct AppState {
    service: QueryService,
    uploader: Mutex<DocumentUploader>,
}

#[derive(Deserialize)]
struct QueryBody {
    query: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClarifyBody {
    query: String,
    possible_matches: Vec<CandidateMatch>,
}

#[derive(Deserialize)]
struct SchemaMappingBody {
    query: String,
    schema: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SuggestionsBody {
    schema_description: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectBody {
    connection_string: String,
}

#[derive(Deserialize)]
struct DocumentsBody {
    files: Vec<IncomingFile>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;
    if config.api_key.is_some() {
        info!("OpenAI API key found, using model {}", config.model);
    } else {
        warn!("OpenAI API key not found, using offline heuristic responses");
    }

    let state = Arc::new(AppState {
        service: QueryService::from_config(&config)?,
        uploader: Mutex::new(DocumentUploader::new()),
    });

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!("Server listening on {}", config.listen_addr);

    loop {
        let (stream, addr) = listener.accept().await?;
        debug!("New connection from {}", addr);
        tokio::spawn(handle_connection(stream, state.clone()));
    }
}

/// How much of a request has arrived.
#[derive(Debug, PartialEq, Eq)]
enum RequestProgress {
    Incomplete,
    Complete,
    TooLarge,
}

fn request_progress(buffer: &[u8]) -> RequestProgress {
    match find_headers_end(buffer) {
        Some(headers_end) => {
            let head = String::from_utf8_lossy(&buffer[..headers_end]);
            let expected = headers_end + extract_content_length(&head).unwrap_or(0);
            if expected > MAX_REQUEST_BYTES {
                RequestProgress::TooLarge
            } else if buffer.len() >= expected {
                RequestProgress::Complete
            } else {
                RequestProgress::Incomplete
            }
        }
        None if buffer.len() > MAX_REQUEST_BYTES => RequestProgress::TooLarge,
        None => RequestProgress::Incomplete,
    }
}

async fn handle_connection(mut stream: TcpStream, state: Arc<AppState>) {
    let mut buffer = Vec::new();
    let mut chunk = [0; 8192];

    let read_result = timeout(READ_TIMEOUT, async {
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) => return Ok(RequestProgress::Complete),
                Ok(n) => {
                    buffer.extend_from_slice(&chunk[..n]);
                    match request_progress(&buffer) {
                        RequestProgress::Incomplete => {}
                        done => return Ok(done),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    })
    .await;

    let response = match read_result {
        Err(_) => {
            warn!("Request read timeout");
            return;
        }
        Ok(Err(e)) => {
            error!("Failed to read from stream: {}", e);
            return;
        }
        Ok(Ok(RequestProgress::TooLarge)) => {
            warn!("Rejecting request over {} bytes", MAX_REQUEST_BYTES);
            create_response(
                413,
                "Payload Too Large",
                &error_body(&format!("request exceeds {} bytes", MAX_REQUEST_BYTES)),
            )
        }
        Ok(Ok(_)) if buffer.is_empty() => return,
        Ok(Ok(_)) => match String::from_utf8(buffer) {
            Ok(request) => handle_request(&request, &state).await,
            Err(_) => create_response(400, "Bad Request", &error_body("request is not valid UTF-8")),
        },
    };
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        error!("Failed to write response: {}", e);
    }
}

/// Offset just past the blank line ending the headers.
fn find_headers_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

fn extract_content_length(head: &str) -> Option<usize> {
    head.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

async fn handle_request(request: &str, state: &AppState) -> String {
    let request_line = request.lines().next().unwrap_or_default();
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        return create_response(400, "Bad Request", &error_body("malformed request line"));
    }

    let method = parts[0];
    let raw_path = parts[1].split('?').next().unwrap_or("/");
    let path = match raw_path.trim_end_matches('/') {
        "" => "/",
        p => p,
    };
    let body = request
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.trim())
        .unwrap_or("");

    debug!("Request: {} {}", method, path);

    let result = match (method, path) {
        ("OPTIONS", _) => return create_response(200, "OK", ""),
        ("GET", "/api/health") => Ok(json!({"status": "ok", "service": "empower-ai"})),
        ("POST", "/api/query") => match parse_body::<QueryBody>(body) {
            Ok(req) => state.service.route(&req.query).and_then(to_json),
            Err(e) => Err(e),
        },
        ("POST", "/api/clarify") => match parse_body::<ClarifyBody>(body) {
            Ok(req) => match state.service.clarify(&req.query, &req.possible_matches).await {
                Ok(outcome) => to_json(outcome),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        },
        ("POST", "/api/schema-mapping") => match parse_body::<SchemaMappingBody>(body) {
            Ok(req) => match state
                .service
                .map_to_schema(&req.query, req.schema.as_deref())
                .await
            {
                Ok(mapping) => Ok(json!({
                    "mapping": mapping,
                    "highlighted": mapping.highlight(&req.query).to_html(),
                })),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        },
        ("POST", "/api/suggestions") => {
            let req = if body.is_empty() {
                Ok(SuggestionsBody::default())
            } else {
                parse_body::<SuggestionsBody>(body)
            };
            match req {
                Ok(req) => match state
                    .service
                    .suggest_queries(req.schema_description.as_deref())
                    .await
                {
                    Ok(suggestions) => Ok(json!({ "suggestedQueries": suggestions })),
                    Err(e) => {
                        warn!("Suggestion generation failed, serving defaults: {}", e);
                        Ok(json!({ "suggestedQueries": DEFAULT_SUGGESTIONS, "fallback": true }))
                    }
                },
                Err(e) => Err(e),
            }
        }
        ("GET", "/api/schema") => to_json(state.service.schema()),
        ("POST", "/api/connect") => match parse_body::<ConnectBody>(body) {
            Ok(req) => match state.service.connect(&req.connection_string).await {
                Ok(info) => Ok(json!({ "success": true, "schemaInfo": info })),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        },
        ("POST", "/api/documents") => match parse_body::<DocumentsBody>(body) {
            Ok(req) => {
                let mut uploader = state.uploader.lock().await;
                uploader.enqueue(req.files);
                let files = uploader.process_pending().await.to_vec();
                Ok(json!({
                    "files": files,
                    "overallProgress": uploader.overall_progress(),
                }))
            }
            Err(e) => Err(e),
        },
        ("GET", "/api/documents") => {
            let uploader = state.uploader.lock().await;
            Ok(json!({
                "files": uploader.entries(),
                "overallProgress": uploader.overall_progress(),
            }))
        }
        ("GET", "/api/dashboard") => to_json(state.service.dashboard()),
        _ => {
            warn!("404: {} {} not found", method, path);
            return create_response(
                404,
                "Not Found",
                &error_body(&format!("Endpoint not found: {} {}", method, path)),
            );
        }
    };

    match result {
        Ok(value) => create_response(200, "OK", &value.to_string()),
        Err(e) => {
            let (status, status_text) = status_for(&e);
            if status >= 500 {
                error!("{} {} failed: {}", method, path, e);
            } else {
                debug!("{} {} rejected: {}", method, path, e);
            }
            create_response(status, status_text, &error_body(&e.to_string()))
        }
    }
}

fn parse_body<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, EmpowerError> {
    serde_json::from_str(body).map_err(|e| EmpowerError::InvalidInput(format!("request body: {}", e)))
}

fn to_json<T: serde::Serialize>(value: T) -> Result<Value, EmpowerError> {
    Ok(serde_json::to_value(value)?)
}

fn status_for(e: &EmpowerError) -> (u16, &'static str) {
    match e {
        EmpowerError::InvalidQuery(_) | EmpowerError::InvalidInput(_) => (400, "Bad Request"),
        EmpowerError::Timeout(_) => (504, "Gateway Timeout"),
        EmpowerError::Unavailable(_)
        | EmpowerError::Llm(_)
        | EmpowerError::Decode(_)
        | EmpowerError::Connection(_) => (502, "Bad Gateway"),
        EmpowerError::Config(_) | EmpowerError::Io(_) | EmpowerError::Json(_) => {
            (500, "Internal Server Error")
        }
    }
}

fn error_body(message: &str) -> String {
    json!({ "error": message }).to_string()
}

fn create_response(status: u16, status_text: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        status,
        status_text,
        body.len(),
        body
    )
}
