use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::watch;
use wavault_core::ConnectionState;

pub struct WebState {
    pub archive_root: PathBuf,
    pub pairing_file: PathBuf,
    pub state_rx: watch::Receiver<ConnectionState>,
}

pub async fn handle_request(
    state: Arc<WebState>,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let path = req.uri().path().to_string();
    match (req.method().as_str(), path.as_str()) {
        ("GET", "/") => Ok(html(
            "<center><h2>wavault archiver is running</h2>\
             <p>Visit <a href=\"/qr\">/qr</a> to scan the pairing code (if one is pending) \
             or <a href=\"/files\">/files</a> for the archive.</p></center>",
        )),
        ("GET", "/health") => Ok(health(&state)),
        ("GET", "/qr") => Ok(qr_page(&state).await),
        ("GET", "/files") => Ok(files_page(&state).await),
        ("GET", p) if p.starts_with("/download/") => {
            Ok(download(&state, &p["/download/".len()..]).await)
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::from(Bytes::from_static(b"not found")))
            .unwrap()),
    }
}

fn connection_label(state: &ConnectionState) -> &'static str {
    match state {
        ConnectionState::Disconnected => "disconnected",
        ConnectionState::Connecting => "connecting",
        ConnectionState::AwaitingPairing => "awaiting-pairing",
        ConnectionState::Open => "open",
        ConnectionState::Closed(_) => "closed",
    }
}

fn health(state: &WebState) -> Response<Full<Bytes>> {
    let connection = connection_label(&state.state_rx.borrow());
    let body = serde_json::json!({"status": "ok", "connection": connection});
    Response::new(Full::from(body.to_string()))
}

async fn qr_page(state: &WebState) -> Response<Full<Bytes>> {
    match fs::read_to_string(&state.pairing_file).await {
        Ok(code) if !code.is_empty() => {
            let img = format!(
                "https://api.qrserver.com/v1/create-qr-code/?data={}&size=300x300",
                percent_encode(&code)
            );
            html(&format!(
                "<center><h3>Scan this code from the linked-devices screen</h3>\
                 <img src=\"{img}\" alt=\"pairing code\"/></center>"
            ))
        }
        // Already paired and an unreachable service read differently to
        // an operator; say which one it is.
        _ => match &*state.state_rx.borrow() {
            ConnectionState::Open => {
                html("<center><h3>Session is paired and connected; no pairing code needed.</h3></center>")
            }
            ConnectionState::Closed(_) => html(
                "<center><h3>Service unreachable; reconnecting. No pairing code available.</h3></center>",
            ),
            _ => html(
                "<center><h3>No pairing code available yet. Wait a few seconds and refresh.</h3></center>",
            ),
        },
    }
}

async fn files_page(state: &WebState) -> Response<Full<Bytes>> {
    let mut names: Vec<String> = Vec::new();
    if let Ok(mut entries) = fs::read_dir(&state.archive_root).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
    }
    if let Ok(mut entries) = fs::read_dir(state.archive_root.join("media")).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                names.push(format!("media/{}", entry.file_name().to_string_lossy()));
            }
        }
    }
    if names.is_empty() {
        return html("<p>No archived files yet</p>");
    }
    names.sort();
    let items: String = names
        .iter()
        .map(|name| {
            format!(
                "<li><a href=\"/download/{}\">{}</a></li>",
                percent_encode(name),
                html_escape(name)
            )
        })
        .collect();
    html(&format!("<h3>Archived files</h3><ul>{items}</ul>"))
}

async fn download(state: &WebState, raw: &str) -> Response<Full<Bytes>> {
    let Some(name) = percent_decode(raw).filter(|n| safe_archive_name(n)) else {
        return status_page(StatusCode::BAD_REQUEST, "bad file name");
    };
    match fs::read(state.archive_root.join(&name)).await {
        Ok(bytes) => Response::builder()
            .header("content-type", "application/octet-stream")
            .header(
                "content-disposition",
                format!("attachment; filename=\"{}\"", name.replace('/', "_")),
            )
            .body(Full::from(Bytes::from(bytes)))
            .unwrap(),
        Err(_) => status_page(StatusCode::NOT_FOUND, "not found"),
    }
}

/// Plain names from the archive root, plus blobs one level down under
/// `media/`. Anything path-like beyond that is rejected.
pub fn safe_archive_name(name: &str) -> bool {
    if name.is_empty() || name.contains('\\') || name.contains("..") {
        return false;
    }
    match name.split('/').collect::<Vec<_>>().as_slice() {
        [file] => !file.is_empty(),
        ["media", file] => !file.is_empty(),
        _ => false,
    }
}

fn html(body: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .header("content-type", "text/html; charset=utf-8")
        .body(Full::from(Bytes::from(body.to_string())))
        .unwrap()
}

fn status_page(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::from(Bytes::from_static(body.as_bytes())))
        .unwrap()
}

pub fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

pub fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            let value = u8::from_str_radix(std::str::from_utf8(hex).ok()?, 16).ok()?;
            out.push(value);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_names_reject_traversal() {
        assert!(safe_archive_name("messages.log"));
        assert!(safe_archive_name("media/1234@s.whatsapp.net_1.jpg"));
        assert!(!safe_archive_name("../etc/passwd"));
        assert!(!safe_archive_name("media/../../creds.json"));
        assert!(!safe_archive_name("/etc/passwd"));
        assert!(!safe_archive_name("media/nested/deep.bin"));
        assert!(!safe_archive_name(""));
    }

    #[test]
    fn percent_round_trip() {
        let name = "media/1234@s.whatsapp.net_170000_ephemeral.mp4";
        let encoded = percent_encode(name);
        assert!(!encoded.contains('@'));
        assert_eq!(percent_decode(&encoded).as_deref(), Some(name));
    }

    #[test]
    fn percent_decode_rejects_truncated_escape() {
        assert!(percent_decode("abc%2").is_none());
        assert!(percent_decode("%zz").is_none());
    }
}
