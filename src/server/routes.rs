use crate::config::PipelineConfig;
use crate::server::api::{self, ApiError};

pub struct HttpResponse {
    pub status_code: u16,
    pub status_text: &'static str,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// Set for downloads so the client saves under the generated name.
    pub attachment: Option<String>,
}

impl HttpResponse {
    pub fn head(&self) -> String {
        let disposition = self
            .attachment
            .as_deref()
            .map(|name| {
                format!(
                    "Content-Disposition: attachment; filename*=UTF-8''{}\r\n",
                    urlencoding::encode(name)
                )
            })
            .unwrap_or_default();
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
            self.status_code,
            self.status_text,
            self.content_type,
            self.body.len(),
            disposition
        )
    }

    pub fn to_http_bytes(&self) -> Vec<u8> {
        let mut raw = self.head().into_bytes();
        raw.extend_from_slice(&self.body);
        raw
    }

    /// Body as text; JSON responses are always UTF-8.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub fn route_request(method: &str, path: &str, body: &str, config: &PipelineConfig) -> HttpResponse {
    let path = path.split('?').next().unwrap_or(path);
    match (method, path) {
        ("GET", "/api/health") => match api::health_payload() {
            Ok(payload) => ok_json(payload),
            Err(err) => error_response(500, "Internal Server Error", &err.to_string()),
        },
        ("POST", "/api/process") => api_response(api::process_payload(body, config)),
        ("POST", "/api/merge") => api_response(api::merge_payload(body, config)),
        ("GET", p) if p.starts_with("/api/download/") => {
            let name = &p["/api/download/".len()..];
            match api::download_file(name, config) {
                Ok(download) => HttpResponse {
                    status_code: 200,
                    status_text: "OK",
                    content_type: download.content_type,
                    body: download.bytes,
                    attachment: Some(download.file_name),
                },
                Err(err) => api_error(err),
            }
        }
        _ => error_response(404, "Not Found", "Route not found"),
    }
}

fn api_response(result: Result<String, ApiError>) -> HttpResponse {
    match result {
        Ok(payload) => ok_json(payload),
        Err(err) => api_error(err),
    }
}

fn api_error(err: ApiError) -> HttpResponse {
    match err {
        ApiError::Parse(_) | ApiError::Validation(_) => error_response(400, "Bad Request", &err.to_string()),
        ApiError::NotFound(_) => error_response(404, "Not Found", &err.to_string()),
        ApiError::Pipeline(_) => error_response(422, "Unprocessable Entity", &err.to_string()),
        ApiError::Io(_) | ApiError::Serialize(_) => {
            error_response(500, "Internal Server Error", &err.to_string())
        }
    }
}

fn ok_json(payload: String) -> HttpResponse {
    HttpResponse {
        status_code: 200,
        status_text: "OK",
        content_type: "application/json",
        body: payload.into_bytes(),
        attachment: None,
    }
}

fn error_response(status_code: u16, status_text: &'static str, message: &str) -> HttpResponse {
    HttpResponse {
        status_code,
        status_text,
        content_type: "application/json",
        body: format!(
            "{{\n  \"status\": \"error\",\n  \"message\": {}\n}}",
            serde_json::to_string(message).unwrap_or_else(|_| "\"Unknown error\"".to_string())
        )
        .into_bytes(),
        attachment: None,
    }
}
