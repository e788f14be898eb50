use crate::error_handling::types::CommandError;

/// A response ready for serialization into a single datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok(String),
    Err(String),
    /// Plain-text body under a `DATA` header.
    Data(String),
    /// Binary payload carried as base64 with filename/size metadata.
    DataBase64 {
        filename: String,
        size: usize,
        base64: String,
    },
    /// Free-form text sent as-is (handshake confirmation, stats snapshot).
    Raw(String),
}

impl Response {
    pub fn err(detail: impl Into<String>) -> Response {
        Response::Err(detail.into())
    }

    /// Renders the wire form.
    pub fn render(&self) -> String {
        match self {
            Response::Ok(detail) => format!("OK {}", detail),
            Response::Err(detail) => format!("ERR {}", detail),
            Response::Data(body) => format!("DATA\n{}", body),
            Response::DataBase64 {
                filename,
                size,
                base64,
            } => format!(
                "DATA_BASE64\nfilename={}\nsize={}\n{}",
                escape_header_value(filename),
                size,
                base64
            ),
            Response::Raw(text) => text.clone(),
        }
    }
}

impl From<CommandError> for Response {
    fn from(err: CommandError) -> Self {
        Response::Err(err.to_string())
    }
}

/// Filenames land in a line-oriented header; CR/LF would corrupt the framing.
fn escape_header_value(value: &str) -> String {
    value.replace(['\n', '\r'], "_")
}
