use crate::error_handling::types::CommandError;
use crate::session_management::Permission;

pub const USAGE_HELLO: &str = "HELLO <clientId> <ADMIN|READ_ONLY>";
pub const USAGE_READ: &str = "/read <filename>";
pub const USAGE_INFO: &str = "/info <filename>";
pub const USAGE_SEARCH: &str = "/search <keyword>";
pub const USAGE_DELETE: &str = "/delete <filename>";
pub const USAGE_UPLOAD: &str = "/upload <filename> <base64>";
pub const USAGE_DOWNLOAD: &str = "/download <filename>";

/// A parsed `HELLO` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub client_id: String,
    pub permission: Permission,
}

/// Parses `HELLO <clientId> <ADMIN|READ_ONLY>`.
///
/// Exactly three whitespace-separated tokens; the keyword and the role token
/// are matched case-insensitively. Unknown role tokens are a usage error,
/// never a silent default.
pub fn parse_handshake(message: &str) -> Result<Handshake, CommandError> {
    let tokens: Vec<&str> = message.split_whitespace().collect();
    if tokens.len() != 3 || !tokens[0].eq_ignore_ascii_case("HELLO") {
        return Err(CommandError::Usage(USAGE_HELLO));
    }
    let permission = Permission::parse(tokens[2]).ok_or(CommandError::Usage(USAGE_HELLO))?;
    Ok(Handshake {
        client_id: tokens[1].to_string(),
        permission,
    })
}

/// A parsed file command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileCommand {
    List,
    Read(String),
    Info(String),
    Search(String),
    Delete(String),
    Upload { name: String, payload: String },
    Download(String),
}

impl FileCommand {
    /// Commands that mutate or export server state require ADMIN.
    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            FileCommand::Delete(_) | FileCommand::Upload { .. } | FileCommand::Download(_)
        )
    }

    /// Parses a sentinel-prefixed command line.
    ///
    /// Name and keyword arguments may be double-quoted to carry whitespace.
    /// The upload payload is everything after the filename token, untokenized:
    /// base64 text is never quoted.
    pub fn parse(line: &str) -> Result<FileCommand, CommandError> {
        let line = line.trim();
        let (keyword, rest) = match line.find(char::is_whitespace) {
            Some(idx) => (&line[..idx], line[idx..].trim_start()),
            None => (line, ""),
        };

        match keyword.to_ascii_lowercase().as_str() {
            "/list" => Ok(FileCommand::List),
            "/read" => Ok(FileCommand::Read(single_argument(rest, USAGE_READ)?)),
            "/info" => Ok(FileCommand::Info(single_argument(rest, USAGE_INFO)?)),
            "/search" => Ok(FileCommand::Search(single_argument(rest, USAGE_SEARCH)?)),
            "/delete" => Ok(FileCommand::Delete(single_argument(rest, USAGE_DELETE)?)),
            "/download" => Ok(FileCommand::Download(single_argument(rest, USAGE_DOWNLOAD)?)),
            "/upload" => {
                let (name, next) = take_token(rest).ok_or(CommandError::Usage(USAGE_UPLOAD))?;
                let payload = rest[next..].trim_start();
                if payload.is_empty() {
                    return Err(CommandError::Usage(USAGE_UPLOAD));
                }
                Ok(FileCommand::Upload {
                    name,
                    payload: payload.to_string(),
                })
            }
            _ => Err(CommandError::UnknownCommand),
        }
    }
}

/// Splits `input` into tokens, honoring double-quoted segments.
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = input.trim_start();
    while let Some((token, consumed)) = take_token(rest) {
        tokens.push(token);
        rest = rest[consumed..].trim_start();
    }
    tokens
}

/// Reads one token from the front of `input`, returning it together with the
/// byte offset just past it. A token is either a double-quoted run (quotes
/// stripped) or a maximal run of non-whitespace.
fn take_token(input: &str) -> Option<(String, usize)> {
    let input_trimmed = input.trim_start();
    if input_trimmed.is_empty() {
        return None;
    }
    let offset = input.len() - input_trimmed.len();

    if let Some(stripped) = input_trimmed.strip_prefix('"') {
        let end = stripped.find('"')?;
        let token = stripped[..end].to_string();
        return Some((token, offset + end + 2));
    }

    let end = input_trimmed
        .find(char::is_whitespace)
        .unwrap_or(input_trimmed.len());
    Some((input_trimmed[..end].to_string(), offset + end))
}

fn single_argument(rest: &str, usage: &'static str) -> Result<String, CommandError> {
    let (token, consumed) = take_token(rest).ok_or(CommandError::Usage(usage))?;
    if !rest[consumed..].trim().is_empty() {
        return Err(CommandError::Usage(usage));
    }
    Ok(token)
}
