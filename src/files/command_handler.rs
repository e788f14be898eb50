use crate::error_handling::types::CommandError;
use crate::protocol::command::FileCommand;
use crate::protocol::response::Response;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Executes file commands against three sandboxed roots.
///
/// Each call is stateless: paths are resolved and validated per command and
/// no lock is held across the filesystem I/O. Every failure is translated
/// into a [`Response`]; nothing propagates back to the caller.
pub struct FileCommandHandler {
    served_dir: PathBuf,
    uploads_dir: PathBuf,
    downloads_dir: PathBuf,
}

impl FileCommandHandler {
    /// Creates the handler, creating the three roots if absent.
    pub fn new(
        served_dir: PathBuf,
        uploads_dir: PathBuf,
        downloads_dir: PathBuf,
    ) -> Result<Self, std::io::Error> {
        fs::create_dir_all(&served_dir)?;
        fs::create_dir_all(&uploads_dir)?;
        fs::create_dir_all(&downloads_dir)?;
        Ok(Self {
            served_dir,
            uploads_dir,
            downloads_dir,
        })
    }

    /// Runs one command and returns its response. Authorization has already
    /// been checked by the dispatcher.
    pub fn handle(&self, command: &FileCommand) -> Response {
        let result = match command {
            FileCommand::List => self.list(),
            FileCommand::Read(name) => self.read(name),
            FileCommand::Info(name) => self.info(name),
            FileCommand::Search(keyword) => self.search(keyword),
            FileCommand::Delete(name) => self.delete(name),
            FileCommand::Upload { name, payload } => self.upload(name, payload),
            FileCommand::Download(name) => self.download(name),
        };
        match result {
            Ok(response) => response,
            Err(e) => {
                debug!("command {:?} failed: {}", command, e);
                e.into()
            }
        }
    }

    fn list(&self) -> Result<Response, CommandError> {
        let names = self.file_names(|_| true)?;
        if names.is_empty() {
            return Ok(Response::Data("(no files)".into()));
        }
        Ok(Response::Data(names.join("\n")))
    }

    fn read(&self, name: &str) -> Result<Response, CommandError> {
        let path = resolve_within(&self.served_dir, name)?;
        let bytes = read_regular_file(&path)?;
        if is_probably_text(&bytes) {
            return Ok(Response::Data(String::from_utf8_lossy(&bytes).into_owned()));
        }
        Ok(base64_response(&path, &bytes))
    }

    fn info(&self, name: &str) -> Result<Response, CommandError> {
        let path = resolve_within(&self.served_dir, name)?;
        let metadata = fs::metadata(&path).map_err(|_| CommandError::NotFound)?;
        if !metadata.is_file() {
            return Err(CommandError::NotFound);
        }
        let modified: DateTime<Utc> = metadata.modified()?.into();
        let body = format!(
            "Name: {}\nSize: {} bytes\nLastModified: {}",
            file_name_of(&path),
            metadata.len(),
            modified.to_rfc3339()
        );
        Ok(Response::Data(body))
    }

    fn search(&self, keyword: &str) -> Result<Response, CommandError> {
        let needle = keyword.to_lowercase();
        let matches = self.file_names(|name| name.to_lowercase().contains(&needle))?;
        if matches.is_empty() {
            return Ok(Response::Data("(no matches)".into()));
        }
        Ok(Response::Data(matches.join("\n")))
    }

    fn delete(&self, name: &str) -> Result<Response, CommandError> {
        let path = resolve_within(&self.served_dir, name)?;
        if !path.is_file() {
            return Err(CommandError::NotFound);
        }
        fs::remove_file(&path)?;
        Ok(Response::Ok("File deleted".into()))
    }

    fn upload(&self, name: &str, payload: &str) -> Result<Response, CommandError> {
        let target = resolve_within(&self.served_dir, name)?;
        let decoded = BASE64
            .decode(payload.trim())
            .map_err(|_| CommandError::InvalidPayload)?;

        fs::write(&target, &decoded)?;
        let mirror = resolve_within(&self.uploads_dir, &file_name_of(&target))?;
        if let Err(e) = fs::write(&mirror, &decoded) {
            warn!("upload mirror write failed for {}: {}", mirror.display(), e);
        }

        Ok(Response::Ok(format!(
            "Uploaded {} ({} bytes)",
            file_name_of(&target),
            decoded.len()
        )))
    }

    fn download(&self, name: &str) -> Result<Response, CommandError> {
        let path = resolve_within(&self.served_dir, name)?;
        let bytes = read_regular_file(&path)?;

        let mirror = resolve_within(&self.downloads_dir, &file_name_of(&path))?;
        if let Err(e) = fs::write(&mirror, &bytes) {
            warn!("download mirror write failed for {}: {}", mirror.display(), e);
        }

        Ok(base64_response(&path, &bytes))
    }

    /// Names of regular files directly under the served root matching
    /// `predicate`, lexicographically sorted.
    fn file_names<F>(&self, predicate: F) -> Result<Vec<String>, CommandError>
    where
        F: Fn(&str) -> bool,
    {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.served_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if predicate(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Resolves `requested` against `root`, rejecting anything that would escape
/// it. Resolution is purely lexical: absolute paths, drive prefixes and `..`
/// traversal past the root all fail with the same generic error, before any
/// filesystem access, so the response cannot leak what exists elsewhere.
fn resolve_within(root: &Path, requested: &str) -> Result<PathBuf, CommandError> {
    if requested.trim().is_empty() {
        return Err(CommandError::PathEscape);
    }
    let mut depth = 0usize;
    let mut resolved = root.to_path_buf();
    for component in Path::new(requested).components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(CommandError::PathEscape);
                }
                resolved.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return Err(CommandError::PathEscape),
        }
    }
    if depth == 0 {
        return Err(CommandError::PathEscape);
    }
    Ok(resolved)
}

fn read_regular_file(path: &Path) -> Result<Vec<u8>, CommandError> {
    if !path.is_file() {
        return Err(CommandError::NotFound);
    }
    Ok(fs::read(path)?)
}

/// Mirrors the text heuristic the service has always used: a NUL byte or any
/// byte below 0x08 marks the content as binary.
fn is_probably_text(data: &[u8]) -> bool {
    !data.iter().any(|&b| b < 0x08)
}

fn base64_response(path: &Path, bytes: &[u8]) -> Response {
    Response::DataBase64 {
        filename: file_name_of(path),
        size: bytes.len(),
        base64: BASE64.encode(bytes),
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
