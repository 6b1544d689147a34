use std::path::Path;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::io::ReaderStream;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("path has no file name: {0}")]
    NoFileName(String),
}

#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl DriveClient {
    pub fn new(token: impl Into<String>) -> Result<Self, DriveError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, DriveError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    /// Returns the id of a non-trashed folder named `name` under `parent_id`,
    /// creating it first if no such folder exists.
    pub async fn create_or_get_folder(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<String, DriveError> {
        if let Some(existing) = self.find_by_name(name, parent_id, true).await? {
            return Ok(existing);
        }
        let metadata = FileMetadata {
            name,
            mime_type: Some(FOLDER_MIME_TYPE),
            parents: parent_id.map(|id| vec![id.to_string()]),
        };
        self.create_metadata(&metadata).await
    }

    /// Uploads `local_path` under `parent_id`. If a non-trashed file with the
    /// same base name already exists there, its content is replaced and its id
    /// preserved; otherwise a new file is created.
    pub async fn upload_or_update(
        &self,
        local_path: &Path,
        parent_id: &str,
    ) -> Result<String, DriveError> {
        let name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| DriveError::NoFileName(local_path.display().to_string()))?;
        let file_id = match self.find_by_name(&name, Some(parent_id), false).await? {
            Some(id) => id,
            None => {
                self.create_metadata(&FileMetadata {
                    name: &name,
                    mime_type: None,
                    parents: Some(vec![parent_id.to_string()]),
                })
                .await?
            }
        };
        self.upload_content(&file_id, local_path).await?;
        Ok(file_id)
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<(), DriveError> {
        let url = self.endpoint(&format!("/drive/v3/files/{file_id}"))?;
        let response = self
            .http
            .delete(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(DriveError::Api { status, body })
    }

    pub async fn rename_file(&self, file_id: &str, new_name: &str) -> Result<(), DriveError> {
        let url = self.endpoint(&format!("/drive/v3/files/{file_id}"))?;
        let response = self
            .http
            .patch(url)
            .header("Authorization", self.auth_header_value())
            .json(&RenamePatch { name: new_name })
            .send()
            .await?;
        let _: FileResource = Self::handle_response(response).await?;
        Ok(())
    }

    async fn find_by_name(
        &self,
        name: &str,
        parent_id: Option<&str>,
        folders_only: bool,
    ) -> Result<Option<String>, DriveError> {
        let mut query = format!("name='{}'", escape_query_value(name));
        if let Some(parent) = parent_id {
            query.push_str(&format!(" and '{parent}' in parents"));
        }
        query.push_str(" and trashed=false");
        if folders_only {
            query.push_str(&format!(" and mimeType='{FOLDER_MIME_TYPE}'"));
        }

        let mut url = self.endpoint("/drive/v3/files")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", &query);
            pairs.append_pair("spaces", "drive");
            pairs.append_pair("fields", "files(id, name)");
        }
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        let list: FileList = Self::handle_response(response).await?;
        Ok(list.files.into_iter().next().map(|file| file.id))
    }

    async fn create_metadata(&self, metadata: &FileMetadata<'_>) -> Result<String, DriveError> {
        let mut url = self.endpoint("/drive/v3/files")?;
        url.query_pairs_mut().append_pair("fields", "id");
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .json(metadata)
            .send()
            .await?;
        let created: FileResource = Self::handle_response(response).await?;
        Ok(created.id)
    }

    async fn upload_content(&self, file_id: &str, local_path: &Path) -> Result<(), DriveError> {
        let mut url = self.endpoint(&format!("/upload/drive/v3/files/{file_id}"))?;
        url.query_pairs_mut().append_pair("uploadType", "media");
        let file = tokio::fs::File::open(local_path).await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let response = self
            .http
            .patch(url)
            .header("Authorization", self.auth_header_value())
            .body(body)
            .send()
            .await?;
        let _: FileResource = Self::handle_response(response).await?;
        Ok(())
    }

    fn auth_header_value(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn endpoint(&self, path: &str) -> Result<Url, DriveError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DriveError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(DriveError::Api { status, body })
        }
    }
}

// Single quotes and backslashes must be escaped inside q string literals.
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileMetadata<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parents: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct RenamePatch<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct FileResource {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileResource>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_and_backslashes_in_query_values() {
        assert_eq!(escape_query_value("plain"), "plain");
        assert_eq!(escape_query_value("O'Brien"), "O\\'Brien");
        assert_eq!(escape_query_value("a\\b"), "a\\\\b");
    }
}
