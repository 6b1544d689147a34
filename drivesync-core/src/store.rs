use std::path::Path;

use async_trait::async_trait;

use crate::client::{DriveClient, DriveError};

/// Remote object store the sync engine writes to. Objects are addressed by
/// opaque stable ids; both create operations are idempotent on name.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Returns the id of the folder named `name` under `parent_id` (or at the
    /// store root when `None`), creating it if it does not exist.
    async fn create_or_get_folder(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<String, DriveError>;

    /// Uploads `local_path` under the folder `parent_id`, replacing the
    /// content of an existing file with the same base name in place.
    async fn upload_or_update(
        &self,
        local_path: &Path,
        parent_id: &str,
    ) -> Result<String, DriveError>;

    async fn delete_file(&self, file_id: &str) -> Result<(), DriveError>;

    async fn rename_file(&self, file_id: &str, new_name: &str) -> Result<(), DriveError>;
}

#[async_trait]
impl RemoteStore for DriveClient {
    async fn create_or_get_folder(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<String, DriveError> {
        DriveClient::create_or_get_folder(self, name, parent_id).await
    }

    async fn upload_or_update(
        &self,
        local_path: &Path,
        parent_id: &str,
    ) -> Result<String, DriveError> {
        DriveClient::upload_or_update(self, local_path, parent_id).await
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), DriveError> {
        DriveClient::delete_file(self, file_id).await
    }

    async fn rename_file(&self, file_id: &str, new_name: &str) -> Result<(), DriveError> {
        DriveClient::rename_file(self, file_id, new_name).await
    }
}
