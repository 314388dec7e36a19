// Single-file path: upload one local file and mint a share link for it.
// Strictly sequential; the first error aborts the remaining steps and
// nothing already created remotely is rolled back.

use crate::api::{ApiClient, ShareLink, UploadResult};
use crate::error::{ApiError, Result};
use std::path::Path;
use tracing::info;

/// Accept an upload response only if it describes exactly one file.
pub fn single_upload(mut results: Vec<UploadResult>) -> Result<UploadResult> {
    match results.len() {
        1 => Ok(results.remove(0)),
        count => Err(ApiError::Cardinality { count }),
    }
}

/// Upload `local` to the repository root and share the uploaded file.
pub async fn upload_and_share(client: &ApiClient, local: &Path) -> Result<ShareLink> {
    let upload = single_upload(client.upload_file(local).await?)?;
    info!(name = %upload.name, id = %upload.id, size = upload.size, "uploaded file");

    let share = client.create_share_link(&upload.name).await?;
    info!(link = %share.link, path = %share.path, "created share link");
    Ok(share)
}
