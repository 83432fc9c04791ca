use std::future::Future;
use std::path::Path;

use anyhow::{bail, Context, Result};
use guestvault_crypto::{prepare_upload, PlainFile, UploadPayload};
use reqwest::Url;

use crate::api_client::ApiClient;
use crate::commands::list::format_size;
use crate::session::{abortable, TransferSession};

pub async fn run(
    api: &ApiClient,
    file_path: &Path,
    password: &str,
    mime_override: Option<&str>,
) -> Result<()> {
    let payload = prepare(file_path, password, mime_override).await?;

    let mut session = TransferSession::new("upload");
    let detail_url = send(api, &payload, &mut session, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;

    println!(
        "Uploaded{}: {} ({}) -> {}",
        if payload.encrypted { " (encrypted)" } else { "" },
        payload.filename,
        format_size(payload.data.len() as i64),
        detail_url
    );
    Ok(())
}

/// Read the file and encrypt it when a password is set. Nothing touches the
/// network here, so a failure means nothing was uploaded.
pub async fn prepare(
    file_path: &Path,
    password: &str,
    mime_override: Option<&str>,
) -> Result<UploadPayload> {
    let data = tokio::fs::read(file_path)
        .await
        .with_context(|| format!("failed to read file: {}", file_path.display()))?;
    let filename = file_path
        .file_name()
        .and_then(|f| f.to_str())
        .context("file name is not valid UTF-8")?
        .to_string();
    let mime_type = match mime_override {
        Some(m) => m.to_string(),
        None => mime_guess::from_path(file_path)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    };

    prepare_upload(
        PlainFile {
            filename,
            mime_type,
            data,
        },
        password,
    )
    .context("encryption failed; nothing was uploaded")
}

/// POST the payload until it completes or `abort` fires. Either way the
/// session ends up finished or back in the ready state.
pub async fn send<A: Future>(
    api: &ApiClient,
    payload: &UploadPayload,
    session: &mut TransferSession,
    abort: A,
) -> Result<Url> {
    tracing::info!(
        file = %payload.filename,
        encrypted = payload.encrypted,
        size = payload.data.len(),
        "uploading"
    );

    session.begin(None);
    match abortable(api.upload(payload), abort).await {
        Ok(Ok(url)) => {
            session.record(payload.data.len() as u64);
            session.finish("done");
            Ok(url)
        }
        Ok(Err(e)) => {
            session.reset();
            Err(e)
        }
        Err(aborted) => {
            session.reset();
            tracing::warn!(error = %aborted, "upload interrupted");
            bail!("upload aborted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prepare_plain_keeps_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, b"png").unwrap();

        let payload = prepare(&path, "", None).await.unwrap();
        assert!(!payload.encrypted);
        assert_eq!(payload.filename, "photo.png");
        assert_eq!(payload.content_type, "image/png");

        let payload = prepare(&path, "", Some("text/plain")).await.unwrap();
        assert_eq!(payload.content_type, "text/plain");
    }

    #[tokio::test]
    async fn test_prepare_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = prepare(&dir.path().join("nope.txt"), "", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to read file"));
    }
}
