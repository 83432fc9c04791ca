use std::path::Path;

use anyhow::{Context, Result};
use guestvault_crypto::Decrypted;
use reqwest::Url;

use crate::api_client::{ApiClient, FileDetail};
use crate::password;
use crate::pipeline::{self, Failure, Stage};
use crate::render;
use crate::session::TransferSession;

/// What the user pointed at: a numeric id or a detail URL.
#[derive(Debug, PartialEq, Eq)]
pub enum Target {
    Id(i64),
    /// `password` is lifted out of the query string and never sent.
    Url { url: Url, password: Option<String> },
}

impl Target {
    pub fn parse(input: &str) -> Result<Self> {
        if let Ok(id) = input.trim().parse::<i64>() {
            return Ok(Target::Id(id));
        }

        let mut url = Url::parse(input).with_context(|| format!("not a file id or URL: {input}"))?;
        let mut password = None;
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter_map(|(k, v)| {
                if k == "password" {
                    password = Some(v.into_owned());
                    None
                } else {
                    Some((k.into_owned(), v.into_owned()))
                }
            })
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
        Ok(Target::Url { url, password })
    }
}

pub struct DownloadArgs<'a> {
    pub target: &'a str,
    pub password: Option<String>,
    pub output_dir: &'a Path,
}

pub async fn run(api: &ApiClient, args: DownloadArgs<'_>) -> Result<()> {
    let target = Target::parse(args.target)?;
    let mut session = TransferSession::new("download");
    let decrypted = match fetch(api, target, args.password, &mut session).await {
        Ok(d) => d,
        Err(failure) => {
            eprintln!("{failure}");
            return Err(failure.into());
        }
    };

    tracing::debug!(stage = ?Stage::Render, kind = ?decrypted.preview_kind(), "rendering");
    let mut stdout = std::io::stdout().lock();
    let rendered = render::render(&decrypted, args.output_dir, &mut stdout)
        .map_err(|e| Failure::Other(format!("{e:#}")))?;
    eprintln!("{}", render::describe(&rendered));
    Ok(())
}

/// Resolve the target, fetch its bytes and decode them if they are an
/// envelope. On failure the session is back in the ready state.
pub async fn fetch(
    api: &ApiClient,
    target: Target,
    explicit_password: Option<String>,
    session: &mut TransferSession,
) -> Result<Decrypted, Failure> {
    match retrieve(api, target, explicit_password, session).await {
        Ok(decrypted) => {
            session.finish("done");
            Ok(decrypted)
        }
        Err(failure) => {
            session.reset();
            tracing::warn!(stage = ?failure.stage(), "download did not complete");
            Err(failure)
        }
    }
}

async fn retrieve(
    api: &ApiClient,
    target: Target,
    explicit_password: Option<String>,
    session: &mut TransferSession,
) -> Result<Decrypted, Failure> {
    let (detail, raw_url, link_password) = locate(api, target)
        .await
        .map_err(|e| Failure::Download(format!("{e:#}")))?;

    let data = api
        .fetch_raw(raw_url, session)
        .await
        .map_err(|e| Failure::Download(format!("{e:#}")))?;

    if !detail.encrypted {
        return Ok(Decrypted {
            filename: detail.filename,
            mime_type: detail.content_type,
            data,
        });
    }

    let password = password::resolve(explicit_password, link_password, true)
        .map_err(|e| Failure::Other(format!("{e:#}")))?;
    pipeline::decode(&password, &data)
}

/// Detail metadata, the absolute raw URL and any password carried by a link.
async fn locate(api: &ApiClient, target: Target) -> Result<(FileDetail, Url, Option<String>)> {
    match target {
        Target::Id(id) => {
            let detail = api.file_detail(id).await?;
            let raw_url = api.url(&detail.raw_url)?;
            Ok((detail, raw_url, None))
        }
        Target::Url { url, password } => {
            let detail = api.file_detail_at(url.clone()).await?;
            let raw_url = url
                .join(&detail.raw_url)
                .with_context(|| format!("invalid raw URL: {}", detail.raw_url))?;
            Ok((detail, raw_url, password))
        }
    }
}
