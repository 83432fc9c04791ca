//! End-to-end: the CLI client against an in-process server.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::Request;
use axum::middleware::Next;

use guestvault_cli::api_client::ApiClient;
use guestvault_cli::commands::download::{self, Target};
use guestvault_cli::commands::upload;
use guestvault_cli::pipeline::{self, Failure};
use guestvault_cli::render;
use guestvault_cli::session::TransferSession;
use guestvault_crypto::{prepare_upload_with_options, EncryptOptions, PlainFile, PreviewKind};
use guestvault_server::config::AppConfig;
use guestvault_server::db::Database;
use guestvault_server::routes::{app, AppState};
use guestvault_server::storage::BlobStore;
use tempfile::TempDir;

const ADMIN_TOKEN: &str = "roundtrip-admin";
const FAST: EncryptOptions = EncryptOptions { iterations: 1000 };

struct Running {
    addr: SocketAddr,
    /// Every `X-CSRF-Token` value sent with an upload.
    csrf_tokens: Arc<Mutex<Vec<String>>>,
    _dir: TempDir,
}

impl Running {
    fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn client(&self) -> ApiClient {
        ApiClient::new(&self.endpoint()).unwrap()
    }
}

async fn spawn_server() -> Running {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        port: 0,
        data_dir: dir.path().to_path_buf(),
        admin_token: ADMIN_TOKEN.into(),
        max_content_length: 4 * 1024 * 1024,
    };
    let state = AppState {
        db: Database::open_in_memory().unwrap(),
        store: BlobStore::new(config.upload_dir()),
        config,
    };

    let csrf_tokens = Arc::new(Mutex::new(Vec::new()));
    let seen = csrf_tokens.clone();
    let router = app(state).layer(axum::middleware::from_fn(move |req: Request, next: Next| {
        let seen = seen.clone();
        async move {
            let token = req
                .headers()
                .get("x-csrf-token")
                .and_then(|v| v.to_str().ok())
                .filter(|_| req.uri().path() == "/upload");
            if let Some(token) = token {
                seen.lock().unwrap().push(token.to_string());
            }
            next.run(req).await
        }
    }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    Running {
        addr,
        csrf_tokens,
        _dir: dir,
    }
}

/// Accepts connections and never answers.
async fn spawn_stalled_server() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

fn plain(name: &str, mime: &str, data: &[u8]) -> PlainFile {
    PlainFile {
        filename: name.into(),
        mime_type: mime.into(),
        data: data.to_vec(),
    }
}

#[tokio::test]
async fn test_encrypted_upload_download_decode() {
    let server = spawn_server().await;
    let api = server.client();

    let payload =
        prepare_upload_with_options(plain("notes.txt", "text/plain", b"hello world"), "correct-horse", &FAST)
            .unwrap();
    let detail_url = api.upload(&payload).await.unwrap();
    assert!(detail_url.path().starts_with("/files/"));

    let detail = api.file_detail_at(detail_url).await.unwrap();
    assert!(detail.encrypted);
    assert_eq!(detail.filename, "notes.txt.enc");
    assert_eq!(detail.content_type, "application/octet-stream");

    let mut session = TransferSession::hidden("download");
    let raw = api
        .fetch_raw(api.url(&detail.raw_url).unwrap(), &mut session)
        .await
        .unwrap();
    assert_eq!(raw, payload.data);
    assert_eq!(session.received(), raw.len() as u64);

    let decrypted = pipeline::decode("correct-horse", &raw).unwrap();
    assert_eq!(decrypted.filename, "notes.txt");
    assert_eq!(decrypted.mime_type, "text/plain");
    assert_eq!(decrypted.data, b"hello world");
    assert_eq!(decrypted.preview_kind(), PreviewKind::Text);

    let out = tempfile::tempdir().unwrap();
    let mut inline = Vec::new();
    let rendered = render::render(&decrypted, out.path(), &mut inline).unwrap();
    assert_eq!(std::fs::read(&rendered.path).unwrap(), b"hello world");
    assert_eq!(inline, b"hello world\n");
}

#[tokio::test]
async fn test_wrong_password_is_a_decryption_failure() {
    let server = spawn_server().await;
    let api = server.client();

    let payload =
        prepare_upload_with_options(plain("a.png", "image/png", &[0x89, b'P', b'N', b'G']), "right", &FAST)
            .unwrap();
    let detail = api.file_detail_at(api.upload(&payload).await.unwrap()).await.unwrap();

    let mut session = TransferSession::hidden("download");
    let raw = api
        .fetch_raw(api.url(&detail.raw_url).unwrap(), &mut session)
        .await
        .unwrap();

    let err = pipeline::decode("wrong", &raw).unwrap_err();
    assert!(matches!(err, Failure::Decryption));
    assert_eq!(err.to_string(), "decryption failed (wrong password?)");
}

#[tokio::test]
async fn test_plain_upload_keeps_name_and_type() {
    let server = spawn_server().await;
    let api = server.client();

    let payload =
        prepare_upload_with_options(plain("song.mp3", "audio/mpeg", b"ID3fake"), "", &FAST).unwrap();
    assert!(!payload.encrypted);
    let detail = api.file_detail_at(api.upload(&payload).await.unwrap()).await.unwrap();

    assert!(!detail.encrypted);
    assert_eq!(detail.filename, "song.mp3");
    assert_eq!(detail.content_type, "audio/mpeg");
    assert_eq!(detail.preview, PreviewKind::Audio);

    let files = api.list_files().await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].id, detail.id);
}

#[tokio::test]
async fn test_missing_file_fails_to_fetch() {
    let server = spawn_server().await;
    let api = server.client();

    assert!(api.file_detail(999).await.is_err());

    let mut session = TransferSession::hidden("download");
    let err = api
        .fetch_raw(api.url("/raw/999").unwrap(), &mut session)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("404"), "{err:#}");
}

#[tokio::test]
async fn test_csrf_header_reaches_server() {
    let server = spawn_server().await;
    let api = server.client().with_csrf_token("token-from-page");

    let payload = prepare_upload_with_options(plain("x.bin", "application/octet-stream", b"\x00\x01"), "", &FAST)
        .unwrap();
    let url = api.upload(&payload).await.unwrap();
    assert!(url.path().starts_with("/files/"));
    assert_eq!(
        *server.csrf_tokens.lock().unwrap(),
        vec!["token-from-page".to_string()]
    );

    // without a configured token nothing is sent
    server.client().upload(&payload).await.unwrap();
    assert_eq!(server.csrf_tokens.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_link_target_resolves_detail_url() {
    let server = spawn_server().await;
    let api = server.client();

    let payload =
        prepare_upload_with_options(plain("doc.txt", "text/plain", b"shared"), "pw", &FAST).unwrap();
    let detail_url = api.upload(&payload).await.unwrap();

    let link = format!("{detail_url}?password=pw");
    let Target::Url { url, password } = Target::parse(&link).unwrap() else {
        panic!("expected a URL target");
    };
    assert_eq!(url, detail_url);
    assert_eq!(password.as_deref(), Some("pw"));

    let detail = api.file_detail_at(url.clone()).await.unwrap();
    let mut session = TransferSession::hidden("download");
    let raw = api
        .fetch_raw(url.join(&detail.raw_url).unwrap(), &mut session)
        .await
        .unwrap();
    let decrypted = pipeline::decode("pw", &raw).unwrap();
    assert_eq!(decrypted.data, b"shared");
}

#[tokio::test]
async fn test_bulk_delete_needs_admin_token() {
    let server = spawn_server().await;
    let api = server.client();

    let payload = prepare_upload_with_options(plain("gone.txt", "text/plain", b"bye"), "", &FAST).unwrap();
    let detail = api.file_detail_at(api.upload(&payload).await.unwrap()).await.unwrap();

    assert!(api.bulk_delete(&[detail.id]).await.is_err());

    let wrong = server.client().with_admin_token("nope");
    assert!(wrong.bulk_delete(&[detail.id]).await.is_err());

    let admin = server.client().with_admin_token(ADMIN_TOKEN);
    assert_eq!(admin.bulk_delete(&[detail.id]).await.unwrap(), 1);
    assert!(api.list_files().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_abort_resets_session() {
    let addr = spawn_stalled_server().await;
    let api = ApiClient::new(&format!("http://{addr}")).unwrap();
    let payload = prepare_upload_with_options(plain("slow.txt", "text/plain", b"never lands"), "", &FAST)
        .unwrap();

    let mut session = TransferSession::hidden("upload");
    let err = upload::send(&api, &payload, &mut session, tokio::time::sleep(Duration::from_millis(200)))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "upload aborted");
    assert_eq!(session.received(), 0);
}

#[tokio::test]
async fn test_upload_send_finishes_session() {
    let server = spawn_server().await;
    let api = server.client();
    let payload = prepare_upload_with_options(plain("ok.txt", "text/plain", b"lands"), "", &FAST)
        .unwrap();

    let mut session = TransferSession::hidden("upload");
    let url = upload::send(&api, &payload, &mut session, std::future::pending::<()>())
        .await
        .unwrap();
    assert!(url.path().starts_with("/files/"));
    assert_eq!(session.received(), payload.data.len() as u64);
}

#[tokio::test]
async fn test_download_fetch_plain_and_encrypted() {
    let server = spawn_server().await;
    let api = server.client();

    let plain_payload =
        prepare_upload_with_options(plain("clip.mp4", "video/mp4", b"not really mp4"), "", &FAST).unwrap();
    let plain_url = api.upload(&plain_payload).await.unwrap();
    let plain_id: i64 = plain_url.path().trim_start_matches("/files/").parse().unwrap();

    let mut session = TransferSession::hidden("download");
    let decrypted = download::fetch(&api, Target::Id(plain_id), None, &mut session)
        .await
        .unwrap();
    assert_eq!(decrypted.filename, "clip.mp4");
    assert_eq!(decrypted.mime_type, "video/mp4");
    assert_eq!(decrypted.data, b"not really mp4");
    assert_eq!(decrypted.preview_kind(), PreviewKind::Video);

    let sealed =
        prepare_upload_with_options(plain("memo.txt", "text/plain", b"top secret"), "hunter2", &FAST)
            .unwrap();
    let sealed_url = api.upload(&sealed).await.unwrap();

    let mut session = TransferSession::hidden("download");
    let link = Target::parse(&format!("{sealed_url}?password=hunter2")).unwrap();
    let decrypted = download::fetch(&api, link, None, &mut session).await.unwrap();
    assert_eq!(decrypted.filename, "memo.txt");
    assert_eq!(decrypted.data, b"top secret");
    assert_eq!(session.received(), sealed.data.len() as u64);
}

#[tokio::test]
async fn test_download_fetch_failures_reset_session() {
    let server = spawn_server().await;
    let api = server.client();

    let sealed =
        prepare_upload_with_options(plain("memo.txt", "text/plain", b"top secret"), "hunter2", &FAST)
            .unwrap();
    let sealed_url = api.upload(&sealed).await.unwrap();

    // bytes arrive, then the tag check fails
    let mut session = TransferSession::hidden("download");
    let target = Target::parse(sealed_url.as_str()).unwrap();
    let failure = download::fetch(&api, target, Some("wrong".into()), &mut session)
        .await
        .unwrap_err();
    assert!(matches!(failure, Failure::Decryption));
    assert_eq!(session.received(), 0);

    // an unknown id is a download failure, not a raw API error
    let mut session = TransferSession::hidden("download");
    let failure = download::fetch(&api, Target::Id(4242), None, &mut session)
        .await
        .unwrap_err();
    assert!(matches!(failure, Failure::Download(_)), "{failure:?}");
    assert!(failure.to_string().starts_with("download failed:"));
}
