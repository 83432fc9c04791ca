use anyhow::Result;

use crate::api_client::ApiClient;

pub fn format_size(bytes: i64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

pub async fn run(api: &ApiClient) -> Result<()> {
    let files = api.list_files().await?;

    for file in &files {
        let size = format_size(file.size);
        let marker = if file.encrypted { "locked" } else { "plain " };
        println!(
            "{:>6}  {:>10}  {}  {}  {:<8}  {}",
            file.id,
            size,
            file.uploaded_at,
            marker,
            file.preview.label(),
            file.filename
        );
    }

    println!("\n{} file(s)", files.len());

    Ok(())
}
