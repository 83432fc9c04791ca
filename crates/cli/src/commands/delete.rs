use anyhow::{bail, Result};

use crate::api_client::ApiClient;

pub async fn run(api: &ApiClient, ids: &[i64]) -> Result<()> {
    if ids.is_empty() {
        bail!("no file ids given");
    }
    let deleted = api.bulk_delete(ids).await?;
    println!("Deleted {deleted} of {} file(s)", ids.len());
    Ok(())
}
