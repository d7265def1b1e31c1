// Print the authenticated provider identity

use anyhow::{Context, Result};
use drsnap_config::AppConfig;
use drsnap_core::snap_println;
use drsnap_provider::ProviderClient;

use super::provider;

pub async fn handle_whoami(config: &AppConfig) -> Result<()> {
    let user = provider(config).current_user().await.context(
        "Failed to retrieve user ID from the provider CLI. Ensure you are logged in with 'az login'.",
    )?;
    snap_println!("{}", user);
    Ok(())
}
