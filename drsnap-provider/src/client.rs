//! `ProviderClient` trait and its `az` CLI implementation.

use async_trait::async_trait;
use drsnap_config::RetrySettings;
use drsnap_core::{CommandExecutor, CommandResult};
use tracing::debug;

use crate::command::{AzCommand, AzOps, Idempotency};
use crate::error::{ProviderError, ProviderResult};
use crate::models::{SnapshotRequest, SnapshotResponse, VmDetail, VmDetailResponse};

/// The operations drsnap performs against the cloud.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Identity of the logged-in user.
    async fn current_user(&self) -> ProviderResult<String>;

    /// Make `subscription_id` the process-wide active subscription.
    async fn set_subscription(&self, subscription_id: &str) -> ProviderResult<()>;

    async fn vm_details(&self, resource_id: &str) -> ProviderResult<VmDetail>;

    async fn create_snapshot(&self, request: &SnapshotRequest) -> ProviderResult<SnapshotResponse>;
}

/// Provider client that shells out to the `az` CLI through a [`CommandExecutor`].
#[derive(Debug, Clone)]
pub struct AzCliClient {
    executor: CommandExecutor,
    binary: String,
    retry: RetrySettings,
}

impl AzCliClient {
    pub fn new(executor: CommandExecutor, binary: impl Into<String>, retry: RetrySettings) -> Self {
        Self {
            executor,
            binary: binary.into(),
            retry,
        }
    }

    async fn run(&self, command: AzCommand) -> ProviderResult<CommandResult> {
        let policy = match command.idempotency() {
            Idempotency::Idempotent => self.retry.policy(),
            Idempotency::NonIdempotent => self.retry.non_idempotent_policy(),
        };
        let spec = command.build();
        let result = self.executor.execute(&spec, policy).await;

        if result.success() {
            Ok(result)
        } else {
            Err(ProviderError::CommandFailed {
                command: spec.to_string(),
                exit_code: result.exit_code,
                stderr: result.stderr,
            })
        }
    }
}

#[async_trait]
impl ProviderClient for AzCliClient {
    async fn current_user(&self) -> ProviderResult<String> {
        let result = self.run(AzOps::current_user(&self.binary)).await?;
        let user = result.stdout.trim();
        if user.is_empty() {
            return Err(ProviderError::NoIdentity);
        }
        Ok(user.to_string())
    }

    async fn set_subscription(&self, subscription_id: &str) -> ProviderResult<()> {
        self.run(AzOps::set_subscription(&self.binary, subscription_id))
            .await
            .map(|_| ())
    }

    async fn vm_details(&self, resource_id: &str) -> ProviderResult<VmDetail> {
        let command = AzOps::vm_details(&self.binary, resource_id);
        let command_line = command.build().to_string();
        let result = self.run(command).await?;

        let malformed = |reason: String| ProviderError::MalformedResponse {
            command: command_line.clone(),
            reason,
        };

        let response: VmDetailResponse =
            serde_json::from_str(&result.stdout).map_err(|e| malformed(e.to_string()))?;

        let resource_group = response
            .resource_group
            .filter(|rg| !rg.is_empty())
            .ok_or_else(|| malformed("missing resourceGroup".to_string()))?;
        let disk_id = response
            .disk_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| malformed("missing managed OS disk id".to_string()))?;

        debug!(resource_id, %resource_group, %disk_id, "Fetched VM details");
        Ok(VmDetail {
            resource_group,
            disk_id,
        })
    }

    async fn create_snapshot(&self, request: &SnapshotRequest) -> ProviderResult<SnapshotResponse> {
        let command = AzOps::create_snapshot(
            &self.binary,
            &request.name,
            &request.resource_group,
            &request.source_disk_id,
            &request.tags,
        );
        let command_line = command.build().to_string();
        let result = self.run(command).await?;

        let document: serde_json::Value = serde_json::from_str(&result.stdout).map_err(|e| {
            ProviderError::MalformedResponse {
                command: command_line,
                reason: e.to_string(),
            }
        })?;

        Ok(SnapshotResponse::from_document(document))
    }
}
