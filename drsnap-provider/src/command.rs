//! `az` command builder.
//!
//! Centralises how provider commands are assembled so every call site gets
//! the same argument layout, and records whether a command is safe to repeat.

use drsnap_core::CommandSpec;

/// Whether re-running a command after an ambiguous failure can change state twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idempotency {
    /// Queries and context switches
    Idempotent,
    /// Resource creation
    NonIdempotent,
}

/// Builder for provider CLI invocations.
#[derive(Debug, Clone)]
pub struct AzCommand {
    binary: String,
    args: Vec<String>,
    idempotency: Idempotency,
}

impl AzCommand {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            args: Vec::new(),
            idempotency: Idempotency::Idempotent,
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Mark the command as creating state.
    pub fn non_idempotent(mut self) -> Self {
        self.idempotency = Idempotency::NonIdempotent;
        self
    }

    pub fn idempotency(&self) -> Idempotency {
        self.idempotency
    }

    pub fn build(&self) -> CommandSpec {
        CommandSpec::new(self.binary.clone()).args(self.args.iter().cloned())
    }
}

/// Pre-configured command patterns for the operations drsnap needs.
pub struct AzOps;

impl AzOps {
    /// `az account show --query user.name -o tsv`
    pub fn current_user(binary: &str) -> AzCommand {
        AzCommand::new(binary).args(["account", "show", "--query", "user.name", "-o", "tsv"])
    }

    /// `az account set --subscription <id>`
    pub fn set_subscription(binary: &str, subscription_id: &str) -> AzCommand {
        AzCommand::new(binary)
            .args(["account", "set", "--subscription"])
            .arg(subscription_id)
    }

    /// `az vm show --ids <rid> --query {resourceGroup:..., diskId:...} -o json`
    pub fn vm_details(binary: &str, resource_id: &str) -> AzCommand {
        AzCommand::new(binary)
            .args(["vm", "show", "--ids"])
            .arg(resource_id)
            .args([
                "--query",
                "{resourceGroup:resourceGroup, diskId:storageProfile.osDisk.managedDisk.id}",
                "-o",
                "json",
            ])
    }

    /// `az snapshot create --name <n> --resource-group <rg> --source <disk> --tags ...`
    pub fn create_snapshot(
        binary: &str,
        name: &str,
        resource_group: &str,
        source_disk_id: &str,
        tags: &[(String, String)],
    ) -> AzCommand {
        let mut cmd = AzCommand::new(binary)
            .args(["snapshot", "create", "--name"])
            .arg(name)
            .arg("--resource-group")
            .arg(resource_group)
            .arg("--source")
            .arg(source_disk_id)
            .non_idempotent();

        if !tags.is_empty() {
            cmd = cmd
                .arg("--tags")
                .args(tags.iter().map(|(k, v)| format!("{}={}", k, v)));
        }
        cmd
    }
}
