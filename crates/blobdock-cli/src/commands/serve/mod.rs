mod router;
mod shutdown;

use std::future::IntoFuture;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use blobdock_storage::{
    AzureBlobStore, BlobStorageService, BlobStore, MemoryBlobStore, StorageSettings,
};
use clap::{Args, ValueEnum};
use tokio::net::TcpListener;
use tracing::{debug, info};

use router::build_router;
use shutdown::Shutdown;

/// Where blobs are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Azure Blob Storage account (or an Azurite emulator)
    Azure,
    /// In-process store, lost on exit
    Memory,
}

/// Storage account settings; each overrides the same key from `--config`
#[derive(Args, Clone)]
pub struct StorageArgs {
    /// Storage account endpoint, e.g. https://myaccount.blob.core.windows.net
    #[arg(long, env = "BLOBDOCK_ACCOUNT_URL")]
    pub account_url: Option<String>,

    /// Container served by the API
    #[arg(long, env = "BLOBDOCK_CONTAINER")]
    pub container: Option<String>,

    /// Microsoft Entra tenant of the service principal
    #[arg(long, env = "BLOBDOCK_TENANT_ID")]
    pub tenant_id: Option<String>,

    /// Service principal application id
    #[arg(long, env = "BLOBDOCK_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Service principal secret
    #[arg(long, env = "BLOBDOCK_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Shared access signature, instead of a service principal
    #[arg(long, env = "BLOBDOCK_SAS_TOKEN", hide_env_values = true)]
    pub sas_token: Option<String>,

    /// Sign-in authority for the service principal
    #[arg(long, env = "BLOBDOCK_AUTHORITY_HOST")]
    pub authority_host: Option<String>,
}

impl From<StorageArgs> for StorageSettings {
    fn from(args: StorageArgs) -> Self {
        StorageSettings {
            storage_account_url: args.account_url,
            container: args.container,
            tenant_id: args.tenant_id,
            client_id: args.client_id,
            client_secret: args.client_secret,
            sas_token: args.sas_token,
            authority_host: args.authority_host,
        }
    }
}

#[derive(Args)]
pub struct ServeCommand {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1:3000", env = "BLOBDOCK_ADDRESS")]
    pub address: String,

    /// Storage backend
    #[arg(long, value_enum, default_value_t = Backend::Azure, env = "BLOBDOCK_BACKEND")]
    pub backend: Backend,

    /// Settings file (JSON or YAML) with an `ApplicationCredential` section
    #[arg(long, env = "BLOBDOCK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub storage: StorageArgs,

    /// Largest accepted upload body, in bytes
    #[arg(long, default_value_t = 256 * 1024 * 1024, env = "BLOBDOCK_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: usize,

    /// Seconds in-flight requests may take to finish after a shutdown signal
    #[arg(long, default_value_t = 30, env = "BLOBDOCK_SHUTDOWN_TIMEOUT")]
    pub shutdown_timeout: u64,
}

impl ServeCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run())
    }

    async fn run(self) -> anyhow::Result<()> {
        let settings = self.settings()?;
        debug!("Resolved storage settings: {:?}", settings);

        let store = open_store(self.backend, &settings)?;
        info!(
            "Serving container {} of storage account {} ({:?} backend)",
            store.container_name(),
            store.account_name(),
            self.backend
        );
        let blob_service = Arc::new(BlobStorageService::new(store));

        let shutdown = Shutdown::default();
        let app = build_router(blob_service, shutdown.abort_token(), self.max_upload_bytes);

        let listener = TcpListener::bind(&self.address).await?;
        info!("Blobdock API listening on {}", self.address);
        info!("Swagger UI available at http://{}/swagger-ui", self.address);

        tokio::spawn(
            shutdown
                .clone()
                .watch(Duration::from_secs(self.shutdown_timeout)),
        );

        let server = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.clone().draining())
            .into_future();
        shutdown.serve_until_aborted(server).await?;

        info!("Blobdock API server exited");
        Ok(())
    }

    /// File settings overlaid with command line and environment values
    fn settings(&self) -> anyhow::Result<StorageSettings> {
        let base = match &self.config {
            Some(path) => {
                debug!("Loading storage settings from {}", path.display());
                StorageSettings::from_file(path)?
            }
            None => StorageSettings::default(),
        };

        Ok(base.merge(StorageSettings::from(self.storage.clone())))
    }
}

fn open_store(backend: Backend, settings: &StorageSettings) -> anyhow::Result<Arc<dyn BlobStore>> {
    match backend {
        Backend::Azure => {
            let handle = settings.container_builder()?.build()?;
            Ok(Arc::new(AzureBlobStore::new(handle)))
        }
        Backend::Memory => Ok(Arc::new(MemoryBlobStore::new(
            "memory",
            settings.container_or_default(),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        serve: ServeCommand,
    }

    #[test]
    fn test_memory_backend_needs_no_credentials() {
        let cli = TestCli::parse_from(["blobdock", "--backend", "memory", "--container", "uploads"]);
        let settings = cli.serve.settings().unwrap();

        let store = open_store(cli.serve.backend, &settings).unwrap();
        assert_eq!(store.container_name(), "uploads");
        assert_eq!(store.account_name(), "memory");
    }

    #[test]
    fn test_azure_backend_requires_a_credential() {
        let cli = TestCli::parse_from([
            "blobdock",
            "--account-url",
            "https://myaccount.blob.core.windows.net",
        ]);
        let settings = cli.serve.settings().unwrap();
        assert!(open_store(Backend::Azure, &settings).is_err());
    }

    #[test]
    fn test_azure_backend_with_sas_token() {
        let cli = TestCli::parse_from([
            "blobdock",
            "--account-url",
            "http://127.0.0.1:10000/devstoreaccount1",
            "--container",
            "files",
            "--sas-token",
            "sv=2022-11-02&ss=b&srt=co&sp=rwdlac&sig=c2lnbmF0dXJl",
        ]);
        let settings = cli.serve.settings().unwrap();

        let store = open_store(Backend::Azure, &settings).unwrap();
        assert_eq!(store.account_name(), "devstoreaccount1");
        assert_eq!(store.container_name(), "files");
    }
}
