//! Staged construction of an authenticated container handle
//!
//! ```no_run
//! use blobdock_storage::client::ContainerClientBuilder;
//!
//! # fn main() -> Result<(), blobdock_storage::StorageError> {
//! let handle = ContainerClientBuilder::new("https://myaccount.blob.core.windows.net", "files")
//!     .with_sas_token("sv=2022-11-02&ss=b&srt=co&sp=rwdlac&sig=...")
//!     .build()?;
//! assert_eq!(handle.container_name(), "files");
//! # Ok(())
//! # }
//! ```

mod credential;

use std::fmt;
use std::sync::Arc;

use azure_storage::CloudLocation;
use azure_storage_blobs::prelude::{BlobServiceClient, ClientBuilder, ContainerClient};
use tracing::debug;
use url::{Host, Url};

use crate::error::StorageError;

pub use credential::{Credential, DEFAULT_AUTHORITY_HOST};

/// First step: endpoint and container are known, the credential is not.
#[derive(Debug, Clone)]
pub struct ContainerClientBuilder {
    account_url: String,
    container: String,
    authority_host: String,
}

impl ContainerClientBuilder {
    pub fn new(account_url: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            account_url: account_url.into(),
            container: container.into(),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
        }
    }

    /// Override the sign-in authority (sovereign clouds, test doubles).
    pub fn authority_host(mut self, authority_host: impl Into<String>) -> Self {
        self.authority_host = authority_host.into();
        self
    }

    /// Authenticate as a service principal.
    pub fn with_client_secret(
        self,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> ContainerClientFinalStep {
        self.with_credential(Credential::ClientSecret {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }

    /// Authenticate with a shared access signature.
    pub fn with_sas_token(self, sas_token: impl Into<String>) -> ContainerClientFinalStep {
        self.with_credential(Credential::SasToken(sas_token.into()))
    }

    pub fn with_credential(self, credential: Credential) -> ContainerClientFinalStep {
        ContainerClientFinalStep {
            builder: self,
            credential,
        }
    }
}

/// Last step: everything is attached, only [`build`](Self::build) remains.
#[derive(Debug, Clone)]
pub struct ContainerClientFinalStep {
    builder: ContainerClientBuilder,
    credential: Credential,
}

impl ContainerClientFinalStep {
    pub fn build(self) -> Result<ContainerHandle, StorageError> {
        let ContainerClientBuilder {
            account_url,
            container,
            authority_host,
        } = self.builder;

        let endpoint = Url::parse(&account_url).map_err(|e| {
            StorageError::InvalidConfiguration(format!(
                "invalid storage account url '{}': {}",
                account_url, e
            ))
        })?;
        let authority_host = Url::parse(&authority_host).map_err(|e| {
            StorageError::InvalidConfiguration(format!(
                "invalid authority host '{}': {}",
                authority_host, e
            ))
        })?;
        if container.is_empty() {
            return Err(StorageError::InvalidConfiguration(
                "container name cannot be empty".to_string(),
            ));
        }

        let account = account_name(&endpoint)?;
        let kind = self.credential.kind();
        let credentials = self.credential.into_storage_credentials(&authority_host)?;

        let location = CloudLocation::Custom {
            account: account.clone(),
            uri: endpoint.as_str().trim_end_matches('/').to_string(),
        };
        let service = ClientBuilder::with_location(location.clone(), credentials.clone())
            .blob_service_client();
        let container_client =
            ClientBuilder::with_location(location, credentials).container_client(container.clone());

        debug!(
            "Built container client for {}/{} using {} credentials",
            account, container, kind
        );

        Ok(ContainerHandle {
            inner: Arc::new(HandleInner {
                account,
                container,
                endpoint,
                container_client,
                service,
            }),
        })
    }
}

struct HandleInner {
    account: String,
    container: String,
    endpoint: Url,
    container_client: ContainerClient,
    service: BlobServiceClient,
}

/// Authenticated reference to one container of a storage account.
///
/// Immutable once built and cheap to clone.
#[derive(Clone)]
pub struct ContainerHandle {
    inner: Arc<HandleInner>,
}

impl ContainerHandle {
    pub fn account_name(&self) -> &str {
        &self.inner.account
    }

    pub fn container_name(&self) -> &str {
        &self.inner.container
    }

    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    pub(crate) fn container_client(&self) -> &ContainerClient {
        &self.inner.container_client
    }

    /// Handle for another container in the same account, sharing credentials.
    pub(crate) fn sibling(&self, container: &str) -> ContainerHandle {
        ContainerHandle {
            inner: Arc::new(HandleInner {
                account: self.inner.account.clone(),
                container: container.to_string(),
                endpoint: self.inner.endpoint.clone(),
                container_client: self.inner.service.container_client(container.to_string()),
                service: self.inner.service.clone(),
            }),
        }
    }
}

impl fmt::Debug for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerHandle")
            .field("account", &self.inner.account)
            .field("container", &self.inner.container)
            .field("endpoint", &self.inner.endpoint.as_str())
            .finish()
    }
}

/// Storage account name for an endpoint.
///
/// Public endpoints carry it as the first host label
/// (`myaccount.blob.core.windows.net`); emulator endpoints addressed by IP or
/// `localhost` carry it as the first path segment
/// (`http://127.0.0.1:10000/devstoreaccount1`).
fn account_name(endpoint: &Url) -> Result<String, StorageError> {
    let name = match endpoint.host() {
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) | Some(Host::Domain("localhost")) => endpoint
            .path_segments()
            .and_then(|mut segments| segments.next()),
        Some(Host::Domain(domain)) => domain.split('.').next(),
        None => None,
    };

    name.filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            StorageError::InvalidConfiguration(format!(
                "cannot determine the storage account name from '{}'",
                endpoint
            ))
        })
}
