//! Credential kinds accepted by the container client builder

use std::fmt;
use std::sync::Arc;

use azure_identity::ClientSecretCredential;
use azure_storage::StorageCredentials;
use url::Url;

use crate::error::StorageError;

/// Microsoft Entra authority used for service-principal sign-in
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// How requests to the storage account are authorised.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Service principal: tokens are obtained from the authority host.
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
    /// Pre-issued shared access signature, with or without a leading `?`.
    SasToken(String),
}

impl Credential {
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::ClientSecret { .. } => "client-secret",
            Credential::SasToken(_) => "sas-token",
        }
    }

    /// Resolve into SDK credentials. Nothing is sent over the network here;
    /// a wrong secret or an expired token only shows up on the first request.
    pub(crate) fn into_storage_credentials(
        self,
        authority_host: &Url,
    ) -> Result<StorageCredentials, StorageError> {
        match self {
            Credential::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
            } => {
                let credential = ClientSecretCredential::new(
                    azure_core::new_http_client(),
                    authority_host.clone(),
                    tenant_id,
                    client_id,
                    client_secret,
                );
                Ok(StorageCredentials::token_credential(Arc::new(credential)))
            }
            Credential::SasToken(token) => {
                let token = token.trim_start_matches('?');
                StorageCredentials::sas_token(token).map_err(|e| {
                    StorageError::InvalidConfiguration(format!("malformed SAS token: {}", e))
                })
            }
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::ClientSecret {
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ClientSecret")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
            Credential::SasToken(_) => f.debug_tuple("SasToken").field(&"<redacted>").finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let credential = Credential::ClientSecret {
            tenant_id: "tenant".to_string(),
            client_id: "client".to_string(),
            client_secret: "hunter2".to_string(),
        };
        let rendered = format!("{:?}", credential);
        assert!(rendered.contains("tenant"));
        assert!(!rendered.contains("hunter2"));

        let sas = Credential::SasToken("sv=2022-11-02&sig=abc".to_string());
        assert!(!format!("{:?}", sas).contains("sig=abc"));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Credential::SasToken(String::new()).kind(), "sas-token");
        assert_eq!(
            Credential::ClientSecret {
                tenant_id: String::new(),
                client_id: String::new(),
                client_secret: String::new(),
            }
            .kind(),
            "client-secret"
        );
    }
}
