//! Storage account settings

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::client::{ContainerClientBuilder, ContainerClientFinalStep, Credential};
use crate::error::StorageError;

/// Container used when none is configured
pub const DEFAULT_CONTAINER_NAME: &str = "files";

/// Connection settings for one storage account container.
///
/// Field names follow the `ApplicationCredential` section of an
/// `appsettings.json` style file; [`StorageSettings::from_file`] reads that
/// shape (JSON or YAML).
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StorageSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_account_url: Option<String>,

    #[serde(alias = "RootContainer", skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sas_token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority_host: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SettingsFile {
    application_credential: StorageSettings,
}

impl StorageSettings {
    /// Read the `ApplicationCredential` section of a settings file.
    pub fn from_file(path: &Path) -> Result<Self, StorageError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            StorageError::InvalidConfiguration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_document(&raw).map_err(|e| {
            StorageError::InvalidConfiguration(format!("{}: {}", path.display(), e))
        })
    }

    /// Parse a settings document. YAML is a superset of JSON, so both work.
    pub fn from_document(raw: &str) -> Result<Self, StorageError> {
        let file: SettingsFile = serde_yaml::from_str(raw)
            .map_err(|e| StorageError::InvalidConfiguration(e.to_string()))?;
        Ok(file.application_credential)
    }

    /// Layer `overrides` on top of `self`; set fields in `overrides` win.
    pub fn merge(self, overrides: StorageSettings) -> Self {
        Self {
            storage_account_url: overrides.storage_account_url.or(self.storage_account_url),
            container: overrides.container.or(self.container),
            tenant_id: overrides.tenant_id.or(self.tenant_id),
            client_id: overrides.client_id.or(self.client_id),
            client_secret: overrides.client_secret.or(self.client_secret),
            sas_token: overrides.sas_token.or(self.sas_token),
            authority_host: overrides.authority_host.or(self.authority_host),
        }
    }

    pub fn container_or_default(&self) -> &str {
        self.container.as_deref().unwrap_or(DEFAULT_CONTAINER_NAME)
    }

    /// The single credential these settings describe.
    ///
    /// A SAS token and service-principal fields are mutually exclusive;
    /// supplying both, neither, or an incomplete service principal is an error.
    pub fn credential(&self) -> Result<Credential, StorageError> {
        let principal = [&self.tenant_id, &self.client_id, &self.client_secret];
        let principal_fields = principal.iter().filter(|field| field.is_some()).count();

        match (&self.sas_token, principal_fields) {
            (Some(_), n) if n > 0 => Err(StorageError::InvalidConfiguration(
                "configure either a SAS token or a service principal, not both".to_string(),
            )),
            (Some(token), _) => Ok(Credential::SasToken(token.clone())),
            (None, 3) => Ok(Credential::ClientSecret {
                tenant_id: self.tenant_id.clone().unwrap_or_default(),
                client_id: self.client_id.clone().unwrap_or_default(),
                client_secret: self.client_secret.clone().unwrap_or_default(),
            }),
            (None, 0) => Err(StorageError::InvalidConfiguration(
                "no credential configured: set a SAS token or tenant id, client id and client secret"
                    .to_string(),
            )),
            (None, _) => Err(StorageError::InvalidConfiguration(
                "incomplete service principal: tenant id, client id and client secret are all required"
                    .to_string(),
            )),
        }
    }

    /// A builder with endpoint, container and credential attached.
    pub fn container_builder(&self) -> Result<ContainerClientFinalStep, StorageError> {
        let account_url = self.storage_account_url.as_deref().ok_or_else(|| {
            StorageError::InvalidConfiguration("storage account url is required".to_string())
        })?;

        let mut builder = ContainerClientBuilder::new(account_url, self.container_or_default());
        if let Some(authority_host) = &self.authority_host {
            builder = builder.authority_host(authority_host.as_str());
        }

        Ok(builder.with_credential(self.credential()?))
    }
}

impl fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("StorageSettings")
            .field("storage_account_url", &self.storage_account_url)
            .field("container", &self.container)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("sas_token", &redact(&self.sas_token))
            .field("authority_host", &self.authority_host)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn principal() -> StorageSettings {
        StorageSettings {
            storage_account_url: Some("https://myaccount.blob.core.windows.net".to_string()),
            container: Some("files".to_string()),
            tenant_id: Some("tenant".to_string()),
            client_id: Some("client".to_string()),
            client_secret: Some("secret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_appsettings_json_section() {
        let raw = r#"{
            "Logging": { "LogLevel": { "Default": "Information" } },
            "ApplicationCredential": {
                "TenantId": "tenant",
                "ClientId": "client",
                "ClientSecret": "secret",
                "StorageAccountUrl": "https://myaccount.blob.core.windows.net",
                "RootContainer": "uploads"
            }
        }"#;

        let settings = StorageSettings::from_document(raw).unwrap();
        assert_eq!(settings.container.as_deref(), Some("uploads"));
        assert_eq!(settings.tenant_id.as_deref(), Some("tenant"));
        assert!(matches!(
            settings.credential().unwrap(),
            Credential::ClientSecret { .. }
        ));
    }

    #[test]
    fn test_from_file_reads_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "ApplicationCredential:\n  StorageAccountUrl: http://127.0.0.1:10000/devstoreaccount1\n  Container: files\n  SasToken: sv=2022-11-02&sig=abc"
        )
        .unwrap();

        let settings = StorageSettings::from_file(file.path()).unwrap();
        assert_eq!(
            settings.credential().unwrap(),
            Credential::SasToken("sv=2022-11-02&sig=abc".to_string())
        );
        assert_eq!(settings.container_or_default(), "files");
    }

    #[test]
    fn test_from_file_missing_is_configuration_error() {
        let result = StorageSettings::from_file(Path::new("/nonexistent/appsettings.json"));
        assert!(matches!(result, Err(StorageError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_merge_prefers_overrides() {
        let overrides = StorageSettings {
            container: Some("override".to_string()),
            ..Default::default()
        };
        let merged = principal().merge(overrides);
        assert_eq!(merged.container.as_deref(), Some("override"));
        assert_eq!(merged.client_id.as_deref(), Some("client"));
    }

    #[test]
    fn test_credentials_are_mutually_exclusive() {
        let both = StorageSettings {
            sas_token: Some("sv=1&sig=x".to_string()),
            ..principal()
        };
        assert!(matches!(
            both.credential(),
            Err(StorageError::InvalidConfiguration(_))
        ));

        let neither = StorageSettings::default();
        assert!(neither.credential().is_err());

        let partial = StorageSettings {
            client_secret: None,
            ..principal()
        };
        assert!(partial.credential().is_err());
    }

    #[test]
    fn test_container_builder_requires_url() {
        let settings = StorageSettings {
            storage_account_url: None,
            ..principal()
        };
        assert!(settings.container_builder().is_err());

        let handle = principal().container_builder().unwrap().build().unwrap();
        assert_eq!(handle.container_name(), "files");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", principal());
        assert!(!rendered.contains("\"secret\""));
        assert!(rendered.contains("<redacted>"));
    }
}
