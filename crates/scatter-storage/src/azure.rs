#[cfg(feature = "azure")]
mod inner {
    use async_trait::async_trait;
    use azure_storage::StorageCredentials;
    use azure_storage_blobs::prelude::*;

    use scatter_core::provider::ProviderAdapter;

    /// Azure Blob Storage provider.
    pub struct AzureAdapter {
        container_client: ContainerClient,
        name: String,
    }

    impl AzureAdapter {
        /// Create from storage account name + access key.
        pub fn new(
            account: &str,
            access_key: &str,
            container: &str,
            name: &str,
        ) -> anyhow::Result<Self> {
            let credentials = StorageCredentials::access_key(account, access_key.to_string());
            let container_client =
                ClientBuilder::new(account, credentials).container_client(container);

            Ok(Self {
                container_client,
                name: name.to_string(),
            })
        }

        /// Create using the emulator (Azurite).
        pub fn emulator(container: &str, name: &str) -> anyhow::Result<Self> {
            let container_client = ClientBuilder::emulator().container_client(container);

            Ok(Self {
                container_client,
                name: name.to_string(),
            })
        }
    }

    #[async_trait]
    impl ProviderAdapter for AzureAdapter {
        async fn put(&self, key: &str, data: &[u8]) -> anyhow::Result<String> {
            self.container_client
                .blob_client(key)
                .put_block_blob(data.to_vec())
                .await?;
            Ok(key.to_string())
        }

        async fn get(&self, locator: &str) -> anyhow::Result<Vec<u8>> {
            let resp = self
                .container_client
                .blob_client(locator)
                .get_content()
                .await?;
            Ok(resp)
        }

        async fn delete(&self, locator: &str) -> anyhow::Result<()> {
            self.container_client.blob_client(locator).delete().await?;
            Ok(())
        }

        async fn probe(&self) -> anyhow::Result<()> {
            self.container_client.get_properties().await?;
            Ok(())
        }

        fn name(&self) -> &str {
            &self.name
        }
    }
}

#[cfg(feature = "azure")]
pub use inner::AzureAdapter;
