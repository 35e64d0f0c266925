use anyhow::{Context, Result, bail};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use tokio::runtime::Handle;
use tracing::info;

use super::ObjectStore;

/// Connection settings for [`S3Store`].
#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    pub region: String,
    /// Custom endpoint, e.g. a local MinIO or LocalStack.
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
}

/// [`ObjectStore`] backed by AWS S3.
///
/// Credentials come from the default provider chain (environment, profile,
/// instance role). Requests are driven on the runtime the store was created
/// on, so `get`/`put` must be called from a blocking thread.
pub struct S3Store {
    client: Client,
    handle: Handle,
}

impl S3Store {
    pub async fn connect(settings: &S3Settings) -> Result<Self> {
        if settings.region.trim().is_empty() {
            bail!("AWS region cannot be empty");
        }

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(settings.region.clone()));
        if let Some(endpoint) = &settings.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(settings.force_path_style)
            .build();

        info!(
            region = %settings.region,
            endpoint = ?settings.endpoint_url,
            path_style = settings.force_path_style,
            "S3 client initialized"
        );

        Ok(Self {
            client: Client::from_conf(config),
            handle: Handle::current(),
        })
    }
}

impl ObjectStore for S3Store {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.handle.block_on(async {
            let response = self
                .client
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .with_context(|| format!("downloading s3://{bucket}/{key}"))?;

            let data = response
                .body
                .collect()
                .await
                .with_context(|| format!("reading s3://{bucket}/{key}"))?;

            Ok(data.into_bytes().to_vec())
        })
    }

    fn put(&self, bytes: Vec<u8>, content_type: &str, bucket: &str, key: &str) -> Result<()> {
        self.handle.block_on(async {
            self.client
                .put_object()
                .bucket(bucket)
                .key(key)
                .content_type(content_type)
                .body(ByteStream::from(bytes))
                .send()
                .await
                .with_context(|| format!("uploading s3://{bucket}/{key}"))?;
            Ok(())
        })
    }
}
