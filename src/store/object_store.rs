use std::{path::Path, sync::Arc, time::Instant};

use object_store::{
    aws::AmazonS3Builder, Attribute, AttributeValue, Attributes, PutMultipartOpts, WriteMultipart,
};
use tokio::io::AsyncReadExt;
use url::Url;

use crate::{
    config::ObjectStorage,
    init_metrics::{OBJECT_STORAGE_DELETE, OBJECT_STORAGE_PUT},
    store::{Store, StorageKey, StoreError},
};

const CHUNK_SIZE: usize = 1024 * 64;
const MAX_CONCURRENT_PARTS: usize = 4;

#[derive(Clone)]
pub(crate) struct ObjectStore {
    inner: Arc<dyn object_store::ObjectStore>,
    public_endpoint: Url,
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("inner", &self.inner.to_string())
            .field("public_endpoint", &self.public_endpoint.as_str())
            .finish()
    }
}

impl ObjectStore {
    pub(crate) fn build(
        ObjectStorage {
            bucket_name,
            region,
            endpoint,
            use_path_style,
            access_key,
            secret_key,
            session_token,
            public_endpoint,
        }: &ObjectStorage,
    ) -> Result<Self, StoreError> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(bucket_name)
            .with_region(region)
            .with_virtual_hosted_style_request(!use_path_style);

        if let Some(endpoint) = endpoint {
            builder = builder
                .with_endpoint(endpoint.as_str())
                .with_allow_http(endpoint.scheme() == "http");
        }

        if let Some(access_key) = access_key {
            builder = builder.with_access_key_id(access_key);
        }

        if let Some(secret_key) = secret_key {
            builder = builder.with_secret_access_key(secret_key);
        }

        if let Some(session_token) = session_token {
            builder = builder.with_token(session_token);
        }

        Ok(Self::new(Arc::new(builder.build()?), public_endpoint.clone()))
    }

    pub(crate) fn new(inner: Arc<dyn object_store::ObjectStore>, public_endpoint: Url) -> Self {
        ObjectStore {
            inner,
            public_endpoint,
        }
    }

    async fn upload(
        &self,
        upload: &mut WriteMultipart,
        path: &Path,
    ) -> Result<(), StoreError> {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(StoreError::Read)?;

        let mut buf = vec![0u8; CHUNK_SIZE];

        loop {
            let n = file.read(&mut buf).await.map_err(StoreError::Read)?;

            if n == 0 {
                break;
            }

            upload.wait_for_capacity(MAX_CONCURRENT_PARTS).await?;
            upload.write(&buf[..n]);
        }

        Ok(())
    }
}

#[async_trait::async_trait(?Send)]
impl Store for ObjectStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.inner.list_with_delimiter(None).await?;

        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, key, path), fields(%key))]
    async fn save_file(
        &self,
        key: &StorageKey,
        path: &Path,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let start = Instant::now();

        let attributes = Attributes::from_iter([(
            Attribute::ContentType,
            AttributeValue::from(content_type.to_string()),
        )]);

        let multipart = self
            .inner
            .put_multipart_opts(
                &key.as_path(),
                PutMultipartOpts {
                    attributes,
                    ..Default::default()
                },
            )
            .await?;

        let mut upload = WriteMultipart::new(multipart);

        let res = self.upload(&mut upload, path).await;

        let res = match res {
            Ok(()) => upload.finish().await.map(|_| ()).map_err(StoreError::from),
            Err(e) => {
                if let Err(abort_error) = upload.abort().await {
                    tracing::warn!("Failed to abort upload for {key}: {abort_error}");
                }

                Err(e)
            }
        };

        metrics::histogram!(OBJECT_STORAGE_PUT, "success" => res.is_ok().to_string())
            .record(start.elapsed().as_secs_f64());

        res
    }

    #[tracing::instrument(level = "debug", skip(self, key), fields(%key))]
    async fn remove(&self, key: &StorageKey) -> Result<(), StoreError> {
        let start = Instant::now();

        let res = self.inner.delete(&key.as_path()).await;

        metrics::histogram!(OBJECT_STORAGE_DELETE, "success" => res.is_ok().to_string())
            .record(start.elapsed().as_secs_f64());

        Ok(res?)
    }

    fn public_url(&self, key: &StorageKey) -> Result<Url, StoreError> {
        let base = self.public_endpoint.as_str().trim_end_matches('/');

        Url::parse(&format!("{base}/{key}")).map_err(StoreError::PublicUrl)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use object_store::{memory::InMemory, ObjectStore as _};

    use super::ObjectStore;
    use crate::{
        geometry::Geometry,
        store::{StorageKey, Store},
        tmp_file::TmpDir,
    };

    fn store(inner: Arc<InMemory>) -> ObjectStore {
        ObjectStore::new(
            inner,
            "https://cdn.example.com/".parse().expect("valid url"),
        )
    }

    #[actix_web::test]
    async fn saves_file_contents() {
        let inner = Arc::new(InMemory::new());
        let store = store(inner.clone());

        let tmp_dir = TmpDir::init(std::env::temp_dir()).await.expect("tmp dir");
        let file = tmp_dir.tmp_file(Some(".mp4"));
        let contents = vec![7u8; 1024 * 200];
        tokio::fs::write(&file, &contents).await.expect("written");

        let key = StorageKey::generate(Geometry::Landscape);
        store
            .save_file(&key, &file, "video/mp4")
            .await
            .expect("saved");

        let stored = inner
            .get(&key.as_path())
            .await
            .expect("exists")
            .bytes()
            .await
            .expect("readable");

        assert_eq!(stored.as_ref(), contents.as_slice());
    }

    #[actix_web::test]
    async fn missing_file_leaves_nothing_behind() {
        let inner = Arc::new(InMemory::new());
        let store = store(inner.clone());

        let tmp_dir = TmpDir::init(std::env::temp_dir()).await.expect("tmp dir");
        let file = tmp_dir.tmp_file(Some(".mp4"));

        let key = StorageKey::generate(Geometry::Portrait);
        let res = store.save_file(&key, &file, "video/mp4").await;

        assert!(res.is_err());
        assert!(inner.head(&key.as_path()).await.is_err());
    }

    #[actix_web::test]
    async fn remove_deletes_object() {
        let inner = Arc::new(InMemory::new());
        let store = store(inner.clone());

        let tmp_dir = TmpDir::init(std::env::temp_dir()).await.expect("tmp dir");
        let file = tmp_dir.tmp_file(None);
        tokio::fs::write(&file, b"video").await.expect("written");

        let key = StorageKey::generate(Geometry::Other);
        store.save_file(&key, &file, "video/mp4").await.expect("saved");
        store.remove(&key).await.expect("removed");

        assert!(inner.head(&key.as_path()).await.is_err());
    }

    #[test]
    fn public_url_joins_endpoint_and_key() {
        let store = store(Arc::new(InMemory::new()));
        let key = StorageKey::generate(Geometry::Landscape);

        let url = store.public_url(&key).expect("valid url");

        assert_eq!(url.as_str(), format!("https://cdn.example.com/{key}"));
        assert!(url.path().starts_with("/landscape/"));
    }

    #[actix_web::test]
    async fn health_check_lists_bucket() {
        let store = store(Arc::new(InMemory::new()));

        store.health_check().await.expect("healthy");
    }
}
