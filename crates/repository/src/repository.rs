use crate::configuration::Configuration;
use crate::context::Context;
use crate::encryption::derive_key;
use crate::error::{ErrorKind, Result};
use coffer_cache::VfsCache;
use coffer_envelope::hashing::hasher;
use coffer_envelope::{HashingHandle, Mac, ResourceType, seal, unseal_as};
use coffer_storage::BackendHandle;
use exn::ResultExt;

/// An opened repository: one storage backend, one local cache and the
/// hashing provider derived from the configuration (and key, if encrypted).
pub struct Repository {
    ctx: Context,
    backend: BackendHandle,
    configuration: Configuration,
    hashing: HashingHandle,
    cache: VfsCache,
}

impl Repository {
    /// Store a new configuration on an empty backend.
    #[tracing::instrument(skip_all, fields(origin = backend.origin()))]
    pub async fn create(backend: &BackendHandle, configuration: &Configuration) -> Result<()> {
        let bytes = configuration.to_bytes()?;
        match backend.create(&bytes).await {
            Ok(()) => {
                tracing::info!(repository = %configuration.repository_id, "Created repository");
                Ok(())
            },
            Err(e) if matches!(&*e, coffer_storage::error::ErrorKind::AlreadyExists(_)) => {
                Err(e.raise(ErrorKind::Config("a repository already exists at this location".to_string())))
            },
            Err(e) => Err(e.raise(ErrorKind::Storage)),
        }
    }

    /// Read the configuration from the backend and open the repository,
    /// deriving the key from `passphrase` when it is encrypted.
    pub async fn open(ctx: Context, backend: BackendHandle, passphrase: Option<&str>) -> Result<Self> {
        let bytes = match backend.open().await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => {
                return Err(e.raise(ErrorKind::Config("no repository at this location".to_string())));
            },
            Err(e) => return Err(e.raise(ErrorKind::Storage)),
        };
        let configuration = Configuration::from_bytes(&bytes)?;
        let key = match (&configuration.encryption, passphrase) {
            (Some(encryption), Some(passphrase)) => Some(derive_key(&encryption.kdf, passphrase)?),
            (Some(_), None) => exn::bail!(ErrorKind::PassphraseRequired),
            (None, _) => None,
        };
        Self::with_configuration(ctx, key, backend, configuration).await
    }

    /// Open from an already-read serialized configuration and a derived key.
    ///
    /// Fails with a configuration error when the bytes don't decode, when an
    /// encrypted repository gets no key, or when the key doesn't reproduce
    /// the stored canary.
    pub async fn new(ctx: Context, key: Option<[u8; 32]>, backend: BackendHandle, serialized_config: &[u8]) -> Result<Self> {
        let configuration = Configuration::from_bytes(serialized_config)?;
        Self::with_configuration(ctx, key, backend, configuration).await
    }

    async fn with_configuration(
        ctx: Context,
        key: Option<[u8; 32]>,
        backend: BackendHandle,
        configuration: Configuration,
    ) -> Result<Self> {
        let key = match (&configuration.encryption, key) {
            (Some(encryption), Some(key)) => {
                if !encryption.verify(&key) {
                    exn::bail!(ErrorKind::WrongPassphrase);
                }
                Some(key)
            },
            (Some(_), None) => exn::bail!(ErrorKind::PassphraseRequired),
            (None, _) => None,
        };
        let Some(hashing) = hasher(&configuration.hashing, key) else {
            exn::bail!(ErrorKind::Config(format!("unsupported hashing algorithm: {}", configuration.hashing)));
        };
        let cache = ctx
            .cache()
            .vfs(&configuration.repository_id.to_string(), backend.scheme(), backend.origin(), ctx.ephemeral_cache())
            .await
            .or_raise(|| ErrorKind::Cache)?;
        tracing::info!(
            repository = %configuration.repository_id,
            scheme = backend.scheme(),
            origin = backend.origin(),
            encrypted = configuration.is_encrypted(),
            "Opened repository",
        );
        Ok(Self { ctx, backend, configuration, hashing, cache })
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    pub fn cache(&self) -> &VfsCache {
        &self.cache
    }

    pub fn hashing(&self) -> &HashingHandle {
        &self.hashing
    }

    /// Content address of `data` under this repository's hashing provider.
    pub fn compute_mac(&self, data: &[u8]) -> Mac {
        self.hashing.compute(data)
    }

    /// Wrap a payload in an envelope tagged by this repository's provider.
    pub fn seal(&self, resource: ResourceType, payload: &[u8]) -> Vec<u8> {
        seal(&*self.hashing, resource, payload)
    }

    /// Verify and unwrap an envelope produced by [`seal`](Self::seal).
    pub fn unseal(&self, resource: ResourceType, encoded: &[u8]) -> Result<Vec<u8>> {
        let (_version, payload) =
            unseal_as(&*self.hashing, resource, encoded).or_raise(|| ErrorKind::Corrupted(resource.to_string()))?;
        Ok(payload)
    }

    /// Store content bytes under their address, returning the address.
    ///
    /// Already-known content (present in the cache) is not written again.
    pub async fn put_object(&self, data: &[u8]) -> Result<Mac> {
        let mac = self.compute_mac(data);
        if self.cache.has_object(&mac).await.or_raise(|| ErrorKind::Cache)? {
            tracing::trace!(%mac, "Object already stored");
            return Ok(mac);
        }
        let sealed = self.seal(ResourceType::Object, data);
        self.backend.put(ResourceType::Object, &mac.to_hex(), &sealed).await.or_raise(|| ErrorKind::Storage)?;
        self.cache.put_object(&mac, &sealed).await.or_raise(|| ErrorKind::Cache)?;
        Ok(mac)
    }

    /// Fetch content bytes by address: cache first, then the storage backend
    /// (filling the cache on the way back).
    pub async fn get_object(&self, mac: &Mac) -> Result<Vec<u8>> {
        match self.cache.get_object(mac).await {
            Ok(sealed) => return self.open_blob(ResourceType::Object, mac, &sealed),
            Err(e) if e.is_not_found() => {},
            Err(e) => return Err(e.raise(ErrorKind::Cache)),
        }
        let sealed = self.fetch(ResourceType::Object, mac).await?;
        let payload = self.open_blob(ResourceType::Object, mac, &sealed)?;
        self.cache.put_object(mac, &sealed).await.or_raise(|| ErrorKind::Cache)?;
        Ok(payload)
    }

    /// Persist a structural resource (tree index, snapshot header) under a
    /// caller-chosen address.
    pub async fn put_blob(&self, resource: ResourceType, mac: &Mac, payload: &[u8]) -> Result<()> {
        let sealed = self.seal(resource, payload);
        self.backend.put(resource, &mac.to_hex(), &sealed).await.or_raise(|| ErrorKind::Storage)
    }

    pub async fn get_blob(&self, resource: ResourceType, mac: &Mac) -> Result<Vec<u8>> {
        let sealed = self.fetch(resource, mac).await?;
        self.open_blob(resource, mac, &sealed)
    }

    /// Addresses of every stored blob of a resource type.
    pub async fn list_blobs(&self, resource: ResourceType) -> Result<Vec<Mac>> {
        let keys = self.backend.list(resource).await.or_raise(|| ErrorKind::Storage)?;
        Ok(keys
            .into_iter()
            .filter_map(|key| {
                let mac = Mac::from_hex(&key);
                if mac.is_none() {
                    tracing::warn!(%resource, key, "Ignoring blob with a non-address key");
                }
                mac
            })
            .collect())
    }

    /// Release the cache; an ephemeral cache is deleted.
    pub async fn close(self) -> Result<()> {
        self.cache.close().await.or_raise(|| ErrorKind::Cache)
    }

    async fn fetch(&self, resource: ResourceType, mac: &Mac) -> Result<Vec<u8>> {
        match self.backend.get(resource, &mac.to_hex()).await {
            Ok(sealed) => Ok(sealed),
            Err(e) if e.is_not_found() => Err(e.raise(ErrorKind::NotFound(format!("{resource}/{mac}")))),
            Err(e) => Err(e.raise(ErrorKind::Storage)),
        }
    }

    fn open_blob(&self, resource: ResourceType, mac: &Mac, sealed: &[u8]) -> Result<Vec<u8>> {
        let payload = self.unseal(resource, sealed)?;
        if resource == ResourceType::Object && !self.compute_mac(&payload).verify(mac) {
            exn::bail!(ErrorKind::Corrupted(format!("{resource}/{mac}")));
        }
        Ok(payload)
    }
}
