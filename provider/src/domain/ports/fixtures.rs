//! In-memory port implementations for tests.
//!
//! [`InMemoryPrivx`] bundles one [`InMemoryResourceClient`] per collection
//! together with [`FixturePrincipalKeys`] and [`FixtureDirectory`], so the
//! reconciler and the inbound adapter can be exercised without a server.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use url::Url;
use uuid::Uuid;

use super::{
    AuthFailure, ConfigTarget, ConnectorFactory, Directory, PrincipalKey, PrincipalKeys,
    RemoteError, ResourceClient, ResourceClients,
};
use crate::domain::credentials::Credential;
use crate::domain::kinds::{
    AccessGroup, ApiClient, Host, Role, RoleRef, Secret, Source, TrustedClient,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Records the fixture store can address.
pub trait StoredRecord: Clone + Send + Sync + 'static {
    /// Identifier the record already carries, if any.
    fn stored_id(&self) -> Option<String>;

    /// Stamp a server-assigned identifier.
    fn assign_id(&mut self, id: &str);
}

macro_rules! uuid_addressed {
    ($($record:ty),+ $(,)?) => {
        $(
            impl StoredRecord for $record {
                fn stored_id(&self) -> Option<String> {
                    self.id.clone()
                }

                fn assign_id(&mut self, id: &str) {
                    self.id = Some(id.to_owned());
                }
            }
        )+
    };
}

uuid_addressed!(Host, Role, Source, TrustedClient, ApiClient, AccessGroup);

impl StoredRecord for Secret {
    fn stored_id(&self) -> Option<String> {
        Some(self.name.clone()).filter(|name| !name.is_empty())
    }

    fn assign_id(&mut self, _id: &str) {}
}

type ServerFields<T> = Box<dyn Fn(&mut T, Option<&T>) + Send + Sync>;

/// One remote collection held in memory.
///
/// Objects without an identifier receive a fresh UUID on create. Every call
/// is appended to a log readable through [`Self::calls`], and
/// [`Self::reject_next`] queues failures returned before touching the store;
/// [`Self::reject_call`] fails one specific call.
pub struct InMemoryResourceClient<T> {
    objects: Mutex<BTreeMap<String, T>>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<VecDeque<RemoteError>>,
    targeted: Mutex<BTreeMap<String, RemoteError>>,
    server_fields: Option<ServerFields<T>>,
}

impl<T: StoredRecord> Default for InMemoryResourceClient<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: StoredRecord> InMemoryResourceClient<T> {
    /// Empty collection.
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            targeted: Mutex::new(BTreeMap::new()),
            server_fields: None,
        }
    }

    /// Apply `fill` to every written object, simulating fields the server
    /// owns. The second argument is the stored object being replaced.
    #[must_use]
    pub fn with_server_fields(
        mut self,
        fill: impl Fn(&mut T, Option<&T>) + Send + Sync + 'static,
    ) -> Self {
        self.server_fields = Some(Box::new(fill));
        self
    }

    /// Store `record` directly, returning its identifier.
    pub fn seed(&self, mut record: T) -> String {
        let id = record.stored_id().unwrap_or_else(|| Uuid::new_v4().to_string());
        record.assign_id(&id);
        lock(&self.objects).insert(id.clone(), record);
        id
    }

    /// Current object stored under `id`.
    pub fn stored(&self, id: &str) -> Option<T> {
        lock(&self.objects).get(id).cloned()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Log of calls, formatted as `operation` or `operation:id`.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Fail the next call with `error`.
    pub fn reject_next(&self, error: RemoteError) {
        lock(&self.failures).push_back(error);
    }

    /// Fail the next call logged as `call`, e.g. `delete:db-old`.
    pub fn reject_call(&self, call: impl Into<String>, error: RemoteError) {
        lock(&self.targeted).insert(call.into(), error);
    }

    fn enter(&self, call: String) -> Result<(), RemoteError> {
        let targeted = lock(&self.targeted).remove(&call);
        lock(&self.calls).push(call);
        if let Some(error) = targeted {
            return Err(error);
        }
        lock(&self.failures).pop_front().map_or(Ok(()), Err)
    }

    fn not_found(id: &str) -> RemoteError {
        RemoteError::not_found(format!("object {id} does not exist"))
    }
}

#[async_trait]
impl<T: StoredRecord> ResourceClient<T> for InMemoryResourceClient<T> {
    async fn list(&self) -> Result<Vec<T>, RemoteError> {
        self.enter("list".to_owned())?;
        Ok(lock(&self.objects).values().cloned().collect())
    }

    async fn get(&self, id: &str) -> Result<T, RemoteError> {
        self.enter(format!("get:{id}"))?;
        lock(&self.objects)
            .get(id)
            .cloned()
            .ok_or_else(|| Self::not_found(id))
    }

    async fn create(&self, record: &T) -> Result<String, RemoteError> {
        self.enter("create".to_owned())?;
        let mut objects = lock(&self.objects);
        let id = record.stored_id().unwrap_or_else(|| Uuid::new_v4().to_string());
        if objects.contains_key(&id) {
            return Err(RemoteError::rejected(409_u16, format!("object {id} already exists")));
        }
        let mut stored = record.clone();
        stored.assign_id(&id);
        if let Some(fill) = &self.server_fields {
            fill(&mut stored, None);
        }
        objects.insert(id.clone(), stored);
        Ok(id)
    }

    async fn update(&self, id: &str, record: &T) -> Result<(), RemoteError> {
        self.enter(format!("update:{id}"))?;
        let mut objects = lock(&self.objects);
        let previous = objects.get(id).cloned().ok_or_else(|| Self::not_found(id))?;
        let mut stored = record.clone();
        stored.assign_id(id);
        if let Some(fill) = &self.server_fields {
            fill(&mut stored, Some(&previous));
        }
        objects.insert(id.to_owned(), stored);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.enter(format!("delete:{id}"))?;
        lock(&self.objects)
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(id))
    }
}

/// Principal keys that become available after a number of polls.
#[derive(Debug, Default)]
pub struct FixturePrincipalKeys {
    ready_after: usize,
    public_key: String,
    polls: AtomicUsize,
    generated: Mutex<Vec<String>>,
}

impl FixturePrincipalKeys {
    /// Keys whose public half is `public_key` from the `polls`-th fetch on.
    pub fn ready_after(polls: usize, public_key: impl Into<String>) -> Self {
        Self {
            ready_after: polls,
            public_key: public_key.into(),
            ..Self::default()
        }
    }

    /// Keys that never finish generating.
    pub fn never_ready() -> Self {
        Self::ready_after(usize::MAX, "")
    }

    /// Number of fetches served so far.
    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    /// Role ids keys were generated for.
    pub fn generated_for(&self) -> Vec<String> {
        lock(&self.generated).clone()
    }
}

#[async_trait]
impl PrincipalKeys for FixturePrincipalKeys {
    async fn generate(&self, role_id: &str) -> Result<String, RemoteError> {
        let mut generated = lock(&self.generated);
        generated.push(role_id.to_owned());
        Ok(format!("key-{}", generated.len()))
    }

    async fn get(&self, _role_id: &str, key_id: &str) -> Result<PrincipalKey, RemoteError> {
        let served = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        let public_key = if served >= self.ready_after {
            self.public_key.clone()
        } else {
            String::new()
        };
        Ok(PrincipalKey {
            id: key_id.to_owned(),
            public_key,
        })
    }
}

/// Directory answering from fixed tables.
#[derive(Debug, Default)]
pub struct FixtureDirectory {
    roles: BTreeMap<String, String>,
    configs: BTreeMap<(&'static str, String), String>,
}

impl FixtureDirectory {
    /// Register a role name.
    #[must_use]
    pub fn with_role(mut self, name: impl Into<String>, id: impl Into<String>) -> Self {
        self.roles.insert(name.into(), id.into());
        self
    }

    /// Register a configuration bundle.
    #[must_use]
    pub fn with_config(
        mut self,
        target: ConfigTarget,
        trusted_client_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.configs
            .insert((target.path_segment(), trusted_client_id.into()), text.into());
        self
    }
}

#[async_trait]
impl Directory for FixtureDirectory {
    async fn resolve_roles(&self, names: &[String]) -> Result<Vec<RoleRef>, RemoteError> {
        Ok(names
            .iter()
            .filter_map(|name| {
                self.roles.get(name).map(|id| RoleRef {
                    id: id.clone(),
                    name: name.clone(),
                })
            })
            .collect())
    }

    async fn trusted_client_config(
        &self,
        target: ConfigTarget,
        trusted_client_id: &str,
    ) -> Result<String, RemoteError> {
        self.configs
            .get(&(target.path_segment(), trusted_client_id.to_owned()))
            .cloned()
            .ok_or_else(|| {
                RemoteError::not_found(format!("no configuration for {trusted_client_id}"))
            })
    }
}

/// A whole PrivX deployment held in memory.
pub struct InMemoryPrivx {
    pub hosts: Arc<InMemoryResourceClient<Host>>,
    pub roles: Arc<InMemoryResourceClient<Role>>,
    pub principal_keys: Arc<FixturePrincipalKeys>,
    pub sources: Arc<InMemoryResourceClient<Source>>,
    pub trusted_clients: Arc<InMemoryResourceClient<TrustedClient>>,
    pub secrets: Arc<InMemoryResourceClient<Secret>>,
    pub api_clients: Arc<InMemoryResourceClient<ApiClient>>,
    pub access_groups: Arc<InMemoryResourceClient<AccessGroup>>,
    pub directory: Arc<FixtureDirectory>,
}

impl Default for InMemoryPrivx {
    fn default() -> Self {
        Self {
            hosts: Arc::default(),
            roles: Arc::default(),
            principal_keys: Arc::new(FixturePrincipalKeys::ready_after(1, "ssh-rsa AAAAfixture")),
            sources: Arc::default(),
            trusted_clients: Arc::default(),
            secrets: Arc::default(),
            api_clients: Arc::new(InMemoryResourceClient::new().with_server_fields(
                |client: &mut ApiClient, previous| match previous {
                    Some(previous) => {
                        client.secret.clone_from(&previous.secret);
                        client.oauth_client_id.clone_from(&previous.oauth_client_id);
                        client.oauth_client_secret.clone_from(&previous.oauth_client_secret);
                    }
                    None => {
                        client.secret = format!("secret-{}", Uuid::new_v4());
                        client.oauth_client_id = "privx-external".to_owned();
                        client.oauth_client_secret = format!("oauth-{}", Uuid::new_v4());
                    }
                },
            )),
            access_groups: Arc::default(),
            directory: Arc::default(),
        }
    }
}

impl ResourceClients for InMemoryPrivx {
    fn hosts(&self) -> Arc<dyn ResourceClient<Host>> {
        self.hosts.clone()
    }

    fn roles(&self) -> Arc<dyn ResourceClient<Role>> {
        self.roles.clone()
    }

    fn principal_keys(&self) -> Arc<dyn PrincipalKeys> {
        self.principal_keys.clone()
    }

    fn sources(&self) -> Arc<dyn ResourceClient<Source>> {
        self.sources.clone()
    }

    fn trusted_clients(&self) -> Arc<dyn ResourceClient<TrustedClient>> {
        self.trusted_clients.clone()
    }

    fn secrets(&self) -> Arc<dyn ResourceClient<Secret>> {
        self.secrets.clone()
    }

    fn api_clients(&self) -> Arc<dyn ResourceClient<ApiClient>> {
        self.api_clients.clone()
    }

    fn access_groups(&self) -> Arc<dyn ResourceClient<AccessGroup>> {
        self.access_groups.clone()
    }

    fn directory(&self) -> Arc<dyn Directory> {
        self.directory.clone()
    }
}

/// Connector handing out one shared [`InMemoryPrivx`].
pub struct FixtureConnectorFactory {
    privx: Arc<InMemoryPrivx>,
    refuse: Option<String>,
    connects: AtomicUsize,
}

impl FixtureConnectorFactory {
    /// Accept any credential.
    pub fn new(privx: Arc<InMemoryPrivx>) -> Self {
        Self {
            privx,
            refuse: None,
            connects: AtomicUsize::new(0),
        }
    }

    /// Refuse every credential with `message`.
    #[must_use]
    pub fn refusing(mut self, message: impl Into<String>) -> Self {
        self.refuse = Some(message.into());
        self
    }

    /// Number of connection attempts.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectorFactory for FixtureConnectorFactory {
    async fn connect(
        &self,
        _base_url: &Url,
        _credential: &Credential,
    ) -> Result<Arc<dyn ResourceClients>, AuthFailure> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match &self.refuse {
            Some(message) => Err(AuthFailure::new(message.clone())),
            None => Ok(self.privx.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[tokio::test]
    async fn create_assigns_an_id_and_delete_twice_reports_not_found() {
        let hosts = InMemoryResourceClient::<Host>::new();
        let id = hosts
            .create(&Host {
                name: "db".to_owned(),
                ..Host::default()
            })
            .await
            .expect("create succeeds");
        assert_eq!(hosts.stored(&id).and_then(|host| host.id), Some(id.clone()));

        hosts.delete(&id).await.expect("first delete succeeds");
        let err = hosts.delete(&id).await.expect_err("second delete fails");
        assert!(err.is_not_found());
        assert_eq!(
            hosts.calls(),
            vec!["create".to_owned(), format!("delete:{id}"), format!("delete:{id}")]
        );
    }

    #[rstest]
    #[tokio::test]
    async fn secrets_are_addressed_by_name() {
        let secrets = InMemoryResourceClient::<Secret>::new();
        let secret = Secret {
            name: "db-password".to_owned(),
            ..Secret::default()
        };
        assert_eq!(secrets.create(&secret).await.expect("created"), "db-password");
        let err = secrets.create(&secret).await.expect_err("duplicate");
        assert!(matches!(err, RemoteError::Rejected { status: 409, .. }));
    }

    #[rstest]
    #[tokio::test]
    async fn queued_failures_are_returned_once() {
        let roles = InMemoryResourceClient::<Role>::new();
        roles.reject_next(RemoteError::transport("connection reset"));
        assert!(roles.list().await.is_err());
        assert!(roles.list().await.expect("second list succeeds").is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn principal_keys_become_ready_after_the_configured_polls() {
        let keys = FixturePrincipalKeys::ready_after(3, "ssh-rsa AAAA");
        let key_id = keys.generate("r1").await.expect("generated");
        for _ in 0..2 {
            assert!(keys.get("r1", &key_id).await.expect("fetched").public_key.is_empty());
        }
        assert_eq!(keys.get("r1", &key_id).await.expect("fetched").public_key, "ssh-rsa AAAA");
        assert_eq!(keys.generated_for(), vec!["r1".to_owned()]);
    }

    #[rstest]
    #[tokio::test]
    async fn directory_omits_unknown_role_names() {
        let directory = FixtureDirectory::default().with_role("admins", "r1");
        let refs = directory
            .resolve_roles(&["admins".to_owned(), "ghosts".to_owned()])
            .await
            .expect("resolves");
        assert_eq!(
            refs,
            vec![RoleRef {
                id: "r1".to_owned(),
                name: "admins".to_owned()
            }]
        );
    }
}
