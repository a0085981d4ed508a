//! Request dispatch against the kind registry and lookups.

use std::sync::Arc;

use mockable::Env;
use serde_json::error::Category;
use tracing::{debug, info, warn};

use super::messages::{Request, Response};
use crate::domain::attributes::Record;
use crate::domain::credentials::{ProviderConfig, resolve_credentials};
use crate::domain::ports::{ConnectorFactory, ResourceClients};
use crate::domain::registry;
use crate::domain::{
    ErrorCode, LookupQuery, Lookups, ObjectReconciler, ProviderError, Redactor,
    ReconcilerOptions, ResourceState,
};

/// Raises or lowers log verbosity when the provider `debug` flag is seen.
pub type DebugSwitch = Box<dyn Fn(bool) + Send + Sync>;

struct Session {
    clients: Arc<dyn ResourceClients>,
    redactor: Redactor,
}

/// Stateful request handler for one orchestrator connection.
pub struct Plugin<E> {
    connector: Arc<dyn ConnectorFactory>,
    env: E,
    options: ReconcilerOptions,
    debug_switch: Option<DebugSwitch>,
    session: Option<Session>,
}

impl<E: Env> Plugin<E> {
    /// Plugin connecting through `connector`, reading fallback credentials
    /// from `env`.
    pub fn new(connector: Arc<dyn ConnectorFactory>, env: E, options: ReconcilerOptions) -> Self {
        Self {
            connector,
            env,
            options,
            debug_switch: None,
            session: None,
        }
    }

    /// Install a verbosity switch driven by the provider `debug` flag.
    #[must_use]
    pub fn with_debug_switch(mut self, switch: DebugSwitch) -> Self {
        self.debug_switch = Some(switch);
        self
    }

    /// Whether a session is open.
    pub fn is_configured(&self) -> bool {
        self.session.is_some()
    }

    /// Parse and handle one request line.
    pub async fn handle_line(&mut self, line: &str) -> Response {
        match serde_json::from_str::<Request>(line) {
            Ok(request) => self.handle(request).await,
            Err(error) => {
                let message = describe_parse_error(&error);
                warn!(%message, "rejected request");
                Response::failure(ErrorCode::InvalidRequest, message)
            }
        }
    }

    /// Handle one parsed request.
    pub async fn handle(&mut self, request: Request) -> Response {
        debug!(operation = request.operation(), "handling request");
        match request {
            Request::Configure { provider } => self.configure(&provider).await,
            Request::Lookup(query) => self.lookup(&query).await,
            Request::Create { kind, desired } => self.create(&kind, &desired).await,
            Request::Read { kind, state } => self.read(&kind, &state).await,
            Request::Update {
                kind,
                state,
                desired,
            } => self.update(&kind, &state, &desired).await,
            Request::Delete { kind, state } => self.delete(&kind, &state).await,
            Request::Import { kind, id } => self.import(&kind, &id).await,
        }
    }

    async fn configure(&mut self, provider: &ProviderConfig) -> Response {
        self.session = None;
        let mut redactor = Redactor::new(explicit_secrets(provider));

        let resolved = match resolve_credentials(provider, &self.env) {
            Ok(resolved) => resolved,
            Err(error) => return failed(&ProviderError::from(error), &redactor),
        };
        if let Some(switch) = &self.debug_switch {
            switch(resolved.debug);
        }
        redactor.extend(resolved.credential.secrets());

        match self
            .connector
            .connect(&resolved.base_url, &resolved.credential)
            .await
        {
            Ok(clients) => {
                info!(base_url = %resolved.base_url, "provider configured");
                self.session = Some(Session { clients, redactor });
                Response::ok()
            }
            Err(error) => failed(&ProviderError::from(error), &redactor),
        }
    }

    async fn lookup(&self, query: &LookupQuery) -> Response {
        let Some(session) = &self.session else {
            return not_configured();
        };
        match Lookups::new(Arc::clone(&session.clients)).run(query).await {
            Ok(attributes) => Response::attributes(attributes),
            Err(error) => failed(&error, &session.redactor),
        }
    }

    async fn create(&self, kind: &str, desired: &Record) -> Response {
        let (reconciler, redactor) = match self.prepare(kind, &[desired]) {
            Ok(prepared) => prepared,
            Err(response) => return response,
        };
        reconciled(reconciler.create(desired).await, &redactor)
    }

    async fn read(&self, kind: &str, state: &ResourceState) -> Response {
        let (reconciler, redactor) = match self.prepare(kind, &[&state.attributes]) {
            Ok(prepared) => prepared,
            Err(response) => return response,
        };
        reconciled(reconciler.read(state).await, &redactor)
    }

    async fn update(&self, kind: &str, state: &ResourceState, desired: &Record) -> Response {
        let (reconciler, redactor) = match self.prepare(kind, &[&state.attributes, desired]) {
            Ok(prepared) => prepared,
            Err(response) => return response,
        };
        match reconciler.update(state, desired).await {
            Ok(updated) => Response::state(updated),
            Err(failure) => failed(&failure.error, &redactor).with_state(failure.tainted),
        }
    }

    async fn delete(&self, kind: &str, state: &ResourceState) -> Response {
        let (reconciler, redactor) = match self.prepare(kind, &[&state.attributes]) {
            Ok(prepared) => prepared,
            Err(response) => return response,
        };
        reconciled(reconciler.delete(state).await, &redactor)
    }

    async fn import(&self, kind: &str, id: &str) -> Response {
        let (reconciler, redactor) = match self.prepare(kind, &[]) {
            Ok(prepared) => prepared,
            Err(response) => return response,
        };
        reconciled(reconciler.import(id).await, &redactor)
    }

    /// Reconciler for `kind` plus a redactor covering the sensitive values
    /// in `records`.
    fn prepare(
        &self,
        kind: &str,
        records: &[&Record],
    ) -> Result<(Box<dyn ObjectReconciler>, Redactor), Response> {
        let session = self.session.as_ref().ok_or_else(not_configured)?;
        let entry =
            registry::find(kind).map_err(|error| failed(&error, &session.redactor))?;
        let reconciler = entry.reconciler(session.clients.as_ref(), &self.options);

        let sensitive = reconciler.schema().sensitive;
        let mut redactor = session.redactor.clone();
        for record in records {
            redactor.extend(record.sensitive_values(sensitive));
        }
        Ok((reconciler, redactor))
    }
}

fn explicit_secrets(provider: &ProviderConfig) -> Vec<String> {
    [
        &provider.api_bearer_token,
        &provider.api_client_secret,
        &provider.api_oauth_client_secret,
    ]
    .into_iter()
    .flatten()
    .cloned()
    .collect()
}

fn reconciled(result: Result<ResourceState, ProviderError>, redactor: &Redactor) -> Response {
    match result {
        Ok(state) => Response::state(state),
        Err(error) => failed(&error, redactor),
    }
}

fn failed(error: &ProviderError, redactor: &Redactor) -> Response {
    let response = Response::error(error, redactor);
    if let Some(body) = &response.error {
        warn!(code = ?body.code, message = %body.message, "operation failed");
    }
    response
}

fn not_configured() -> Response {
    Response::failure(
        ErrorCode::NotConfigured,
        "provider is not configured; send a configure request first",
    )
}

/// Shape errors report a position only, since serde echoes offending
/// values and those may be secrets.
fn describe_parse_error(error: &serde_json::Error) -> String {
    match error.classify() {
        Category::Data => format!(
            "request does not match any operation (line {}, column {})",
            error.line(),
            error.column()
        ),
        Category::Io | Category::Syntax | Category::Eof => format!("malformed JSON: {error}"),
    }
}
