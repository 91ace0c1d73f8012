//! The entrypoint for executing requests against the object graph.

use crate::{
    graphql::{build_schema, AppSchema},
    guard::DepthGuard,
    loaders::Loaders,
    store::SharedStore,
    Config,
};
use async_graphql::{parser::parse_query, Response, ServerError, Variables};
use serde::{Deserialize, Serialize};

/// A GraphQL request, as received from a client.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub variables: Option<serde_json::Value>,
    #[serde(default)]
    pub operation_name: Option<String>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn variables(mut self, variables: serde_json::Value) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }
}

/// Executes requests against one store.
///
/// The schema and configuration are shared by every request. Everything else, in particular the
/// loaders and everything they cache, is created for a single request and dropped with it.
pub struct Executor {
    schema: AppSchema,
    store: SharedStore,
    guard: DepthGuard,
}

impl Executor {
    pub fn new(store: SharedStore, config: &Config) -> Self {
        Self {
            schema: build_schema(),
            store,
            guard: DepthGuard::new(config.max_depth),
        }
    }

    /// The schema definition, in SDL.
    pub fn sdl(&self) -> String {
        self.schema.sdl()
    }

    /// Execute a request.
    ///
    /// A request which cannot be parsed, or which nests deeper than the configured limit, is
    /// rejected before any data is fetched, and the response consists only of the errors.
    pub async fn execute(&self, request: QueryRequest) -> Response {
        let document = match parse_query(&request.query) {
            Ok(document) => document,
            Err(err) => {
                tracing::info!("rejecting malformed query: {err}");
                return Response::from_errors(vec![ServerError::from(err)]);
            }
        };

        let violations = self.guard.validate(&document);
        if !violations.is_empty() {
            tracing::info!(max_depth = self.guard.max_depth(), ?violations, "rejecting query");
            return Response::from_errors(violations.into_iter().map(ServerError::from).collect());
        }

        let mut gql = async_graphql::Request::new(request.query)
            .data(Loaders::new(self.store.clone()));
        if let Some(variables) = request.variables {
            gql = gql.variables(Variables::from_json(variables));
        }
        if let Some(name) = request.operation_name {
            gql = gql.operation_name(name);
        }

        let response = self.schema.execute(gql).await;
        tracing::info!(errors = response.errors.len(), "executed query");
        response
    }
}
