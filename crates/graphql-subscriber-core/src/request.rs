//! Subscription request type.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

/// A GraphQL subscription request.
///
/// The operation name and query together determine the request's
/// [`Fingerprint`](crate::Fingerprint); variables and extensions are sent
/// to the server but do not take part in deduplication.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeRequest {
    /// The GraphQL subscription document.
    pub query: String,

    /// The operation name.
    pub operation_name: String,

    /// Optional variables for the operation.
    pub variables: Option<Value>,

    /// Extensions (implementation-specific metadata).
    pub extensions: Option<Value>,
}

impl SubscribeRequest {
    /// Create a new subscription request.
    ///
    /// # Example
    ///
    /// ```
    /// use graphql_subscriber_core::SubscribeRequest;
    ///
    /// let request = SubscribeRequest::new(
    ///     "rideAddNewDone",
    ///     "subscription { rideAddNewDone { success data } }",
    /// );
    /// assert_eq!(request.operation_name, "rideAddNewDone");
    /// ```
    pub fn new(operation_name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            operation_name: operation_name.into(),
            variables: None,
            extensions: None,
        }
    }

    /// Set a variable value.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let request = SubscribeRequest::new("OnMessage", "...")
    ///     .variable("room", "general")
    ///     .variable("limit", 10);
    /// ```
    pub fn variable(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        let variables = self
            .variables
            .get_or_insert_with(|| Value::Object(Default::default()));
        if let Value::Object(map) = variables
            && let Ok(value) = serde_json::to_value(value)
        {
            map.insert(name.into(), value);
        }
        self
    }

    /// Set multiple variables from a serializable value.
    pub fn variables(mut self, variables: impl Serialize) -> Self {
        self.variables = serde_json::to_value(variables).ok();
        self
    }

    /// Set variables from a HashMap.
    pub fn variables_map(mut self, variables: HashMap<String, Value>) -> Self {
        self.variables = Some(Value::Object(variables.into_iter().collect()));
        self
    }

    /// Set extensions (implementation-specific metadata).
    pub fn extensions(mut self, extensions: impl Serialize) -> Self {
        self.extensions = serde_json::to_value(extensions).ok();
        self
    }
}
