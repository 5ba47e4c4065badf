//! Navigation state carried in the session snapshot
//!
//! The navigation tree is owned by whatever front end drives the call screen.
//! The core stores it verbatim so it survives restarts, and only looks inside
//! it to answer the back-button question: is the focused route one the
//! application may exit from?

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Route names on which a back action leaves the application
pub const DEFAULT_EXIT_ROUTES: &[&str] = &["callScreen"];

/// Opaque navigation tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NavigationState(Value);

impl Default for NavigationState {
    fn default() -> Self {
        Self(Value::Object(Default::default()))
    }
}

impl NavigationState {
    /// Wrap a navigation tree produced by the front end
    pub fn new(tree: Value) -> Self {
        Self(tree)
    }

    /// The raw tree
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Name of the focused leaf route, if the tree has one
    ///
    /// Follows `index` into `routes` at every level until a node without
    /// child routes is reached. Accepts both `routeName` and `name` keys.
    pub fn active_route_name(&self) -> Option<&str> {
        let mut node = &self.0;
        loop {
            match node.get("routes").and_then(Value::as_array) {
                Some(routes) if !routes.is_empty() => {
                    let index = node.get("index").and_then(Value::as_u64).unwrap_or(0) as usize;
                    node = routes.get(index)?;
                }
                _ => break,
            }
        }
        node.get("routeName")
            .or_else(|| node.get("name"))
            .and_then(Value::as_str)
    }
}

/// Whether a back action on `route_name` should exit the application
pub fn can_exit<S: AsRef<str>>(route_name: &str, exit_routes: &[S]) -> bool {
    exit_routes.iter().any(|r| r.as_ref() == route_name)
}
