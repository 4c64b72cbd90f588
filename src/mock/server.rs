use std::collections::BTreeMap;

use super::{Handlers, Mock, MockBehavior, MockKind};
use crate::{Result, Value};

/// Declares the handlers a [`MockServer`] exposes and how each behaves.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    handlers: Vec<(MockKind, String, MockBehavior)>,
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool(self, name: impl Into<String>, behavior: MockBehavior) -> Self {
        self.handler_of(MockKind::Tool, name, behavior)
    }

    pub fn resource(self, name: impl Into<String>, behavior: MockBehavior) -> Self {
        self.handler_of(MockKind::Resource, name, behavior)
    }

    pub fn prompt(self, name: impl Into<String>, behavior: MockBehavior) -> Self {
        self.handler_of(MockKind::Prompt, name, behavior)
    }

    pub fn handler(self, name: impl Into<String>, behavior: MockBehavior) -> Self {
        self.handler_of(MockKind::Function, name, behavior)
    }

    fn handler_of(
        mut self,
        kind: MockKind,
        name: impl Into<String>,
        behavior: MockBehavior,
    ) -> Self {
        self.handlers.push((kind, name.into(), behavior));
        self
    }
}

impl<K: Into<String>> FromIterator<(K, MockBehavior)> for ServerConfig {
    fn from_iter<I: IntoIterator<Item = (K, MockBehavior)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(ServerConfig::new(), |config, (name, behavior)| config.handler(name, behavior))
    }
}

/// A handler table whose every entry is a fresh [`Mock`].
#[derive(Debug, Clone)]
pub struct MockServer {
    handlers: Handlers,
    mocks: BTreeMap<String, Mock>,
}

impl MockServer {
    /// The table to hand to code under test.
    pub fn handlers(&self) -> &Handlers {
        &self.handlers
    }

    pub fn mock(&self, name: &str) -> Option<&Mock> {
        self.mocks.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.mocks.keys().map(String::as_str)
    }

    pub async fn call(&self, name: &str, args: Vec<Value>) -> Result<Value> {
        self.handlers.call(name, args).await
    }

    /// Clears the history of every mock, keeping behaviors.
    pub fn clear_all(&self) {
        for mock in self.mocks.values() {
            mock.mock_clear();
        }
    }
}

/// Builds a [`MockServer`] from `config`. A name declared twice keeps the last
/// declaration.
pub fn mock_server(config: ServerConfig) -> MockServer {
    let handlers = Handlers::new();
    let mut mocks = BTreeMap::new();
    for (kind, name, behavior) in config.handlers {
        let mock = Mock::with_kind(kind, name.clone(), behavior);
        handlers.insert(name.clone(), mock.as_implementation());
        mocks.insert(name, mock);
    }
    MockServer { handlers, mocks }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_on<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime")
            .block_on(fut)
    }

    #[test]
    fn each_declared_name_gets_its_own_recorder() {
        let server = mock_server(
            ServerConfig::new()
                .tool("search", MockBehavior::return_value("found"))
                .resource("readme", MockBehavior::return_value("# Title"))
                .prompt("greet", MockBehavior::throw_error("unavailable")),
        );

        block_on(async {
            assert_eq!(
                server.call("search", vec![Value::from("q")]).await.unwrap().as_str(),
                Some("found")
            );
            assert!(server.call("greet", vec![]).await.is_err());
        });

        assert_eq!(server.mock("search").unwrap().call_count(), 1);
        assert_eq!(server.mock("search").unwrap().kind(), MockKind::Tool);
        assert_eq!(server.mock("readme").unwrap().call_count(), 0);
        assert_eq!(server.mock("greet").unwrap().errors().len(), 1);
        assert_eq!(server.names().collect::<Vec<_>>(), ["greet", "readme", "search"]);
    }

    #[test]
    fn config_collects_from_pairs() {
        let server = mock_server(
            [
                ("a", MockBehavior::return_value(1)),
                ("b", MockBehavior::implementation(|args| Ok(Value::from(args.len())))),
            ]
            .into_iter()
            .collect(),
        );
        let out = block_on(server.call("b", vec![Value::Null, Value::Null])).unwrap();
        assert_eq!(out.as_number(), Some(2.0));
        assert_eq!(server.mock("a").unwrap().kind(), MockKind::Function);

        server.clear_all();
        assert_eq!(server.mock("b").unwrap().call_count(), 0);
    }
}
