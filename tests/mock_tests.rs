use std::time::Duration;

use mcp_harness::{
    expect, expect_mock, mock_fn, mock_prompt, mock_resource, mock_server, mock_tool, spy_on,
    Handlers, HarnessError, Implementation, MockBehavior, MockKind, ServerConfig, Value,
};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn return_value_recorder_called_twice() {
    let lookup = mock_tool("lookup", MockBehavior::return_value(42));
    let first = lookup.invoke(vec![Value::from("a")]).await.unwrap();
    let second = lookup.invoke(vec![Value::from("b"), Value::from(2)]).await.unwrap();

    assert_eq!(first, Value::from(42));
    assert_eq!(second, Value::from(42));
    assert_eq!(lookup.call_count(), 2);
    assert_eq!(lookup.results(), vec![Value::from(42), Value::from(42)]);
    let calls = lookup.calls();
    assert_eq!(calls[1].args, vec![Value::from("b"), Value::from(2)]);
    assert!(calls[0].timestamp <= calls[1].timestamp);
    expect_mock(&lookup).to_have_been_called_with(["a"]).unwrap();
    expect_mock(&lookup).not().to_have_been_called_with(["c"]).unwrap();
}

#[tokio::test]
async fn throw_error_recorder_fails_every_call() {
    let broken = mock_resource("config", MockBehavior::throw_error("boom"));
    let err = broken.invoke(vec![]).await.unwrap_err();
    assert_eq!(err.message(), "boom");
    assert_eq!(err.kind_name(), "Error");
    assert_eq!(broken.errors().len(), 1);
    assert!(broken.results().is_empty());
    assert!(broken.last_call().unwrap().error().is_some());
    expect_mock(&broken).to_have_been_called_times(1).unwrap();
}

#[tokio::test]
async fn unconfigured_recorder_returns_undefined() {
    let noop = mock_prompt("greeting", MockBehavior::None);
    assert_eq!(noop.kind(), MockKind::Prompt);
    assert!(!noop.has_behavior());
    expect(noop.invoke(vec![]).await.unwrap()).to_be_undefined().unwrap();
    expect_mock(&noop).to_have_been_called().unwrap();
}

#[tokio::test]
async fn behaviors_can_be_reconfigured() {
    let f = mock_fn("f", MockBehavior::None);
    f.mock_return_value("default")
        .mock_return_value_once("first")
        .mock_return_value_once("second");
    assert_eq!(f.invoke(vec![]).await.unwrap(), Value::from("second"));
    assert_eq!(f.invoke(vec![]).await.unwrap(), Value::from("first"));
    assert_eq!(f.invoke(vec![]).await.unwrap(), Value::from("default"));

    f.mock_implementation(|args| Ok(Value::from(args.len())));
    assert_eq!(f.invoke(vec![Value::Null, Value::Null]).await.unwrap(), Value::from(2));

    f.mock_rejected_value("nope");
    assert_eq!(f.invoke(vec![]).await.unwrap_err().message(), "nope");

    f.mock_resolved_value(true);
    assert_eq!(f.invoke(vec![]).await.unwrap(), Value::from(true));

    f.mock_clear();
    assert_eq!(f.call_count(), 0);
    assert!(f.has_behavior());

    f.mock_reset();
    assert!(!f.has_behavior());
    assert_eq!(f.invoke(vec![]).await.unwrap(), Value::Undefined);
}

#[tokio::test]
async fn async_implementations_are_awaited() {
    let slow = mock_fn("slow", MockBehavior::None);
    slow.mock_implementation_async(|args| async move {
        tokio::task::yield_now().await;
        Ok(Value::list(args))
    });
    let out = slow.invoke(vec![Value::from(1)]).await.unwrap();
    expect(out).to_equal(Value::list([1])).unwrap();
}

#[tokio::test]
async fn server_mock_exposes_one_recorder_per_handler() {
    let server = mock_server(
        ServerConfig::new()
            .tool("search", MockBehavior::return_value("hit"))
            .resource(
                "file",
                MockBehavior::throw_error(HarnessError::typed("NotFound", "no such file")),
            )
            .prompt("summarize", MockBehavior::None),
    );
    assert_eq!(server.names().collect::<Vec<_>>(), ["file", "search", "summarize"]);

    assert_eq!(server.call("search", vec![Value::from("q")]).await.unwrap(), Value::from("hit"));
    let err = server.call("file", vec![]).await.unwrap_err();
    assert_eq!(err.kind_name(), "NotFound");

    let search = server.mock("search").unwrap();
    assert_eq!(search.kind(), MockKind::Tool);
    expect_mock(search).to_have_been_called_with(["q"]).unwrap();

    let missing = server.call("absent", vec![]).await.unwrap_err();
    assert_eq!(missing.kind_name(), "HandlerNotFound");

    server.clear_all();
    assert_eq!(search.call_count(), 0);
}

#[tokio::test]
async fn server_config_collects_from_pairs() {
    let config: ServerConfig = [("ping", MockBehavior::return_value("pong"))].into_iter().collect();
    let server = mock_server(config);
    assert_eq!(server.mock("ping").unwrap().kind(), MockKind::Function);
    assert_eq!(server.call("ping", vec![]).await.unwrap(), Value::from("pong"));
}

#[tokio::test]
async fn spy_records_and_restores() {
    let handlers = Handlers::new();
    let original = Implementation::new(|args| {
        let n = args.first().and_then(Value::as_number).unwrap_or(0.0);
        Ok(Value::from(n * 2.0))
    });
    handlers.insert("double", original.clone());

    let spy = spy_on(&handlers, "double").unwrap();
    assert_eq!(handlers.call("double", vec![Value::from(4)]).await.unwrap(), Value::from(8));
    expect_mock(spy.mock()).to_have_been_called_with([4]).unwrap();

    spy.restore();
    assert!(spy.is_restored());
    assert!(handlers.get("double").unwrap().ptr_eq(&original));
    handlers.call("double", vec![Value::from(1)]).await.unwrap();
    assert_eq!(spy.mock().call_count(), 1);

    spy.restore();
    assert!(handlers.get("double").unwrap().ptr_eq(&original));
}

#[test]
fn spying_on_a_missing_handler_is_a_usage_error() {
    let handlers = Handlers::new();
    let err = spy_on(&handlers, "absent").unwrap_err();
    assert!(err.is_usage());
}

#[tokio::test]
async fn nested_calls_are_recorded_in_call_order() {
    let countdown = mock_fn("countdown", MockBehavior::None);
    let inner = countdown.clone();
    countdown.mock_implementation_async(move |args| {
        let inner = inner.clone();
        async move {
            let n = args.first().and_then(Value::as_number).unwrap_or(0.0);
            if n > 1.0 {
                inner.invoke(vec![Value::from(n - 1.0)]).await?;
            }
            Ok::<_, HarnessError>(Value::from(n))
        }
    });

    countdown.invoke(vec![Value::from(3)]).await.unwrap();
    let order: Vec<Value> = countdown.calls().iter().map(|c| c.args[0].clone()).collect();
    assert_eq!(order, vec![Value::from(3), Value::from(2), Value::from(1)]);
    let settled = vec![Value::from(1), Value::from(2), Value::from(3)];
    assert_eq!(countdown.results(), settled);
    assert!(countdown.calls().iter().all(|c| !c.is_pending()));
    assert_eq!(countdown.calls()[0].result(), Some(&Value::from(3)));
}

#[tokio::test]
async fn behavior_sees_its_own_call() {
    let counter = mock_fn("counter", MockBehavior::None);
    let observed = counter.clone();
    counter.mock_implementation(move |_| {
        let last = observed.last_call().map(|c| c.is_pending());
        Ok(Value::list([
            Value::from(observed.call_count()),
            Value::from(last == Some(true)),
        ]))
    });

    let seen = counter.invoke(vec![]).await.unwrap();
    assert_eq!(seen, Value::list([Value::from(1), Value::from(true)]));
    assert!(!counter.last_call().unwrap().is_pending());
}

#[tokio::test]
async fn abandoned_call_stays_recorded_as_pending() {
    let slow = mock_tool("slow", MockBehavior::None);
    slow.mock_implementation_async(|_| async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(Value::Null)
    });

    let timed_out =
        tokio::time::timeout(Duration::from_millis(10), slow.invoke(vec![Value::from("q")])).await;
    assert!(timed_out.is_err());
    assert_eq!(slow.call_count(), 1);
    let call = slow.last_call().unwrap();
    assert!(call.is_pending());
    assert_eq!(call.args, vec![Value::from("q")]);
    assert!(slow.results().is_empty() && slow.errors().is_empty());
    expect_mock(&slow).to_have_been_called_with(["q"]).unwrap();
}
