use mcp_harness::{
    expect, expect_fn, expect_future, expect_mock, mock_fn, ErrorPattern, HarnessError,
    MockBehavior, Result, Value,
};
use regex::Regex;
use serde_json::json;

fn order() -> Value {
    Value::from(json!({"id": 7, "items": [{"sku": "a", "qty": 1}, {"sku": "b", "qty": 2}]}))
}

#[test]
fn nan_and_signed_zeros_are_the_same_value() {
    expect(f64::NAN).to_be(f64::NAN).unwrap();
    expect(0.0).to_be(-0.0).unwrap();
    expect(f64::NAN).not().to_be(0).unwrap();
}

#[test]
fn to_be_compares_containers_by_identity() {
    let shared = order();
    expect(&shared).to_be(&shared).unwrap();
    let err = expect(&shared).to_be(order()).unwrap_err();
    assert!(err.is_assertion());
    expect(&shared).to_equal(order()).unwrap();
}

#[test]
fn deep_equality_examples() {
    expect(Value::list([1, 2])).to_equal(Value::list([1, 2])).unwrap();
    expect(Value::map([("a", 1)])).not().to_equal(Value::map([("a", 1), ("b", 2)])).unwrap();
    expect(Value::list(Vec::<i32>::new()))
        .not()
        .to_equal(Value::map(Vec::<(String, i32)>::new()))
        .unwrap();
    expect(Value::Null).not().to_equal(Value::Undefined).unwrap();
}

#[test]
fn negation_applies_to_a_single_chain() {
    expect(1).not().to_be(2).unwrap();
    let err = expect(1).not().to_be(1).unwrap_err();
    assert_eq!(err.message(), "Expected 1 not to be 1");
    expect(1).not().not().to_be(1).unwrap();
}

#[test]
fn structural_mismatch_includes_a_diff() {
    let mut changed = json!({"id": 7, "items": [{"sku": "a", "qty": 1}, {"sku": "b", "qty": 2}]});
    changed["items"][1]["qty"] = json!(3);
    let err = expect(order()).to_equal(changed).unwrap_err();
    let message = err.message();
    assert!(message.contains("Difference (- expected, + actual):"));
    assert!(message.contains("\"qty\": 3"));
}

#[test]
fn strings_lists_and_objects() {
    expect("protocol server").to_contain("server").unwrap();
    expect(vec!["a", "b"]).to_contain("b").unwrap();
    expect("héllo").to_have_length(5).unwrap();
    expect("v1.2.3").to_match(r"^v\d+\.\d+").unwrap();
    expect(order()).to_match_object(json!({"id": 7})).unwrap();
    expect(order()).not().to_match_object(json!({"id": 8})).unwrap();
    expect(Value::map([("length", 4)])).to_have_length(4).unwrap();
}

#[test]
fn truthiness_and_presence() {
    expect(0).to_be_falsy().unwrap();
    expect("").to_be_falsy().unwrap();
    expect(Value::list(Vec::<i32>::new())).to_be_truthy().unwrap();
    expect(Value::Null).to_be_null().unwrap();
    expect(Value::Null).to_be_defined().unwrap();
    expect(None::<i32>).to_be_null().unwrap();
    expect(()).to_be_undefined().unwrap();
}

#[test]
fn numeric_bounds() {
    expect(3).to_be_greater_than(2.0).unwrap();
    expect(3).to_be_less_than(3.5).unwrap();
    let err = expect(3).to_be_greater_than(3.0).unwrap_err();
    assert_eq!(err.message(), "Expected 3 to be greater than 3");
    assert!(expect("3").to_be_less_than(4.0).unwrap_err().is_usage());
}

#[test]
fn matchers_reject_subjects_they_cannot_inspect() {
    assert!(expect(5).to_have_been_called().unwrap_err().is_usage());
    assert!(expect(5).to_contain(5).unwrap_err().is_usage());
    assert!(expect(5).to_throw().unwrap_err().is_usage());
    let recorder = mock_fn("f", MockBehavior::None);
    assert!(expect_mock(&recorder).to_be(1).unwrap_err().is_usage());
    assert!(expect("x").to_match("(").unwrap_err().is_usage());
}

#[test]
fn to_throw_sees_errors_and_panics() {
    expect_fn(|| -> Result<Value> { Err(HarnessError::msg("boom")) }).to_throw().unwrap();
    expect_fn(|| -> Result<i32> { panic!("kaboom") })
        .to_throw_matching("kaboom")
        .unwrap();
    expect_fn(|| Ok::<_, HarnessError>(1)).not().to_throw().unwrap();
    expect_fn(|| -> Result<Value> { Err(HarnessError::typed("TypeError", "bad")) })
        .to_throw_matching(ErrorPattern::kind("TypeError"))
        .unwrap();
    expect_fn(|| -> Result<Value> { Err(HarnessError::msg("code 42")) })
        .to_throw_matching(Regex::new(r"code \d+").unwrap())
        .unwrap();

    let err = expect_fn(|| -> Result<Value> { Err(HarnessError::msg("other")) })
        .to_throw_matching("boom")
        .unwrap_err();
    assert!(err.message().contains("but it raised Error: other"));
}

#[tokio::test]
async fn resolves_continues_with_the_settled_value() {
    expect_future(async { Ok::<_, HarnessError>("done") })
        .resolves()
        .await
        .unwrap()
        .to_be("done")
        .unwrap();

    let err = expect(5).resolves().await.unwrap_err();
    assert!(err.is_assertion());
    assert_eq!(err.message(), "Expected value to be a pending asynchronous value");

    let failure = expect_future(async { Err::<Value, _>(HarnessError::msg("offline")) })
        .resolves()
        .await
        .unwrap_err();
    assert_eq!(failure.message(), "offline");
}

#[tokio::test]
async fn rejects_expects_a_failure() {
    expect_future(async { Err::<Value, _>(HarnessError::msg("denied")) })
        .rejects()
        .await
        .unwrap();
    expect_future(async { Err::<Value, _>(HarnessError::msg("denied: quota")) })
        .rejects_with("quota")
        .await
        .unwrap();

    let err = expect_future(async { Ok::<_, HarnessError>(1) })
        .rejects()
        .await
        .unwrap_err();
    assert_eq!(err.message(), "Expected promise to reject, but it resolved");

    expect_future(async { Ok::<_, HarnessError>(1) })
        .not()
        .rejects()
        .await
        .unwrap();
}
