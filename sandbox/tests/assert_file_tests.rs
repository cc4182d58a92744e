use fs_sandbox::{
    Assert, AssertResult, AssertionCounter, AssertionFailure, AssertionValue, FileSystem, Operator,
};
use regex::Regex;
use tempfile::TempDir;

fn build_assert(temp: &TempDir) -> Assert {
    let fs = FileSystem::new(temp.path().join("sandbox")).unwrap();
    Assert::new(fs, AssertionCounter::new())
}

fn failure_of(result: AssertResult) -> AssertionFailure {
    result
        .expect_err("assertion should fail")
        .into_failure()
        .expect("expected an assertion failure, not an io error")
}

fn text(value: &str) -> AssertionValue {
    AssertionValue::Text(value.to_string())
}

fn assert_missing_file(failure: &AssertionFailure, message: &str) {
    assert_eq!(failure.message, message);
    assert_eq!(failure.operator, Operator::Exists);
    assert_eq!(failure.actual, text(""));
    assert_eq!(failure.expected, text(""));
    assert!(!failure.show_diff);
}

#[tokio::test]
async fn file_exists_reports_missing_file() {
    let temp = TempDir::new().unwrap();
    let assert = build_assert(&temp);

    let failure = failure_of(assert.file_exists("foo/bar").await);
    assert_missing_file(&failure, "expected 'foo/bar' file to exist");
    assert_eq!(assert.counter().total(), 1);
}

#[tokio::test]
async fn file_exists_passes_when_present() {
    let temp = TempDir::new().unwrap();
    let assert = build_assert(&temp);

    assert.fs().create("foo/bar", "hello world").await.unwrap();
    assert.file_exists("foo/bar").await.unwrap();
    assert_eq!(assert.counter().total(), 1);
}

#[tokio::test]
async fn file_not_exists_reports_present_file() {
    let temp = TempDir::new().unwrap();
    let assert = build_assert(&temp);

    assert.fs().create("foo/bar", "hello world").await.unwrap();
    let failure = failure_of(assert.file_not_exists("foo/bar").await);
    assert_eq!(failure.message, "expected 'foo/bar' file to not exist");
    assert_eq!(failure.operator, Operator::NotExists);
    assert_eq!(failure.actual, text(""));
    assert_eq!(failure.expected, text(""));
    assert!(!failure.show_diff);
    assert_eq!(assert.counter().total(), 1);

    assert.fs().remove("foo/bar").await.unwrap();
    assert.file_not_exists("foo/bar").await.unwrap();
}

#[tokio::test]
async fn file_equals_requires_the_file() {
    let temp = TempDir::new().unwrap();
    let assert = build_assert(&temp);

    let failure = failure_of(assert.file_equals("foo/bar", "hello world").await);
    assert_missing_file(&failure, "expected 'foo/bar' file to exist");
    assert_eq!(assert.counter().total(), 1);
}

#[tokio::test]
async fn file_equals_reports_different_contents() {
    let temp = TempDir::new().unwrap();
    let assert = build_assert(&temp);

    assert.fs().create("foo/bar", "hi world").await.unwrap();
    let failure = failure_of(assert.file_equals("foo/bar", "hello world").await);
    assert_eq!(failure.message, "expected 'foo/bar' file contents to equal 'hello world'");
    assert_eq!(failure.operator, Operator::StrictEqual);
    assert_eq!(failure.actual, text("hi world"));
    assert_eq!(failure.expected, text("hello world"));
    assert!(failure.show_diff);
    assert_eq!(assert.counter().total(), 1);

    assert.fs().create("foo/bar", "hello world").await.unwrap();
    assert.file_equals("foo/bar", "hello world").await.unwrap();
}

#[tokio::test]
async fn file_contains_requires_the_file() {
    let temp = TempDir::new().unwrap();
    let assert = build_assert(&temp);

    let failure = failure_of(assert.file_contains("foo/bar", "hello world").await);
    assert_missing_file(&failure, "expected 'foo/bar' file to exist");
}

#[tokio::test]
async fn file_contains_reports_missing_substring() {
    let temp = TempDir::new().unwrap();
    let assert = build_assert(&temp);

    assert.fs().create("foo/bar", "hi world").await.unwrap();
    let failure = failure_of(assert.file_contains("foo/bar", "hello").await);
    assert_eq!(failure.message, "expected 'foo/bar' file contents to contain 'hello'");
    assert_eq!(failure.operator, Operator::ContainsSubset);
    assert_eq!(failure.actual, text("hi world"));
    assert_eq!(failure.expected, text("hello"));
    assert!(failure.show_diff);
    assert_eq!(assert.counter().total(), 1);

    assert.file_contains("foo/bar", "world").await.unwrap();
}

#[tokio::test]
async fn file_contains_matches_patterns() {
    let temp = TempDir::new().unwrap();
    let assert = build_assert(&temp);

    assert.fs().create("foo/bar", "hi world").await.unwrap();
    let failure = failure_of(assert.file_contains("foo/bar", Regex::new("hello").unwrap()).await);
    assert_eq!(failure.message, "expected 'foo/bar' file contents to match /hello/");
    assert_eq!(failure.operator, Operator::StrictEqual);
    assert!(!failure.show_diff);
    assert_eq!(failure.actual, text("hi world"));
    assert_eq!(failure.expected, AssertionValue::Pattern("hello".to_string()));

    assert
        .file_contains("foo/bar", Regex::new(r"w\w+d").unwrap())
        .await
        .unwrap();
    assert_eq!(assert.counter().total(), 2);
}

#[tokio::test]
async fn file_contains_reports_first_missing_list_item() {
    let temp = TempDir::new().unwrap();
    let assert = build_assert(&temp);

    assert.fs().create("p", "alpha and gamma").await.unwrap();
    let failure = failure_of(assert.file_contains("p", ["alpha", "beta", "delta"]).await);
    assert_eq!(failure.message, "expected 'p' file contents to contain 'beta'");
    assert_eq!(failure.operator, Operator::ContainsSubset);
    assert_eq!(failure.expected, text("beta"));
    assert_eq!(failure.actual, text("alpha and gamma"));

    assert.file_contains("p", vec!["alpha", "gamma"]).await.unwrap();
    assert_eq!(assert.counter().total(), 2);
}

#[tokio::test]
async fn file_not_contains_rejects_any_substring() {
    let temp = TempDir::new().unwrap();
    let assert = build_assert(&temp);

    assert.fs().create("app.log", "info: started\nwarn: slow disk").await.unwrap();
    assert.file_not_contains("app.log", "error").await.unwrap();

    let failure = failure_of(assert.file_not_contains("app.log", ["error", "warn", "info"]).await);
    assert_eq!(failure.message, "expected 'app.log' file contents to not contain 'warn'");
    assert_eq!(failure.operator, Operator::ContainsSubset);
    assert_eq!(failure.expected, text("warn"));
    assert_eq!(failure.actual, text("info: started\nwarn: slow disk"));
    assert!(!failure.show_diff);
    assert_eq!(assert.counter().total(), 2);
}

#[tokio::test]
async fn file_not_contains_requires_the_file() {
    let temp = TempDir::new().unwrap();
    let assert = build_assert(&temp);

    let failure = failure_of(assert.file_not_contains("app.log", "error").await);
    assert_missing_file(&failure, "expected 'app.log' file to exist");
}

#[tokio::test]
async fn file_same_as_reports_missing_files_in_order() {
    let temp = TempDir::new().unwrap();
    let assert = build_assert(&temp);

    let failure = failure_of(assert.file_same_as("foo/bar", "foo/baz").await);
    assert_missing_file(&failure, "expected 'foo/bar' file to exist");

    assert.fs().create("foo/bar", "hi world").await.unwrap();
    let failure = failure_of(assert.file_same_as("foo/bar", "foo/baz").await);
    assert_missing_file(&failure, "expected comparing file 'foo/baz' to exist");
    assert_eq!(assert.counter().total(), 2);
}

#[tokio::test]
async fn file_same_as_compares_contents() {
    let temp = TempDir::new().unwrap();
    let assert = build_assert(&temp);

    assert.fs().create("foo/bar.txt", "hi world").await.unwrap();
    assert.fs().create("foo/baz.txt", "hello world").await.unwrap();

    let failure = failure_of(assert.file_same_as("foo/bar.txt", "foo/baz.txt").await);
    assert_eq!(failure.message, "expected 'foo/bar.txt' file contents to equal 'hello world'");
    assert_eq!(failure.operator, Operator::StrictEqual);
    assert_eq!(failure.actual, text("hi world"));
    assert_eq!(failure.expected, text("hello world"));
    assert!(failure.show_diff);

    assert.fs().create("foo/baz.txt", "hi world").await.unwrap();
    assert.file_same_as("foo/bar.txt", "foo/baz.txt").await.unwrap();
}

#[tokio::test]
async fn file_is_empty_checks_trimmed_contents() {
    let temp = TempDir::new().unwrap();
    let assert = build_assert(&temp);

    let failure = failure_of(assert.file_is_empty("foo/bar").await);
    assert_missing_file(&failure, "expected 'foo/bar' file to exist");

    assert.fs().create("foo/bar", "hi world").await.unwrap();
    let failure = failure_of(assert.file_is_empty("foo/bar").await);
    assert_eq!(failure.message, "expected 'foo/bar' file to be empty");
    assert_eq!(failure.operator, Operator::StrictEqual);
    assert_eq!(failure.actual, text("hi world"));
    assert_eq!(failure.expected, text(""));
    assert!(failure.show_diff);

    assert.fs().create("foo/bar", "  \n").await.unwrap();
    assert.file_is_empty("foo/bar").await.unwrap();
    assert_eq!(assert.counter().total(), 3);
}

#[tokio::test]
async fn byte_order_mark_counts_as_blank() {
    let temp = TempDir::new().unwrap();
    let assert = build_assert(&temp);

    assert.fs().create("bom.txt", "\u{feff}").await.unwrap();
    assert.file_is_empty("bom.txt").await.unwrap();

    let failure = failure_of(assert.file_is_not_empty("bom.txt").await);
    assert_eq!(failure.message, "expected 'bom.txt' file to be not empty");

    assert.fs().create("bom.txt", "\u{feff}title").await.unwrap();
    assert.file_is_not_empty("bom.txt").await.unwrap();
}

#[tokio::test]
async fn file_is_not_empty_reports_blank_files() {
    let temp = TempDir::new().unwrap();
    let assert = build_assert(&temp);

    let failure = failure_of(assert.file_is_not_empty("foo/bar").await);
    assert_missing_file(&failure, "expected 'foo/bar' file to exist");

    assert.fs().create("foo/bar", "").await.unwrap();
    let failure = failure_of(assert.file_is_not_empty("foo/bar").await);
    assert_eq!(failure.message, "expected 'foo/bar' file to be not empty");
    assert_eq!(failure.operator, Operator::NotStrictEqual);
    assert_eq!(failure.actual, text(""));
    assert_eq!(failure.expected, text(""));
    assert!(!failure.show_diff);

    assert.fs().create("foo/bar", "hello").await.unwrap();
    assert.file_is_not_empty("foo/bar").await.unwrap();
    assert_eq!(assert.counter().total(), 3);
}

#[tokio::test]
async fn custom_message_prefixes_failures() {
    let temp = TempDir::new().unwrap();
    let assert = build_assert(&temp);

    let failure = failure_of(
        assert
            .with_message("config should be generated")
            .file_exists("config/app.json")
            .await,
    );
    assert_eq!(
        failure.message,
        "config should be generated: expected 'config/app.json' file to exist"
    );
    assert_eq!(assert.counter().total(), 1);
}

#[tokio::test]
async fn checks_after_cleanup_report_missing_files() {
    let temp = TempDir::new().unwrap();
    let assert = build_assert(&temp);

    assert.fs().create("foo.txt", "hello").await.unwrap();
    assert.fs().cleanup().await.unwrap();

    assert!(!assert.fs().exists("foo.txt").await.unwrap());
    let failure = failure_of(assert.file_equals("foo.txt", "hello").await);
    assert_eq!(failure.operator, Operator::Exists);
}
