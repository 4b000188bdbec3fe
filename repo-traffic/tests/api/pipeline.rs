use crate::helpers::{TestApp, views_path};
use repo_traffic::TrafficError;
use repo_traffic::configuration::OutputLayout;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, ResponseTemplate};

const HEADER: &str = "timestamp,count,uniques\n";

#[tokio::test]
async fn static_list_is_fetched_once_per_name_in_listed_order() {
    // Arrange
    let app = TestApp::spawn_static(&["C", "A", "B"]).await;
    for repo in ["A", "B", "C"] {
        app.mount_views(repo, json!([])).await;
    }

    // Act
    let report = app.run().await.expect("Run aborted.");

    // Assert
    assert_eq!(
        app.traffic_requests().await,
        vec![views_path("C"), views_path("A"), views_path("B")]
    );
    let order: Vec<&str> = report.outcomes.iter().map(|o| o.repo.as_ref()).collect();
    assert_eq!(order, vec!["C", "A", "B"]);
    assert_eq!(report.to_string(), "3 succeeded, 0 failed");
}

#[tokio::test]
async fn one_missing_repository_does_not_stop_the_others() {
    // Arrange
    let app = TestApp::spawn_static(&["A", "B"]).await;
    app.mount_views(
        "A",
        json!([
            { "timestamp": "2023-01-01T00:00:00Z", "count": 5, "uniques": 2 },
            { "timestamp": "2023-01-02T00:00:00Z", "count": 7, "uniques": 3 },
        ]),
    )
    .await;
    app.mount_views_status("B", 404).await;

    // A file left behind by an earlier run for B.
    let stale = app.artifact("B");
    std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
    std::fs::write(&stale, "from an earlier run").unwrap();

    // Act
    let report = app.run().await.expect("Run aborted.");

    // Assert
    assert_eq!(
        app.read_artifact("A"),
        "timestamp,count,uniques\n\
         2023-01-01T00:00:00Z,5,2\n\
         2023-01-02T00:00:00Z,7,3\n"
    );
    assert_eq!(app.read_artifact("B"), "from an earlier run");
    assert_eq!(report.to_string(), "1 succeeded, 1 failed");
    let failure = report.failed().next().unwrap();
    assert_eq!(failure.repo.as_ref(), "B");
    assert!(matches!(failure.result, Err(TrafficError::NotFound(_))));
}

#[tokio::test]
async fn failed_repository_gets_no_artifact() {
    // Arrange
    let app = TestApp::spawn_static(&["A", "B", "C"]).await;
    app.mount_views("A", json!([])).await;
    app.mount_views_status("B", 500).await;
    app.mount_views("C", json!([])).await;

    // Act
    let report = app.run().await.expect("Run aborted.");

    // Assert
    assert!(app.artifact("A").exists());
    assert!(!app.artifact("B").exists());
    assert!(app.artifact("C").exists());
    assert!(!report.is_success());
    assert_eq!(report.to_string(), "2 succeeded, 1 failed");
    assert!(matches!(
        report.failed().next().unwrap().result,
        Err(TrafficError::Transport(_))
    ));
}

#[tokio::test]
async fn dynamic_mode_exports_every_listed_repository() {
    // Arrange
    let app = TestApp::spawn().await;
    app.mount_listing(&["X", "Y", "Z"]).await;
    for repo in ["X", "Y", "Z"] {
        app.mount_views(repo, json!([])).await;
    }

    // Act
    let report = app.run().await.expect("Run aborted.");

    // Assert
    for repo in ["X", "Y", "Z"] {
        assert_eq!(app.read_artifact(repo), HEADER);
    }
    assert_eq!(report.to_string(), "3 succeeded, 0 failed");
    assert!(report.is_success());
}

#[tokio::test]
async fn missing_credential_aborts_before_any_request() {
    // Arrange
    let app = TestApp::spawn().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.github)
        .await;

    // Act
    let result = app.run_without_token().await;

    // Assert
    assert!(matches!(result, Err(TrafficError::Auth(_))));
    assert!(app.github.received_requests().await.unwrap().is_empty());
    assert!(!app.output_dir().exists());
}

#[tokio::test]
async fn rejected_listing_aborts_the_run() {
    // Arrange
    let app = TestApp::spawn().await;
    Mock::given(method("GET"))
        .and(path(crate::helpers::listing_path()))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&app.github)
        .await;

    // Act
    let result = app.run().await;

    // Assert
    assert!(matches!(result, Err(TrafficError::Auth(_))));
    assert!(app.traffic_requests().await.is_empty());
}

#[tokio::test]
async fn invalid_static_name_aborts_the_run() {
    // Arrange
    let app = TestApp::spawn_static(&["A", "../escape"]).await;

    // Act
    let result = app.run().await;

    // Assert
    assert!(matches!(result, Err(TrafficError::InvalidResource(_))));
    assert!(app.github.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_names_are_processed_every_time() {
    // Arrange
    let app = TestApp::spawn_static(&["A", "A"]).await;
    Mock::given(method("GET"))
        .and(path(views_path("A")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "views": [] })))
        .expect(2)
        .mount(&app.github)
        .await;

    // Act
    let report = app.run().await.expect("Run aborted.");

    // Assert
    assert_eq!(report.to_string(), "2 succeeded, 0 failed");
    assert_eq!(app.read_artifact("A"), HEADER);
}

#[tokio::test]
async fn flat_layout_writes_into_the_root_directory() {
    // Arrange
    let mut app = TestApp::spawn_static(&["A"]).await;
    app.settings.output.layout = OutputLayout::Flat;
    app.mount_views("A", json!([])).await;

    // Act
    let report = app.run().await.expect("Run aborted.");

    // Assert
    let expected = app.output_dir().join("traffic_A_2023-05-19.csv");
    assert_eq!(report.outcomes[0].result.as_ref().unwrap(), &expected);
    assert_eq!(std::fs::read_to_string(expected).unwrap(), HEADER);
}

#[tokio::test]
async fn concurrent_fetches_keep_the_report_in_enumeration_order() {
    // Arrange
    let names = ["r1", "r2", "r3", "r4", "r5", "r6"];
    let mut app = TestApp::spawn_static(&names).await;
    app.settings.pipeline.max_concurrent_fetches = 4;
    for (i, repo) in names.iter().enumerate() {
        // Earlier repositories answer more slowly, so completion order is reversed.
        let delay = Duration::from_millis(20 * (names.len() - i) as u64);
        Mock::given(method("GET"))
            .and(path(views_path(repo)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "views": [] }))
                    .set_delay(delay),
            )
            .expect(1)
            .mount(&app.github)
            .await;
    }

    // Act
    let report = app.run().await.expect("Run aborted.");

    // Assert
    let order: Vec<&str> = report.outcomes.iter().map(|o| o.repo.as_ref()).collect();
    assert_eq!(order, names);
    assert_eq!(report.to_string(), "6 succeeded, 0 failed");
    for repo in names {
        assert!(app.artifact(repo).exists());
    }
}

#[tokio::test]
async fn rejected_token_during_fetch_aborts_the_run() {
    // Arrange
    let app = TestApp::spawn_static(&["A", "B", "C"]).await;
    for repo in ["A", "B", "C"] {
        app.mount_views_status(repo, 401).await;
    }

    // Act
    let result = app.run().await;

    // Assert
    assert!(matches!(result, Err(TrafficError::Auth(_))));
    assert_eq!(app.traffic_requests().await, vec![views_path("A")]);
    for repo in ["A", "B", "C"] {
        assert!(!app.artifact(repo).exists());
    }
}

#[tokio::test]
async fn write_failure_is_isolated_to_its_repository() {
    // Arrange
    let app = TestApp::spawn_static(&["A", "B"]).await;
    app.mount_views("A", json!([])).await;
    app.mount_views("B", json!([])).await;
    // A regular file where A's directory should go.
    std::fs::create_dir_all(app.output_dir()).unwrap();
    std::fs::write(app.output_dir().join("A"), "not a directory").unwrap();

    // Act
    let report = app.run().await.expect("Run aborted.");

    // Assert
    assert_eq!(report.to_string(), "1 succeeded, 1 failed");
    assert_eq!(report.outcomes[0].repo.as_ref(), "A");
    assert!(matches!(
        report.outcomes[0].result,
        Err(TrafficError::Write { .. })
    ));
    assert_eq!(app.read_artifact("B"), HEADER);
}
