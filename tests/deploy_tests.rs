mod common;

use std::fs;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tempfile::tempdir;

use agrilink_kestra::{DeployError, DeployStatus, FlowDeployer, SecretStore, TransportError};
use common::{flow_meta, FakeKestra};

const SALE_FLOW: &str = "\
id: main-sale-workflow
namespace: agrilink
tasks:
  - id: assess_quality
    type: io.kestra.plugin.core.log.Log
    message: assessing crop quality
";

fn deployer(api: &Arc<FakeKestra>) -> FlowDeployer<FakeKestra> {
    FlowDeployer::new(Arc::clone(api), SecretStore::from_env(), "agrilink")
}

fn conflict(body: &str) -> TransportError {
    TransportError::Status {
        status: 409,
        body: body.to_string(),
    }
}

#[tokio::test]
async fn test_second_deploy_converges_to_updated() {
    let api = Arc::new(FakeKestra::default());
    {
        let mut responses = api.create_flow_responses.lock().unwrap();
        responses.push_back(Ok(flow_meta("main-sale-workflow")));
        responses.push_back(Err(conflict("Flow main-sale-workflow already exists")));
    }
    let deployer = deployer(&api);

    let first = deployer.deploy(SALE_FLOW).await.unwrap();
    assert_eq!(first.status, DeployStatus::Created);

    let second = deployer.deploy(SALE_FLOW).await.unwrap();
    assert_eq!(second.status, DeployStatus::Updated);

    assert_eq!(api.create_flow_calls.load(Ordering::SeqCst), 2);
    assert_eq!(api.update_flow_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_conflict_detected_from_message_text() {
    let api = Arc::new(FakeKestra::default());
    api.create_flow_responses
        .lock()
        .unwrap()
        .push_back(Err(TransportError::Status {
            status: 422,
            body: "a flow with this id already exists".to_string(),
        }));

    let outcome = deployer(&api).deploy(SALE_FLOW).await.unwrap();
    assert_eq!(outcome.status, DeployStatus::Updated);
}

#[tokio::test]
async fn test_update_uses_declared_identity() {
    let api = Arc::new(FakeKestra::default());
    api.create_flow_responses
        .lock()
        .unwrap()
        .push_back(Err(conflict("conflict")));

    let source = "id: crisis-shield\nnamespace: agrilink.emergency\ntasks: []\n";
    deployer(&api).deploy(source).await.unwrap();

    let (namespace, id) = api.last_update.lock().unwrap().clone().unwrap();
    assert_eq!(namespace, "agrilink.emergency");
    assert_eq!(id, "crisis-shield");
}

#[tokio::test]
async fn test_update_defaults_namespace_when_absent() {
    let api = Arc::new(FakeKestra::default());
    api.create_flow_responses
        .lock()
        .unwrap()
        .push_back(Err(conflict("conflict")));

    deployer(&api)
        .deploy("id: market-monitor\ntasks: []\n")
        .await
        .unwrap();

    let (namespace, id) = api.last_update.lock().unwrap().clone().unwrap();
    assert_eq!(namespace, "agrilink");
    assert_eq!(id, "market-monitor");
}

#[tokio::test]
async fn test_conflict_without_id_is_an_error() {
    let api = Arc::new(FakeKestra::default());
    api.create_flow_responses
        .lock()
        .unwrap()
        .push_back(Err(conflict("already exists")));

    let result = deployer(&api).deploy("namespace: agrilink\ntasks: []\n").await;
    assert!(matches!(result, Err(DeployError::MissingId)));
    assert_eq!(api.update_flow_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_non_conflict_failure_propagates() {
    let api = Arc::new(FakeKestra::default());
    api.create_flow_responses
        .lock()
        .unwrap()
        .push_back(Err(TransportError::Status {
            status: 400,
            body: "invalid flow yaml".to_string(),
        }));

    let result = deployer(&api).deploy(SALE_FLOW).await;
    match result {
        Err(DeployError::Rejected(TransportError::Status { status, body })) => {
            assert_eq!(status, 400);
            assert!(body.contains("invalid flow yaml"));
        }
        Ok(outcome) => panic!("expected rejected deploy, got {:?}", outcome.status),
        Err(other) => panic!("expected rejected deploy, got {:?}", other),
    }
    assert_eq!(api.update_flow_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_deploy_all_isolates_failures_per_file() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("sale.yml"), SALE_FLOW).unwrap();
    fs::write(
        dir.path().join("monitor.yaml"),
        "id: market-monitor\nnamespace: agrilink\ntasks: []\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("broken.yml"),
        "id: broken-flow\nnamespace: agrilink\nmarker: boom\n",
    )
    .unwrap();
    fs::write(dir.path().join("README.txt"), "not a flow").unwrap();

    let api = Arc::new(FakeKestra::default());
    *api.fail_create_containing.lock().unwrap() = Some("boom".to_string());

    let outcomes = deployer(&api).deploy_all(dir.path()).await.unwrap();
    assert_eq!(outcomes.len(), 3, "non-flow files are skipped");

    let failures: Vec<_> = outcomes.iter().filter(|(_, o)| !o.success).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0.as_str(), "broken.yml");
    assert!(failures[0].1.error.as_deref().unwrap().contains("boom"));

    for name in ["sale.yml", "monitor.yaml"] {
        let outcome = &outcomes[name];
        assert!(outcome.success, "{name} should deploy");
        assert_eq!(outcome.status, Some(DeployStatus::Created));
    }
}

#[tokio::test]
async fn test_deploy_all_missing_directory() {
    let api = Arc::new(FakeKestra::default());
    let result = deployer(&api).deploy_all("/does/not/exist").await;
    assert!(matches!(result, Err(DeployError::Directory { .. })));
}

#[tokio::test]
async fn test_deploy_substitutes_secrets_before_transmission() {
    std::env::set_var("KESTRA_SECRET_AGRI_DEPLOY_TEST_KEY", "resolved-key");

    // Fail on the placeholder marker: if substitution ran first, the marker
    // is gone by the time the transport sees the document.
    let api = Arc::new(FakeKestra::default());
    *api.fail_create_containing.lock().unwrap() = Some("secrets.".to_string());

    let source =
        "id: market-monitor\nnamespace: agrilink\nkey: ${{ secrets.AGRI_DEPLOY_TEST_KEY }}\n";
    let outcome = deployer(&api).deploy(source).await.unwrap();
    assert_eq!(outcome.status, DeployStatus::Created);
}
