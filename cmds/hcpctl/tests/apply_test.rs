//! Integration tests for applying a hosted cluster's objects to a mock
//! management cluster.

use std::path::PathBuf;

use assert_matches::assert_matches;
use hcpctl::{
	capabilities::ManagementClusterCapabilities,
	commands::{
		create::{create_cluster, CommonArgs},
		ClusterArgs,
	},
	executor::{ExecuteError, Executor, Mode, FIELD_MANAGER},
	fixtures::{ExampleOptions, ExampleResources},
	k8s::{
		apply::{KubeStore, StoreError},
		client::ClusterConnection,
	},
	render::{OutputFormat, YamlEncoder},
};
use k8s_mock::{DiscoveryMode, HttpMockK8sServer, RunningHttpMockK8sServer};
use kube::api::DynamicObject;
use tokio_util::sync::CancellationToken;

const SECRETS_PATH: &str = "/api/v1/namespaces/clusters/secrets";
const HOSTED_CLUSTERS_PATH: &str =
	"/apis/hypershift.openshift.io/v1alpha1/namespaces/clusters/hostedclusters";
const NODE_POOLS_PATH: &str = "/apis/hypershift.openshift.io/v1alpha1/namespaces/clusters/nodepools";

fn options() -> ExampleOptions {
	ExampleOptions::builder()
		.namespace("clusters")
		.name("example")
		.release_image("quay.io/openshift-release-dev/ocp-release:4.9.0-x86_64")
		.pull_secret(br#"{"auths":{}}"#.to_vec())
		.build()
}

fn objects() -> Vec<DynamicObject> {
	ExampleResources::new(&options(), &ManagementClusterCapabilities::default())
		.unwrap()
		.as_objects()
		.unwrap()
}

async fn store_for(server: &RunningHttpMockK8sServer, objects: &[DynamicObject]) -> KubeStore {
	let connection = ClusterConnection::from_kubeconfig(server.kubeconfig(), None)
		.await
		.expect("failed to create connection");
	KubeStore::for_objects(connection.client().clone(), objects)
		.await
		.expect("failed to discover resources")
}

fn expected_targets() -> Vec<(String, String)> {
	vec![
		("/api/v1/namespaces".to_string(), "clusters".to_string()),
		(SECRETS_PATH.to_string(), "example-pull-secret".to_string()),
		(SECRETS_PATH.to_string(), "example-etcd-encryption-key".to_string()),
		(HOSTED_CLUSTERS_PATH.to_string(), "example".to_string()),
		(NODE_POOLS_PATH.to_string(), "example".to_string()),
	]
}

async fn run_apply_test(discovery_mode: DiscoveryMode) {
	let server = HttpMockK8sServer::builder()
		.discovery_mode(discovery_mode)
		.build()
		.start()
		.await;
	let objects = objects();
	let store = store_for(&server, &objects).await;

	let mut output = Vec::new();
	let summary = Executor::new(&store, &mut output, &YamlEncoder)
		.execute(&objects, Mode::Apply, &CancellationToken::new())
		.await
		.expect("apply should succeed");
	assert_eq!(summary.processed, 5);
	assert!(output.is_empty(), "apply must not write rendered output");

	let patches = server.patches();
	let targets: Vec<_> = patches
		.iter()
		.map(|p| (p.api_path.clone(), p.name.clone()))
		.collect();
	assert_eq!(targets, expected_targets());
	for patch in &patches {
		assert_eq!(patch.field_manager.as_deref(), Some(FIELD_MANAGER));
		assert!(patch.force, "{} was applied without force", patch.name);
		assert_eq!(
			patch.content_type.as_deref(),
			Some("application/apply-patch+yaml")
		);
	}

	let cluster = server
		.resource(HOSTED_CLUSTERS_PATH, "example")
		.expect("HostedCluster should be stored");
	assert_eq!(cluster["spec"]["pullSecret"]["name"], "example-pull-secret");
	assert_eq!(
		cluster["spec"]["secretEncryption"]["aescbc"]["activeKey"]["name"],
		"example-etcd-encryption-key"
	);
}

#[tokio::test]
async fn test_apply_aggregated_discovery() {
	run_apply_test(DiscoveryMode::Aggregated).await;
}

#[tokio::test]
async fn test_apply_legacy_discovery() {
	run_apply_test(DiscoveryMode::Legacy).await;
}

#[tokio::test]
async fn test_reapply_converges() {
	let server = HttpMockK8sServer::builder().build().start().await;
	let objects = objects();
	let store = store_for(&server, &objects).await;

	for _ in 0..2 {
		Executor::new(&store, std::io::sink(), &YamlEncoder)
			.execute(&objects, Mode::Apply, &CancellationToken::new())
			.await
			.expect("apply should succeed");
	}

	let patches = server.patches();
	assert_eq!(patches.len(), 10);
	let (first, second) = patches.split_at(5);
	for (a, b) in first.iter().zip(second) {
		assert_eq!(a.api_path, b.api_path);
		assert_eq!(a.name, b.name);
		assert_eq!(a.body, b.body, "{} changed between runs", a.name);
	}
}

#[tokio::test]
async fn test_rejected_object_aborts_run() {
	let server = HttpMockK8sServer::builder()
		.rejected_names(vec!["example-etcd-encryption-key".to_string()])
		.build()
		.start()
		.await;
	let objects = objects();
	let store = store_for(&server, &objects).await;

	let result = Executor::new(&store, std::io::sink(), &YamlEncoder)
		.execute(&objects, Mode::Apply, &CancellationToken::new())
		.await;
	assert_matches!(
		result,
		Err(ExecuteError::Apply {
			ref key,
			source: StoreError::Rejected { code: 422, .. },
		}) if key.name == "example-etcd-encryption-key"
	);

	let names: Vec<_> = server.patches().into_iter().map(|p| p.name).collect();
	assert_eq!(
		names,
		["clusters", "example-pull-secret", "example-etcd-encryption-key"]
	);
	assert!(server.resource(SECRETS_PATH, "example-pull-secret").is_some());
	assert!(server.resource(HOSTED_CLUSTERS_PATH, "example").is_none());
}

#[tokio::test]
async fn test_unknown_kind_fails_at_apply() {
	let server = HttpMockK8sServer::builder().build().start().await;
	let mut objects = objects();
	let route: DynamicObject = serde_json::from_value(serde_json::json!({
		"apiVersion": "route.openshift.io/v1",
		"kind": "Route",
		"metadata": {"name": "oauth", "namespace": "clusters"}
	}))
	.unwrap();
	objects.insert(1, route);
	let store = store_for(&server, &objects).await;

	let result = Executor::new(&store, std::io::sink(), &YamlEncoder)
		.execute(&objects, Mode::Apply, &CancellationToken::new())
		.await;
	assert_matches!(
		result,
		Err(ExecuteError::Apply {
			source: StoreError::UnknownResourceType { ref kind, .. },
			..
		}) if kind == "Route"
	);
	assert_eq!(server.patches().len(), 1);
}

#[tokio::test]
async fn test_cancelled_run_applies_nothing() {
	let server = HttpMockK8sServer::builder().build().start().await;
	let objects = objects();
	let store = store_for(&server, &objects).await;

	let token = CancellationToken::new();
	token.cancel();
	let result = Executor::new(&store, std::io::sink(), &YamlEncoder)
		.execute(&objects, Mode::Apply, &token)
		.await;
	assert_matches!(
		result,
		Err(ExecuteError::Cancelled {
			applied: 0,
			remaining: 5
		})
	);
	assert!(server.patches().is_empty());
}

#[tokio::test]
async fn test_create_cluster_uses_route_capability() {
	let server = HttpMockK8sServer::builder()
		.discovery(k8s_mock::MockDiscovery::default().with_routes())
		.build()
		.start()
		.await;

	let dir = tempfile::tempdir().unwrap();
	let kubeconfig = dir.path().join("kubeconfig");
	std::fs::write(&kubeconfig, serde_json::to_vec(&server.kubeconfig()).unwrap()).unwrap();

	let common = CommonArgs {
		namespace: None,
		name: None,
		release_image: None,
		pull_secret: PathBuf::from("unused"),
		ssh_key: None,
		infra_id: None,
		etcd_encryption_key_file: None,
		node_pool_replicas: None,
		network_type: None,
		control_plane_availability_policy: None,
		base_domain: None,
		render: false,
		output: OutputFormat::Yaml,
		cluster: ClusterArgs {
			kubeconfig: Some(kubeconfig),
			context: None,
		},
	};

	let mut output = Vec::new();
	create_cluster(&common, &options(), &mut output, &CancellationToken::new())
		.await
		.expect("create should succeed");
	assert!(output.is_empty());

	let cluster = server
		.resource(HOSTED_CLUSTERS_PATH, "example")
		.expect("HostedCluster should be stored");
	let services = cluster["spec"]["services"].as_array().unwrap();
	let strategies: Vec<_> = services
		.iter()
		.map(|s| {
			(
				s["service"].as_str().unwrap(),
				s["servicePublishingStrategy"]["type"].as_str().unwrap(),
			)
		})
		.collect();
	assert_eq!(
		strategies,
		[
			("APIServer", "LoadBalancer"),
			("OAuthServer", "Route"),
			("Konnectivity", "Route"),
			("Ignition", "Route"),
		]
	);
}
