//! Rendering never needs a cluster: the output is checked by parsing it back.

use std::path::PathBuf;

use hcp_api::{AvailabilityPolicy, HostedControlPlane, HostedControlPlaneSpec};
use hcpctl::{
	commands::{
		create::{create_cluster, CommonArgs},
		render::render_etcd,
		ClusterArgs,
	},
	fixtures::{ExampleOptions, ExamplePlatform, KubevirtOptions},
	render::OutputFormat,
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

fn common(output: OutputFormat) -> CommonArgs {
	CommonArgs {
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
		render: true,
		output,
		// Points nowhere: rendering must not connect
		cluster: ClusterArgs {
			kubeconfig: Some(PathBuf::from("/nonexistent/kubeconfig")),
			context: None,
		},
	}
}

fn options() -> ExampleOptions {
	ExampleOptions::builder()
		.namespace("clusters")
		.name("example")
		.release_image("quay.io/openshift-release-dev/ocp-release:4.9.0-x86_64")
		.pull_secret(br#"{"auths":{}}"#.to_vec())
		.ssh_public_key("ssh-rsa AAAA example")
		.platform(ExamplePlatform::KubeVirt(KubevirtOptions::default()))
		.build()
}

/// Split a YAML stream into its non-empty documents.
fn documents(output: &str) -> Vec<serde_yaml::Value> {
	serde_yaml::Deserializer::from_str(output)
		.map(|doc| serde_yaml::Value::deserialize(doc).expect("invalid YAML document"))
		.filter(|doc| !doc.is_null())
		.collect()
}

fn kinds_and_names(docs: &[serde_yaml::Value]) -> Vec<(String, String)> {
	docs.iter()
		.map(|doc| {
			(
				doc["kind"].as_str().unwrap().to_string(),
				doc["metadata"]["name"].as_str().unwrap().to_string(),
			)
		})
		.collect()
}

#[tokio::test]
async fn test_render_cluster_yaml() {
	let mut output = Vec::new();
	create_cluster(
		&common(OutputFormat::Yaml),
		&options(),
		&mut output,
		&CancellationToken::new(),
	)
	.await
	.expect("render should succeed");

	let output = String::from_utf8(output).unwrap();
	assert!(output.ends_with("---\n"));

	let docs = documents(&output);
	assert_eq!(
		kinds_and_names(&docs),
		[
			("Namespace".to_string(), "clusters".to_string()),
			("Secret".to_string(), "example-pull-secret".to_string()),
			("Secret".to_string(), "example-ssh-key".to_string()),
			("Secret".to_string(), "example-etcd-encryption-key".to_string()),
			("HostedCluster".to_string(), "example".to_string()),
			("NodePool".to_string(), "example".to_string()),
		]
	);

	// Rendering assumes a cluster without routes
	let services = docs[4]["spec"]["services"].as_sequence().unwrap();
	assert!(services
		.iter()
		.skip(1)
		.all(|s| s["servicePublishingStrategy"]["type"] == "NodePort"));

	let pool = &docs[5]["spec"];
	assert_eq!(pool["nodeCount"], 2);
	assert_eq!(pool["platform"]["type"], "KubeVirt");
	assert_eq!(pool["platform"]["kubevirt"]["memory"], "4Gi");
}

#[tokio::test]
async fn test_render_cluster_json_without_node_pool() {
	let mut opts = options();
	opts.node_pool_replicas = -1;
	opts.ssh_public_key = None;

	let mut output = Vec::new();
	create_cluster(
		&common(OutputFormat::Json),
		&opts,
		&mut output,
		&CancellationToken::new(),
	)
	.await
	.expect("render should succeed");

	let output = String::from_utf8(output).unwrap();
	let docs: Vec<serde_json::Value> = output
		.split("---\n")
		.filter(|chunk| !chunk.trim().is_empty())
		.map(|chunk| serde_json::from_str(chunk).expect("invalid JSON document"))
		.collect();
	let kinds: Vec<_> = docs.iter().map(|d| d["kind"].as_str().unwrap()).collect();
	assert_eq!(kinds, ["Namespace", "Secret", "Secret", "HostedCluster"]);
}

#[tokio::test]
async fn test_render_is_deterministic() {
	let mut first = Vec::new();
	let mut second = Vec::new();
	for out in [&mut first, &mut second] {
		create_cluster(
			&common(OutputFormat::Yaml),
			&options(),
			out,
			&CancellationToken::new(),
		)
		.await
		.unwrap();
	}
	assert_eq!(first, second);
}

#[tokio::test]
async fn test_render_rejects_missing_release_image() {
	let mut opts = options();
	opts.release_image = String::new();

	let mut output = Vec::new();
	let err = create_cluster(
		&common(OutputFormat::Yaml),
		&opts,
		&mut output,
		&CancellationToken::new(),
	)
	.await
	.unwrap_err();
	assert!(err.to_string().contains("release image"), "{err:?}");
	assert!(output.is_empty());
}

fn hosted_control_plane(policy: AvailabilityPolicy) -> HostedControlPlane {
	let mut hcp = HostedControlPlane::new(
		"example",
		HostedControlPlaneSpec {
			controller_availability_policy: policy,
			..Default::default()
		},
	);
	hcp.metadata.namespace = Some("clusters-example".to_string());
	hcp.metadata.uid = Some("0f6c6a4e-1b0e-4d1c-9b7a-3f1d2a4c5e6f".to_string());
	hcp
}

#[tokio::test]
async fn test_render_etcd_highly_available() {
	let mut output = Vec::new();
	render_etcd(
		&hosted_control_plane(AvailabilityPolicy::HighlyAvailable),
		"quay.io/openshift/etcd:4.9",
		OutputFormat::Yaml,
		&mut output,
	)
	.await
	.expect("render should succeed");

	let docs = documents(&String::from_utf8(output).unwrap());
	assert_eq!(
		kinds_and_names(&docs),
		[
			("Service".to_string(), "etcd-discovery".to_string()),
			("Service".to_string(), "etcd-client".to_string()),
			("StatefulSet".to_string(), "etcd".to_string()),
		]
	);
	for doc in &docs {
		assert_eq!(doc["metadata"]["namespace"], "clusters-example");
		let owner = &doc["metadata"]["ownerReferences"][0];
		assert_eq!(owner["kind"], "HostedControlPlane");
		assert_eq!(owner["controller"], true);
	}

	let sts = &docs[2]["spec"];
	assert_eq!(sts["replicas"], 3);
	assert_eq!(
		sts["template"]["spec"]["containers"][0]["image"],
		"quay.io/openshift/etcd:4.9"
	);
	assert_eq!(
		sts["volumeClaimTemplates"][0]["spec"]["resources"]["requests"]["storage"],
		"4Gi"
	);
}

#[tokio::test]
async fn test_render_etcd_requires_namespace() {
	let mut hcp = hosted_control_plane(AvailabilityPolicy::SingleReplica);
	hcp.metadata.namespace = None;

	let mut output = Vec::new();
	let result = render_etcd(&hcp, "", OutputFormat::Json, &mut output).await;
	assert!(result.is_err());
	assert!(output.is_empty());
}

#[tokio::test]
async fn test_render_etcd_requires_uid() {
	let mut hcp = hosted_control_plane(AvailabilityPolicy::SingleReplica);
	hcp.metadata.uid = None;

	let mut output = Vec::new();
	let err = render_etcd(&hcp, "", OutputFormat::Yaml, &mut output)
		.await
		.unwrap_err();
	assert!(err.to_string().contains("metadata.uid"), "{err:?}");
	assert!(output.is_empty());
}
