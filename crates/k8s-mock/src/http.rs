//! HTTP-based mock Kubernetes server using wiremock.
//!
//! Serves a real HTTP endpoint, so clients connect through an ordinary
//! kubeconfig.

use std::{
	collections::HashMap,
	sync::{Arc, Mutex, RwLock},
};

use bon::Builder;
use kube::config::Kubeconfig;
use serde_json::{json, Value};
use tracing::{debug, trace};
use wiremock::{
	matchers::{header_regex, method, path, path_regex},
	Mock, MockServer, Request, Respond, ResponseTemplate,
};

use super::{
	discovery::{DiscoveryMode, MockApiResource, MockDiscovery},
	helpers::{merge_json, parse_resource_path, status_body},
};

/// Objects keyed by (collection path, name).
pub type SharedResources = Arc<RwLock<HashMap<(String, String), Value>>>;

const AGGREGATED_DISCOVERY_CONTENT_TYPE: &str =
	"application/json;g=apidiscovery.k8s.io;v=v2;as=APIGroupDiscoveryList";

/// A PATCH request received by the mock server.
#[derive(Debug, Clone)]
pub struct RecordedPatch {
	/// Collection path, e.g. `/api/v1/namespaces/clusters/secrets`.
	pub api_path: String,
	pub name: String,
	pub field_manager: Option<String>,
	pub force: bool,
	pub content_type: Option<String>,
	pub body: Value,
}

/// A mock Kubernetes server exposed over HTTP.
#[derive(Builder)]
pub struct HttpMockK8sServer {
	#[builder(default)]
	discovery_mode: DiscoveryMode,
	/// API surface advertised by discovery.
	#[builder(default)]
	discovery: MockDiscovery,
	/// Initial cluster state as raw manifests, addressed through `discovery`.
	#[builder(default)]
	resources: Vec<Value>,
	/// Group-versions listed in `/apis` whose resource list answers 503.
	#[builder(default)]
	unavailable_group_versions: Vec<String>,
	/// Object names whose PATCH is rejected with 422.
	#[builder(default)]
	rejected_names: Vec<String>,
	/// Make the group listing endpoints (`/api`, `/apis`) fail outright.
	#[builder(default)]
	discovery_unavailable: bool,
}

/// A running HTTP mock server instance.
pub struct RunningHttpMockK8sServer {
	server: MockServer,
	resources: SharedResources,
	patches: Arc<Mutex<Vec<RecordedPatch>>>,
}

impl HttpMockK8sServer {
	pub async fn start(self) -> RunningHttpMockK8sServer {
		let server = MockServer::start().await;
		debug!(uri = %server.uri(), "started mock k8s server");

		let mut stored = HashMap::new();
		for manifest in self.resources {
			match object_address(&manifest, &self.discovery) {
				Some(key) => {
					trace!(api_path = %key.0, name = %key.1, "seeded object");
					stored.insert(key, manifest);
				}
				None => debug!("skipping manifest of a kind discovery does not serve"),
			}
		}
		stored
			.entry(("/api/v1/namespaces".to_string(), "default".to_string()))
			.or_insert_with(|| json!({"apiVersion": "v1", "kind": "Namespace", "metadata": {"name": "default"}}));

		let resources: SharedResources = Arc::new(RwLock::new(stored));
		let patches = Arc::new(Mutex::new(Vec::new()));

		Mock::given(method("GET"))
			.and(path("/version"))
			.respond_with(ResponseTemplate::new(200).set_body_json(version_info()))
			.mount(&server)
			.await;

		let mut failing: Vec<String> = self
			.unavailable_group_versions
			.iter()
			.map(|gv| format!("/apis/{gv}"))
			.collect();
		if self.discovery_unavailable {
			failing.extend(["/api".to_string(), "/apis".to_string()]);
		}
		for endpoint in &failing {
			Mock::given(method("GET"))
				.and(path(endpoint.as_str()))
				.respond_with(ResponseTemplate::new(503).set_body_json(status_body(
					503,
					"ServiceUnavailable",
					&format!("the server is currently unable to handle the request ({endpoint})"),
				)))
				.with_priority(1)
				.mount(&server)
				.await;
		}

		mount_discovery(&server, &self.discovery, self.discovery_mode).await;

		Mock::given(method("PATCH"))
			.and(path_regex(r"^/apis?/"))
			.respond_with(ApplyHandler {
				resources: Arc::clone(&resources),
				patches: Arc::clone(&patches),
				rejected_names: self.rejected_names,
			})
			.mount(&server)
			.await;

		Mock::given(method("GET"))
			.and(path_regex(r"^/apis?/"))
			.respond_with(ReadHandler {
				resources: Arc::clone(&resources),
			})
			.mount(&server)
			.await;

		RunningHttpMockK8sServer {
			server,
			resources,
			patches,
		}
	}
}

/// Collection path and name under which `manifest` is served.
fn object_address(manifest: &Value, discovery: &MockDiscovery) -> Option<(String, String)> {
	let api_version = manifest["apiVersion"].as_str()?;
	let kind = manifest["kind"].as_str()?;
	let name = manifest["metadata"]["name"].as_str()?;
	let resource = discovery.find(api_version, kind)?;

	let root = if api_version.contains('/') { "apis" } else { "api" };
	let collection = if resource.namespaced {
		let namespace = manifest["metadata"]["namespace"]
			.as_str()
			.unwrap_or("default");
		format!("/{root}/{api_version}/namespaces/{namespace}/{}", resource.name)
	} else {
		format!("/{root}/{api_version}/{}", resource.name)
	};
	Some((collection, name.to_string()))
}

impl RunningHttpMockK8sServer {
	/// Base URI, e.g. `http://127.0.0.1:12345`.
	pub fn uri(&self) -> String {
		self.server.uri()
	}

	/// All PATCH requests received so far, in arrival order.
	pub fn patches(&self) -> Vec<RecordedPatch> {
		self.patches.lock().expect("patch log poisoned").clone()
	}

	/// Current stored state of an object, if any.
	pub fn resource(&self, api_path: &str, name: &str) -> Option<Value> {
		self.resources
			.read()
			.expect("resource map poisoned")
			.get(&(api_path.to_string(), name.to_string()))
			.cloned()
	}

	/// Kubeconfig whose current context is `mock-context`.
	pub fn kubeconfig(&self) -> Kubeconfig {
		self.kubeconfig_with_context("mock-context")
	}

	/// Kubeconfig pointing at this server under the given context name.
	pub fn kubeconfig_with_context(&self, context_name: &str) -> Kubeconfig {
		serde_json::from_value(json!({
			"apiVersion": "v1",
			"kind": "Config",
			"clusters": [{
				"name": "mock-cluster",
				"cluster": {"server": self.uri(), "insecure-skip-tls-verify": true}
			}],
			"users": [{"name": "mock-user", "user": {}}],
			"contexts": [{
				"name": context_name,
				"context": {"cluster": "mock-cluster", "user": "mock-user", "namespace": "default"}
			}],
			"current-context": context_name
		}))
		.expect("mock kubeconfig is well formed")
	}
}

/// Server-side apply: records the request and deep-merges the body into the
/// stored object. Dry-run requests are answered but not persisted.
struct ApplyHandler {
	resources: SharedResources,
	patches: Arc<Mutex<Vec<RecordedPatch>>>,
	rejected_names: Vec<String>,
}

impl Respond for ApplyHandler {
	fn respond(&self, req: &Request) -> ResponseTemplate {
		let (api_path, name) = parse_resource_path(req.url.path());
		let query: HashMap<String, String> = req.url.query_pairs().into_owned().collect();
		let body: Value = serde_json::from_slice(&req.body).unwrap_or(Value::Null);

		self.patches
			.lock()
			.expect("patch log poisoned")
			.push(RecordedPatch {
				api_path: api_path.clone(),
				name: name.clone(),
				field_manager: query.get("fieldManager").cloned(),
				force: query.get("force").is_some_and(|v| v == "true"),
				content_type: req
					.headers
					.get("content-type")
					.and_then(|v| v.to_str().ok())
					.map(str::to_string),
				body: body.clone(),
			});

		if self.rejected_names.contains(&name) {
			return ResponseTemplate::new(422).set_body_json(status_body(
				422,
				"Invalid",
				&format!("{name} is invalid: rejected by mock admission"),
			));
		}

		let key = (api_path, name);
		let mut resources = self.resources.write().expect("resource map poisoned");
		let merged = match resources.get(&key) {
			Some(existing) => merge_json(existing.clone(), body),
			None => body,
		};
		if !query.contains_key("dryRun") {
			resources.insert(key, merged.clone());
		}
		ResponseTemplate::new(200).set_body_json(merged)
	}
}

/// GET of a single object, or a LIST when the path names a collection.
struct ReadHandler {
	resources: SharedResources,
}

impl Respond for ReadHandler {
	fn respond(&self, req: &Request) -> ResponseTemplate {
		let resources = self.resources.read().expect("resource map poisoned");
		let request_path = req.url.path();

		if let Some(object) = resources.get(&parse_resource_path(request_path)) {
			return ResponseTemplate::new(200).set_body_json(object);
		}

		let items: Vec<&Value> = resources
			.iter()
			.filter(|((collection, _), _)| collection == request_path)
			.map(|(_, object)| object)
			.collect();
		if items.is_empty() {
			return ResponseTemplate::new(404).set_body_json(status_body(404, "NotFound", "not found"));
		}
		ResponseTemplate::new(200).set_body_json(json!({
			"kind": "List",
			"apiVersion": "v1",
			"metadata": {"resourceVersion": "1"},
			"items": items
		}))
	}
}

fn version_info() -> Value {
	json!({
		"major": "1",
		"minor": "28",
		"gitVersion": "v1.28.0",
		"gitCommit": "fake",
		"gitTreeState": "clean",
		"buildDate": "2024-01-01T00:00:00Z",
		"goVersion": "go1.21.0",
		"compiler": "gc",
		"platform": "linux/amd64"
	})
}

fn split_group_version(gv: &str) -> (&str, &str) {
	gv.split_once('/').unwrap_or(("", gv))
}

/// One `APIGroupDiscovery` entry of an aggregated discovery document.
fn aggregated_group(group: &str, version: &str, resources: &[MockApiResource]) -> Value {
	let resources: Vec<Value> = resources
		.iter()
		.map(|r| {
			json!({
				"resource": r.name,
				"responseKind": {"group": group, "version": version, "kind": r.kind},
				"scope": if r.namespaced { "Namespaced" } else { "Cluster" },
				"verbs": r.verbs,
			})
		})
		.collect();
	json!({
		"metadata": {"name": group},
		"versions": [{"version": version, "resources": resources, "freshness": "Current"}]
	})
}

/// A legacy `APIResourceList` for one group-version.
fn resource_list(group_version: &str, resources: &[MockApiResource]) -> Value {
	let resources: Vec<Value> = resources
		.iter()
		.map(|r| {
			json!({
				"name": r.name,
				"singularName": "",
				"namespaced": r.namespaced,
				"kind": r.kind,
				"verbs": r.verbs,
			})
		})
		.collect();
	json!({
		"kind": "APIResourceList",
		"apiVersion": "v1",
		"groupVersion": group_version,
		"resources": resources
	})
}

async fn mount_json(server: &MockServer, endpoint: &str, body: Value) {
	Mock::given(method("GET"))
		.and(path(endpoint))
		.respond_with(ResponseTemplate::new(200).set_body_json(body))
		.mount(server)
		.await;
}

/// Mount for requests whose Accept header asks for aggregated discovery.
async fn mount_aggregated(server: &MockServer, endpoint: &str, response: ResponseTemplate) {
	Mock::given(method("GET"))
		.and(path(endpoint))
		.and(header_regex("accept", "apidiscovery"))
		.respond_with(response)
		.mount(server)
		.await;
}

async fn mount_discovery(server: &MockServer, discovery: &MockDiscovery, mode: DiscoveryMode) {
	match mode {
		DiscoveryMode::Aggregated => {
			let core = json!({
				"kind": "APIGroupDiscoveryList",
				"apiVersion": "apidiscovery.k8s.io/v2",
				"items": [aggregated_group("", "v1", &discovery.core_resources)]
			});
			let groups = json!({
				"kind": "APIGroupDiscoveryList",
				"apiVersion": "apidiscovery.k8s.io/v2",
				"items": discovery
					.group_resources
					.iter()
					.map(|(gv, rs)| {
						let (group, version) = split_group_version(gv);
						aggregated_group(group, version, rs)
					})
					.collect::<Vec<_>>()
			});
			// kube only parses these with the aggregated content type, which
			// set_body_json would replace
			for (endpoint, body) in [("/api", core), ("/apis", groups)] {
				let body = serde_json::to_vec(&body).expect("discovery JSON serializes");
				mount_aggregated(
					server,
					endpoint,
					ResponseTemplate::new(200).set_body_raw(body, AGGREGATED_DISCOVERY_CONTENT_TYPE),
				)
				.await;
			}
		}
		DiscoveryMode::Legacy => {
			for endpoint in ["/api", "/apis"] {
				mount_aggregated(server, endpoint, ResponseTemplate::new(406)).await;
			}
		}
	}

	mount_json(
		server,
		"/api",
		json!({"kind": "APIVersions", "versions": ["v1"], "serverAddressByClientCIDRs": []}),
	)
	.await;

	let groups: Vec<Value> = discovery
		.group_resources
		.keys()
		.map(|gv| {
			let (group, version) = split_group_version(gv);
			let version = json!({"groupVersion": gv, "version": version});
			json!({"name": group, "versions": [version.clone()], "preferredVersion": version})
		})
		.collect();
	mount_json(
		server,
		"/apis",
		json!({"kind": "APIGroupList", "apiVersion": "v1", "groups": groups}),
	)
	.await;

	mount_json(server, "/api/v1", resource_list("v1", &discovery.core_resources)).await;
	for (gv, rs) in &discovery.group_resources {
		mount_json(server, &format!("/apis/{gv}"), resource_list(gv, rs)).await;
	}
}
