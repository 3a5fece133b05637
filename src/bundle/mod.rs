// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Import bundle generation.
//!
//! An [`ImportBundle`] is everything a managed cluster needs to start the agent:
//! `definitions` (the CRDs the agent operator serves) and `manifests` (namespace,
//! RBAC, bootstrap kubeconfig, operator Deployment, and the `Klusterlet` resource).
//!
//! Generation is a pure function of the cluster name, the bootstrap token and CA,
//! and the controller configuration. The same input always yields the same bundle,
//! which is what lets reconcilers compare it against what is already stored and skip
//! redundant writes.
//!
//! # Serialized form
//!
//! The import secret carries each collection as YAML documents separated by a line
//! holding only `---`:
//!
//! | key | content |
//! |-----|---------|
//! | `crds.yaml` | definitions |
//! | `import.yaml` | manifests |

pub mod templates;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use k8s_openapi::ByteString;
use kube::CustomResourceExt;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::ImportConfig;
use crate::constants::{
    BOOTSTRAP_SA_SUFFIX, IMPORT_SECRET_CRDS_KEY, IMPORT_SECRET_MANIFESTS_KEY,
    YAML_DOCUMENT_SEPARATOR,
};
use crate::crd::Klusterlet;
use crate::errors::ImportError;
use templates::{render, render_object, BOOTSTRAP_KUBECONFIG_TEMPLATE, HUB_TEMPLATES, KLUSTERLET_TEMPLATES};

/// Definitions and manifests for one managed cluster.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportBundle {
    pub definitions: Vec<Value>,
    pub manifests: Vec<Value>,
}

/// Inputs to [`generate`].
#[derive(Clone, Copy, Debug)]
pub struct BundleInput<'a> {
    pub cluster_name: &'a str,
    /// Bound service account token from the bootstrap token secret.
    pub token: &'a [u8],
    /// Hub CA bundle from the bootstrap token secret.
    pub ca_cert: &'a [u8],
    pub config: &'a ImportConfig,
}

/// Generate the import bundle for a cluster.
///
/// `excluded` lists template paths (e.g. `klusterlet/service_account.yaml`) to leave out
/// because the target already has them.
///
/// # Errors
///
/// Returns [`ImportError::Generation`] if the token or CA is empty, the hub API server
/// is not configured, an excluded path names no template, or a template fails to render.
pub fn generate(input: &BundleInput<'_>, excluded: &[&str]) -> Result<ImportBundle, ImportError> {
    if input.token.is_empty() {
        return Err(ImportError::generation("bootstrap token is empty"));
    }
    if input.ca_cert.is_empty() {
        return Err(ImportError::generation("bootstrap CA certificate is empty"));
    }
    let hub_api_server = input
        .config
        .hub_api_server
        .as_deref()
        .ok_or_else(|| ImportError::generation("hub API server URL is not configured"))?;

    for path in excluded {
        if templates::find(KLUSTERLET_TEMPLATES, path).is_none() {
            return Err(ImportError::generation(format!(
                "excluded template {path} does not exist"
            )));
        }
    }

    let token = std::str::from_utf8(input.token)
        .map_err(|_| ImportError::generation("bootstrap token is not valid UTF-8"))?;
    let ca_data = BASE64.encode(input.ca_cert);
    let kubeconfig = render(
        "klusterlet/bootstrap_kubeconfig.yaml",
        BOOTSTRAP_KUBECONFIG_TEMPLATE,
        &[
            ("HUB_API_SERVER", hub_api_server),
            ("CA_DATA", &ca_data),
            ("TOKEN", token),
        ],
    )?;
    let bootstrap_kubeconfig = BASE64.encode(kubeconfig.as_bytes());

    let image_pull_secrets = match &input.config.image_pull_secret {
        Some(name) => serde_json::json!([{ "name": name }]).to_string(),
        None => "null".to_string(),
    };

    let values = [
        ("CLUSTER_NAME", input.cluster_name),
        ("AGENT_NAMESPACE", input.config.agent_namespace.as_str()),
        ("HUB_API_SERVER", hub_api_server),
        ("BOOTSTRAP_KUBECONFIG", bootstrap_kubeconfig.as_str()),
        ("OPERATOR_IMAGE", input.config.operator_image.as_str()),
        ("REGISTRATION_IMAGE", input.config.registration_image.as_str()),
        ("WORK_IMAGE", input.config.work_image.as_str()),
        ("IMAGE_PULL_SECRETS", image_pull_secrets.as_str()),
    ];

    let manifests = KLUSTERLET_TEMPLATES
        .iter()
        .filter(|t| !excluded.contains(&t.path))
        .map(|t| render_object(t, &values))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ImportBundle {
        definitions: vec![serde_json::to_value(Klusterlet::crd())?],
        manifests,
    })
}

/// Render the hub-side namespace and bootstrap RBAC for a cluster.
///
/// # Errors
///
/// Returns [`ImportError::Generation`] if a template fails to render.
pub fn hub_manifests(cluster_name: &str) -> Result<Vec<Value>, ImportError> {
    let bootstrap_sa = format!("{cluster_name}{BOOTSTRAP_SA_SUFFIX}");
    let values = [
        ("CLUSTER_NAME", cluster_name),
        ("BOOTSTRAP_SA", bootstrap_sa.as_str()),
    ];
    HUB_TEMPLATES
        .iter()
        .map(|t| render_object(t, &values))
        .collect()
}

impl ImportBundle {
    /// Serialize into the two import secret keys.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Serialization`] if an object cannot be written as YAML.
    pub fn to_secret_data(&self) -> Result<BTreeMap<String, ByteString>, ImportError> {
        Ok(BTreeMap::from([
            (
                IMPORT_SECRET_CRDS_KEY.to_string(),
                ByteString(to_yaml_documents(&self.definitions)?.into_bytes()),
            ),
            (
                IMPORT_SECRET_MANIFESTS_KEY.to_string(),
                ByteString(to_yaml_documents(&self.manifests)?.into_bytes()),
            ),
        ]))
    }

    /// Parse a bundle back out of import secret data. Both keys are required.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Validation`] if a key is missing, or
    /// [`ImportError::Serialization`] if a document does not parse.
    pub fn from_secret_data(data: &BTreeMap<String, ByteString>) -> Result<Self, ImportError> {
        let read = |key: &str| -> Result<Vec<Value>, ImportError> {
            let bytes = data
                .get(key)
                .ok_or_else(|| ImportError::validation(format!("import secret is missing {key}")))?;
            let text = std::str::from_utf8(&bytes.0).map_err(|e| ImportError::Serialization {
                reason: format!("{key} is not valid UTF-8: {e}"),
            })?;
            parse_yaml_documents(text)
        };

        Ok(Self {
            definitions: read(IMPORT_SECRET_CRDS_KEY)?,
            manifests: read(IMPORT_SECRET_MANIFESTS_KEY)?,
        })
    }
}

/// Concatenate objects as YAML documents separated by `---` lines.
///
/// # Errors
///
/// Returns [`ImportError::Serialization`] if an object cannot be written as YAML.
pub fn to_yaml_documents(objects: &[Value]) -> Result<String, ImportError> {
    let docs = objects
        .iter()
        .map(serde_yaml::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(docs.join(&format!("{YAML_DOCUMENT_SEPARATOR}\n")))
}

/// Split on lines holding only `---` and parse each non-empty document.
///
/// # Errors
///
/// Returns [`ImportError::Serialization`] if a document does not parse.
pub fn parse_yaml_documents(text: &str) -> Result<Vec<Value>, ImportError> {
    let mut documents = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if line.trim_end() == YAML_DOCUMENT_SEPARATOR {
            documents.push(std::mem::take(&mut current));
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    documents.push(current);

    documents
        .iter()
        .filter(|doc| !doc.trim().is_empty())
        .map(|doc| serde_yaml::from_str::<Value>(doc).map_err(ImportError::from))
        .collect()
}
