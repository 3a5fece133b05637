// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Manifest templates embedded at compile time.
//!
//! Templates use `{{KEY}}` placeholders. Rendering substitutes every key and then
//! refuses output that still contains a placeholder, so a typo in a template surfaces
//! as a generation error instead of a broken object on a managed cluster.

use serde_json::Value;

use crate::errors::ImportError;

/// One embedded manifest template, addressed by its path under `templates/`.
#[derive(Clone, Copy, Debug)]
pub struct Template {
    pub path: &'static str,
    pub source: &'static str,
}

/// Hub-side objects granting the bootstrap identity its registration rights.
pub const HUB_TEMPLATES: &[Template] = &[
    Template {
        path: "hub/namespace.yaml",
        source: include_str!("../../templates/hub/namespace.yaml"),
    },
    Template {
        path: "hub/cluster_role.yaml",
        source: include_str!("../../templates/hub/cluster_role.yaml"),
    },
    Template {
        path: "hub/cluster_role_binding.yaml",
        source: include_str!("../../templates/hub/cluster_role_binding.yaml"),
    },
];

/// Agent installation manifests, in apply order.
pub const KLUSTERLET_TEMPLATES: &[Template] = &[
    Template {
        path: "klusterlet/namespace.yaml",
        source: include_str!("../../templates/klusterlet/namespace.yaml"),
    },
    Template {
        path: "klusterlet/service_account.yaml",
        source: include_str!("../../templates/klusterlet/service_account.yaml"),
    },
    Template {
        path: "klusterlet/cluster_role.yaml",
        source: include_str!("../../templates/klusterlet/cluster_role.yaml"),
    },
    Template {
        path: "klusterlet/cluster_role_binding.yaml",
        source: include_str!("../../templates/klusterlet/cluster_role_binding.yaml"),
    },
    Template {
        path: "klusterlet/bootstrap_secret.yaml",
        source: include_str!("../../templates/klusterlet/bootstrap_secret.yaml"),
    },
    Template {
        path: "klusterlet/operator.yaml",
        source: include_str!("../../templates/klusterlet/operator.yaml"),
    },
    Template {
        path: "klusterlet/klusterlet.yaml",
        source: include_str!("../../templates/klusterlet/klusterlet.yaml"),
    },
];

/// Kubeconfig the agent uses to bootstrap against the hub. Not a manifest itself;
/// it is embedded base64-encoded in `klusterlet/bootstrap_secret.yaml`.
pub const BOOTSTRAP_KUBECONFIG_TEMPLATE: &str =
    include_str!("../../templates/klusterlet/bootstrap_kubeconfig.yaml");

/// Substitute `{{KEY}}` placeholders.
///
/// # Errors
///
/// Returns [`ImportError::Generation`] if a placeholder remains after substitution.
pub fn render(name: &str, source: &str, values: &[(&str, &str)]) -> Result<String, ImportError> {
    let rendered = values.iter().fold(source.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{{{key}}}}}"), value)
    });

    if let Some(start) = rendered.find("{{") {
        let end = rendered[start..]
            .find("}}")
            .map_or(rendered.len(), |i| start + i + 2);
        return Err(ImportError::generation(format!(
            "template {name} has unresolved placeholder {}",
            &rendered[start..end]
        )));
    }

    Ok(rendered)
}

/// Render a template and parse it as a single object.
///
/// Keys rendered as `null` are dropped, so an optional value can remove its field
/// entirely.
///
/// # Errors
///
/// Returns [`ImportError::Generation`] on an unresolved placeholder or invalid YAML.
pub fn render_object(template: &Template, values: &[(&str, &str)]) -> Result<Value, ImportError> {
    let rendered = render(template.path, template.source, values)?;
    let mut object: Value = serde_yaml::from_str(&rendered).map_err(|e| {
        ImportError::generation(format!("template {} is not valid YAML: {e}", template.path))
    })?;
    drop_null_fields(&mut object);
    Ok(object)
}

fn drop_null_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(drop_null_fields);
        }
        Value::Array(items) => items.iter_mut().for_each(drop_null_fields),
        _ => {}
    }
}

/// Look up a template by path.
#[must_use]
pub fn find(templates: &[Template], path: &str) -> Option<Template> {
    templates.iter().copied().find(|t| t.path == path)
}
