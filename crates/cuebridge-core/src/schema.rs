//! Parameter schema adapter.
//!
//! Translates the host's own parameter descriptions into a closed, uniform
//! schema for clients. Every call is a fresh read: a schema is a view of the
//! host at the moment of the query, never a cache.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;
use crate::host::{depth_below, normalize_path, ComponentStore, HostParameter};
use crate::value::ParamValue;

/// Closed set of parameter styles exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamStyle {
    Float,
    Int,
    Toggle,
    String,
    FilePath,
    FolderPath,
    Menu,
    MultiMenu,
    Pulse,
    Color,
}

impl ParamStyle {
    /// Map a host style name onto the closed set. Unknown styles become `String`.
    pub fn from_host(style: &str) -> Self {
        match style {
            "Float" => ParamStyle::Float,
            "Int" => ParamStyle::Int,
            "Toggle" => ParamStyle::Toggle,
            "File" | "FileSave" => ParamStyle::FilePath,
            "Folder" => ParamStyle::FolderPath,
            "Menu" | "StrMenu" => ParamStyle::Menu,
            "MultiMenu" => ParamStyle::MultiMenu,
            "Pulse" | "Momentary" => ParamStyle::Pulse,
            "RGB" | "RGBA" => ParamStyle::Color,
            _ => ParamStyle::String,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ParamStyle::Float | ParamStyle::Int)
    }

    pub fn is_menu(self) -> bool {
        matches!(self, ParamStyle::Menu | ParamStyle::MultiMenu)
    }
}

/// One entry of a menu parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuOption {
    pub name: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub label: String,
    pub style: ParamStyle,
    pub value: ParamValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<MenuOption>>,
    pub read_only: bool,
}

impl ParameterDescriptor {
    fn from_host(param: &HostParameter) -> Self {
        let style = ParamStyle::from_host(&param.style);
        let (min, max) = if style.is_numeric() {
            (param.min, param.max)
        } else {
            (None, None)
        };
        let options = style.is_menu().then(|| {
            param
                .menu_names
                .iter()
                .enumerate()
                .map(|(i, name)| MenuOption {
                    name: name.clone(),
                    label: param.menu_labels.get(i).cloned().unwrap_or_else(|| name.clone()),
                })
                .collect()
        });
        Self {
            name: param.name.clone(),
            label: if param.label.is_empty() {
                param.name.clone()
            } else {
                param.label.clone()
            },
            style,
            value: param.value.clone(),
            min,
            max,
            options,
            read_only: param.read_only,
        }
    }

    /// Whether a snapshot should record this parameter.
    pub fn is_capturable(&self) -> bool {
        !self.read_only && self.style != ParamStyle::Pulse
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterPage {
    pub name: String,
    pub parameters: Vec<ParameterDescriptor>,
}

/// Full custom-parameter schema of one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSchema {
    pub path: String,
    pub name: String,
    pub pages: Vec<ParameterPage>,
}

impl ComponentSchema {
    pub fn parameters(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        self.pages.iter().flat_map(|p| p.parameters.iter())
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.parameters().find(|p| p.name == name)
    }

    pub fn parameter_count(&self) -> usize {
        self.pages.iter().map(|p| p.parameters.len()).sum()
    }
}

/// Flat discovery entry.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentSummary {
    pub path: String,
    pub name: String,
    pub pages: Vec<String>,
    pub parameter_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParameterSummary {
    pub name: String,
    pub label: String,
    pub style: ParamStyle,
}

/// Node of the nested component tree.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentNode {
    pub path: String,
    pub name: String,
    pub parameter_count: usize,
    pub parameters: Vec<ParameterSummary>,
    pub children: Vec<ComponentNode>,
}

/// Last segment of a component path.
pub fn component_name(path: &str) -> String {
    normalize_path(path)
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Reads host parameter pages and normalizes them.
#[derive(Clone)]
pub struct SchemaAdapter {
    store: Arc<dyn ComponentStore>,
    excluded: Vec<String>,
}

impl SchemaAdapter {
    pub fn new(store: Arc<dyn ComponentStore>) -> Self {
        Self {
            store,
            excluded: Vec::new(),
        }
    }

    /// Path prefixes hidden from discovery and snapshot capture.
    pub fn with_exclusions(mut self, excluded: Vec<String>) -> Self {
        self.excluded = excluded.iter().map(|p| normalize_path(p)).collect();
        self
    }

    pub fn store(&self) -> &Arc<dyn ComponentStore> {
        &self.store
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.excluded
            .iter()
            .any(|prefix| path == *prefix || path.starts_with(&format!("{}/", prefix)))
    }

    /// Describe a component's custom parameters, grouped by page.
    pub async fn describe(&self, path: &str) -> Result<ComponentSchema> {
        let path = normalize_path(path);
        let pages = self.store.custom_pages(&path).await?;
        let pages = pages
            .iter()
            .map(|page| ParameterPage {
                name: page.name.clone(),
                parameters: page.parameters.iter().map(ParameterDescriptor::from_host).collect(),
            })
            .filter(|page| !page.parameters.is_empty())
            .collect();
        Ok(ComponentSchema {
            name: component_name(&path),
            path,
            pages,
        })
    }

    /// Schemas of every non-excluded descendant, including those without
    /// parameters. Components that vanish mid-walk are skipped.
    pub async fn describe_subtree(&self, root: &str, max_depth: usize) -> Result<Vec<ComponentSchema>> {
        let paths = self.store.find_components(root, max_depth).await?;
        let mut schemas = Vec::with_capacity(paths.len());
        for path in paths.iter().filter(|p| !self.is_excluded(p)) {
            match self.describe(path).await {
                Ok(schema) => schemas.push(schema),
                Err(crate::Error::NotFound(_)) => {
                    log::debug!("Component vanished during walk: {}", path);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(schemas)
    }

    /// Components under `root` that carry at least one custom parameter.
    pub async fn discover(&self, root: &str, max_depth: usize) -> Result<Vec<ComponentSummary>> {
        Ok(self
            .describe_subtree(root, max_depth)
            .await?
            .into_iter()
            .filter(|s| s.parameter_count() > 0)
            .map(|s| ComponentSummary {
                parameter_count: s.parameter_count(),
                pages: s.pages.iter().map(|p| p.name.clone()).collect(),
                name: s.name,
                path: s.path,
            })
            .collect())
    }

    /// Nested tree rooted at `root`, pruned to branches that lead to parameters.
    pub async fn tree(&self, root: &str, max_depth: usize) -> Result<ComponentNode> {
        let root_schema = self.describe(root).await?;
        let mut by_path: BTreeMap<String, ComponentSchema> = self
            .describe_subtree(&root_schema.path, max_depth)
            .await?
            .into_iter()
            .map(|s| (s.path.clone(), s))
            .collect();
        Ok(build_node(root_schema, &mut by_path))
    }
}

fn build_node(schema: ComponentSchema, rest: &mut BTreeMap<String, ComponentSchema>) -> ComponentNode {
    let child_paths: Vec<String> = rest
        .keys()
        .filter(|p| depth_below(&schema.path, p) == Some(1))
        .cloned()
        .collect();
    let mut children = Vec::new();
    for path in child_paths {
        if let Some(child) = rest.remove(&path) {
            let node = build_node(child, rest);
            if node.parameter_count > 0 || !node.children.is_empty() {
                children.push(node);
            }
        }
    }
    ComponentNode {
        parameter_count: schema.parameter_count(),
        parameters: schema
            .parameters()
            .map(|p| ParameterSummary {
                name: p.name.clone(),
                label: p.label.clone(),
                style: p.style,
            })
            .collect(),
        children,
        name: schema.name,
        path: schema.path,
    }
}
