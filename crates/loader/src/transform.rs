//! Per-node transform hook and the default asset rewrite.

use crate::error::TransformError;
use crate::sandbox::Sandbox;
use crate::source::EntrySource;
use html::Node;
use net::Fetch;
use url::Url;

/// Resolves module specifiers met while transforming scripts.
pub trait ModuleResolver {
    fn resolve(&self, specifier: &str) -> Option<String>;
}

impl<F> ModuleResolver for F
where
    F: Fn(&str) -> Option<String>,
{
    fn resolve(&self, specifier: &str) -> Option<String> {
        self(specifier)
    }
}

/// Joins relative specifiers against a root URL; absolute ones pass through.
#[derive(Clone, Debug, Default)]
pub struct BaseUrlResolver {
    base: Option<Url>,
}

impl BaseUrlResolver {
    pub fn new(base: Option<Url>) -> Self {
        Self { base }
    }

    pub fn for_entry(entry: &EntrySource) -> Self {
        Self::new(entry.location().and_then(|url| Url::parse(url).ok()))
    }
}

impl ModuleResolver for BaseUrlResolver {
    fn resolve(&self, specifier: &str) -> Option<String> {
        resolve_url(self.base.as_ref(), specifier)
    }
}

/// Everything a transform may consult besides the node itself.
pub struct TransformContext<'a> {
    pub entry: &'a EntrySource,
    /// The node as parsed, before any transform touched it.
    pub raw_node: &'a Node,
    pub base_url: Option<&'a Url>,
    pub sandbox: Option<&'a dyn Sandbox>,
    pub module_resolver: &'a dyn ModuleResolver,
    pub fetch: Option<&'a dyn Fetch>,
}

/// Called exactly once per constructed node; the returned node is what gets
/// inserted.
pub trait NodeTransformer {
    fn transform(&self, node: Node, cx: &TransformContext<'_>) -> Result<Node, TransformError>;
}

impl<F> NodeTransformer for F
where
    F: Fn(Node, &TransformContext<'_>) -> Result<Node, TransformError>,
{
    fn transform(&self, node: Node, cx: &TransformContext<'_>) -> Result<Node, TransformError> {
        self(node, cx)
    }
}

/// Pins a closure to the transformer signature so its argument types infer.
pub fn transform_fn<F>(f: F) -> F
where
    F: Fn(Node, &TransformContext<'_>) -> Result<Node, TransformError>,
{
    f
}

/// Default transform: makes asset references absolute against the entry.
///
/// Module scripts go through the module resolver instead.
#[derive(Clone, Copy, Debug, Default)]
pub struct AssetRewriter;

const SRC_ELEMENTS: &[&str] = &["img", "source", "audio", "video", "iframe", "embed", "track"];

impl NodeTransformer for AssetRewriter {
    fn transform(&self, mut node: Node, cx: &TransformContext<'_>) -> Result<Node, TransformError> {
        match &node {
            Node::Script(script) if script.is_external() => {
                let module = script.is_module();
                for key in ["src", "data-src"] {
                    let Some(raw) = node.attr(key).map(str::to_string) else {
                        continue;
                    };
                    let resolved = if module {
                        cx.module_resolver.resolve(&raw)
                    } else {
                        resolve_url(cx.base_url, &raw)
                    };
                    if let Some(resolved) = resolved {
                        node.set_attr(key, Some(resolved));
                    }
                }
            }
            Node::Element(el) => {
                let key = if el.name == "link" {
                    "href"
                } else if SRC_ELEMENTS.contains(&el.name.as_str()) {
                    "src"
                } else {
                    return Ok(node);
                };
                if let Some(resolved) = node.attr(key).and_then(|raw| resolve_url(cx.base_url, raw)) {
                    node.set_attr(key, Some(resolved));
                }
            }
            _ => {}
        }
        Ok(node)
    }
}

fn resolve_url(base: Option<&Url>, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') || raw.starts_with("data:") {
        return None;
    }
    if let Ok(absolute) = Url::parse(raw) {
        return Some(absolute.to_string());
    }
    base?.join(raw).ok().map(String::from)
}
