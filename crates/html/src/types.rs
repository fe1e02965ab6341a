/// Host identity of a node that has been inserted into a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub u32);

impl NodeKey {
    /// The container itself; top-level nodes are appended under it.
    pub const ROOT: NodeKey = NodeKey(0);
}

pub type Attributes = Vec<(String, Option<String>)>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Doctype(String),
    StartTag {
        name: String,
        attributes: Attributes,
        self_closing: bool,
    },
    EndTag(String),
    Comment(String),
    Text(String),
}

/// A node as constructed from the token stream, before insertion.
///
/// Element-like nodes are shallow: children are appended separately under the
/// key the container hands back for the parent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Script(ScriptElement),
    Text(String),
    Comment(String),
}

impl Node {
    pub fn element(name: impl Into<String>, attributes: Attributes) -> Self {
        Node::Element(Element {
            name: name.into(),
            attributes,
        })
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Node::Element(el) => Some(&el.name),
            Node::Script(_) => Some("script"),
            Node::Text(_) | Node::Comment(_) => None,
        }
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        match self {
            Node::Element(el) => Some(&el.attributes),
            Node::Script(script) => Some(&script.attributes),
            Node::Text(_) | Node::Comment(_) => None,
        }
    }

    pub fn attributes_mut(&mut self) -> Option<&mut Attributes> {
        match self {
            Node::Element(el) => Some(&mut el.attributes),
            Node::Script(script) => Some(&mut script.attributes),
            Node::Text(_) | Node::Comment(_) => None,
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes().and_then(|attrs| get_attr(attrs, key))
    }

    pub fn has_attr(&self, key: &str) -> bool {
        self.attributes()
            .is_some_and(|attrs| attrs.iter().any(|(k, _)| k.eq_ignore_ascii_case(key)))
    }

    /// Replace the first attribute named `key`, or append it.
    pub fn set_attr(&mut self, key: &str, value: Option<String>) -> bool {
        let Some(attrs) = self.attributes_mut() else {
            return false;
        };
        set_attr(attrs, key, value);
        true
    }

    pub fn as_script(&self) -> Option<&ScriptElement> {
        match self {
            Node::Script(script) => Some(script),
            _ => None,
        }
    }

    /// External scripts are the only nodes whose load outcome gets tracked.
    pub fn is_external_script(&self) -> bool {
        self.as_script().is_some_and(ScriptElement::is_external)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Attributes,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptSource {
    Inline,
    /// Raw `src` (or `data-src`) value as written in the document.
    External(String),
}

/// `<script>` with its classification fixed at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptElement {
    pub attributes: Attributes,
    pub text: String,
    source: ScriptSource,
    entry: bool,
}

impl ScriptElement {
    pub fn new(attributes: Attributes, text: String) -> Self {
        let source = get_attr(&attributes, "src")
            .or_else(|| get_attr(&attributes, "data-src"))
            .filter(|src| !src.trim().is_empty())
            .map(|src| ScriptSource::External(src.to_string()))
            .unwrap_or(ScriptSource::Inline);
        let entry = attributes
            .iter()
            .any(|(k, _)| k.eq_ignore_ascii_case("entry"));
        Self {
            attributes,
            text,
            source,
            entry,
        }
    }

    pub fn source(&self) -> &ScriptSource {
        &self.source
    }

    pub fn is_external(&self) -> bool {
        matches!(self.source, ScriptSource::External(_))
    }

    pub fn raw_src(&self) -> Option<&str> {
        match &self.source {
            ScriptSource::External(src) => Some(src),
            ScriptSource::Inline => None,
        }
    }

    /// Carries the explicit `entry` designation.
    pub fn is_entry(&self) -> bool {
        self.entry
    }

    pub fn is_module(&self) -> bool {
        get_attr(&self.attributes, "type").is_some_and(|t| t.eq_ignore_ascii_case("module"))
    }
}

pub fn get_attr<'a>(attrs: &'a [(String, Option<String>)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .and_then(|(_, v)| v.as_deref())
}

pub fn set_attr(attrs: &mut Attributes, key: &str, value: Option<String>) {
    match attrs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
        Some((_, slot)) => *slot = value,
        None => attrs.push((key.to_ascii_lowercase(), value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, Option<&str>)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect()
    }

    #[test]
    fn script_classification_is_fixed_at_construction() {
        let mut node = Node::Script(ScriptElement::new(
            attrs(&[("src", Some("a.js")), ("entry", None)]),
            String::new(),
        ));
        node.set_attr("src", None);
        let script = node.as_script().unwrap();
        assert!(script.is_external());
        assert!(script.is_entry());
        assert_eq!(script.raw_src(), Some("a.js"));
    }

    #[test]
    fn data_src_counts_as_external() {
        let script = ScriptElement::new(attrs(&[("data-src", Some("b.js"))]), String::new());
        assert_eq!(script.source(), &ScriptSource::External("b.js".into()));
        assert!(!script.is_entry());
    }

    #[test]
    fn blank_src_is_inline() {
        let script = ScriptElement::new(attrs(&[("src", Some("  "))]), "x()".into());
        assert_eq!(script.source(), &ScriptSource::Inline);
        assert!(!Node::Script(script).is_external_script());
    }

    #[test]
    fn set_attr_replaces_case_insensitively() {
        let mut node = Node::element("a", attrs(&[("HREF", Some("/x"))]));
        node.set_attr("href", Some("/y".into()));
        assert_eq!(node.attr("href"), Some("/y"));
        assert_eq!(node.attributes().unwrap().len(), 1);
        assert!(!Node::Text("t".into()).has_attr("href"));
    }
}
