//! The live tree a load writes into, and an in-memory implementation.

use crate::error::ContainerError;
use futures::channel::oneshot;
use html::{Node, NodeKey};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptEvent {
    Loaded,
    Errored(String),
}

/// One-shot notification of an external script's outcome.
///
/// Yields `None` if the host dropped the script without reporting anything.
pub struct ScriptWatch {
    receiver: oneshot::Receiver<ScriptEvent>,
}

impl ScriptWatch {
    /// A watch plus the sender the host fires it with.
    pub fn channel() -> (oneshot::Sender<ScriptEvent>, ScriptWatch) {
        let (sender, receiver) = oneshot::channel();
        (sender, ScriptWatch { receiver })
    }
}

impl Future for ScriptWatch {
    type Output = Option<ScriptEvent>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(Result::ok)
    }
}

/// Host tree the sink appends into. Writes are append-only.
pub trait Container {
    /// Appends `node` as the last child of `parent` and returns its key.
    fn append_child(&mut self, parent: NodeKey, node: Node) -> Result<NodeKey, ContainerError>;

    /// Outcome of the external script inserted at `key`; fires at most once.
    fn watch_script(&mut self, key: NodeKey) -> ScriptWatch;

    /// The last external script in document order, as of now.
    fn last_external_script(&self) -> Option<NodeKey>;
}

#[derive(Debug)]
struct Slot {
    node: Node,
    children: Vec<NodeKey>,
}

/// Owned copy of a container subtree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub node: Node,
    pub children: Vec<Snapshot>,
}

/// Arena-backed container. Key 0 is the container element itself.
#[derive(Debug)]
pub struct MemoryContainer {
    slots: Vec<Slot>,
    watchers: HashMap<NodeKey, oneshot::Sender<ScriptEvent>>,
    auto_load: bool,
}

impl MemoryContainer {
    pub fn new(name: &str) -> Self {
        Self {
            slots: vec![Slot {
                node: Node::element(name, Vec::new()),
                children: Vec::new(),
            }],
            watchers: HashMap::new(),
            auto_load: false,
        }
    }

    /// Report every external script as loaded as soon as it is watched.
    pub fn with_auto_load(mut self, auto_load: bool) -> Self {
        self.auto_load = auto_load;
        self
    }

    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.slots.get(key.0 as usize).map(|slot| &slot.node)
    }

    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.slots
            .get(key.0 as usize)
            .map(|slot| slot.children.as_slice())
            .unwrap_or(&[])
    }

    /// Inserted nodes, excluding the container itself.
    pub fn len(&self) -> usize {
        self.slots.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserted nodes in insertion order.
    pub fn inserted(&self) -> impl Iterator<Item = (NodeKey, &Node)> {
        self.slots
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, slot)| (NodeKey(i as u32), &slot.node))
    }

    /// Every node below the container in document order.
    pub fn document_order(&self) -> Vec<NodeKey> {
        let mut out = Vec::with_capacity(self.len());
        let mut stack: Vec<NodeKey> = self.children(NodeKey::ROOT).iter().rev().copied().collect();
        while let Some(key) = stack.pop() {
            out.push(key);
            stack.extend(self.children(key).iter().rev().copied());
        }
        out
    }

    pub fn external_scripts(&self) -> Vec<NodeKey> {
        self.document_order()
            .into_iter()
            .filter(|&key| self.get(key).is_some_and(Node::is_external_script))
            .collect()
    }

    /// Scripts that were watched and have not reported yet.
    pub fn pending_scripts(&self) -> Vec<NodeKey> {
        let mut keys: Vec<NodeKey> = self.watchers.keys().copied().collect();
        keys.sort();
        keys
    }

    /// Returns false if the script was not waiting for an outcome.
    pub fn fire_loaded(&mut self, key: NodeKey) -> bool {
        self.fire(key, ScriptEvent::Loaded)
    }

    pub fn fire_errored(&mut self, key: NodeKey, message: impl Into<String>) -> bool {
        self.fire(key, ScriptEvent::Errored(message.into()))
    }

    fn fire(&mut self, key: NodeKey, event: ScriptEvent) -> bool {
        match self.watchers.remove(&key) {
            Some(sender) => {
                let _ = sender.send(event);
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_of(NodeKey::ROOT)
    }

    fn snapshot_of(&self, key: NodeKey) -> Snapshot {
        let slot = &self.slots[key.0 as usize];
        Snapshot {
            node: slot.node.clone(),
            children: slot.children.iter().map(|&c| self.snapshot_of(c)).collect(),
        }
    }

    /// Indented one-line-per-node rendering, at most `cap` lines.
    pub fn outline(&self, cap: usize) -> Vec<String> {
        fn walk(c: &MemoryContainer, key: NodeKey, depth: usize, out: &mut Vec<String>, left: &mut usize) {
            if *left == 0 {
                return;
            }
            let Some(node) = c.get(key) else {
                return;
            };
            let indent = "  ".repeat(depth);
            let line = match node {
                Node::Element(_) | Node::Script(_) => {
                    let name = node.name().unwrap_or_default();
                    let mut line = format!("{indent}<{name}");
                    for key in ["id", "class", "src", "href"] {
                        if let Some(value) = node.attr(key).filter(|v| !v.is_empty()) {
                            line.push_str(&format!(r#" {key}="{value}""#));
                        }
                    }
                    if node.as_script().is_some_and(|s| s.is_entry()) {
                        line.push_str(" entry");
                    }
                    line.push('>');
                    Some(line)
                }
                Node::Text(text) => {
                    let t = text.replace('\n', " ").trim().to_string();
                    (!t.is_empty()).then(|| format!("{indent}\"{}\"", clip(&t)))
                }
                Node::Comment(text) => {
                    Some(format!("{indent}<!-- {} -->", clip(text.replace('\n', " ").trim())))
                }
            };
            if let Some(line) = line {
                *left -= 1;
                out.push(line);
            }
            for &child in c.children(key) {
                walk(c, child, depth + 1, out, left);
            }
        }
        let mut out = Vec::new();
        let mut left = cap;
        walk(self, NodeKey::ROOT, 0, &mut out, &mut left);
        out
    }
}

fn clip(text: &str) -> String {
    const MAX: usize = 40;
    if text.chars().count() > MAX {
        let head: String = text.chars().take(MAX).collect();
        format!("{head}…")
    } else {
        text.to_string()
    }
}

impl Container for MemoryContainer {
    fn append_child(&mut self, parent: NodeKey, node: Node) -> Result<NodeKey, ContainerError> {
        let index = parent.0 as usize;
        if index >= self.slots.len() {
            return Err(ContainerError::UnknownParent(parent.0));
        }
        if matches!(self.slots[index].node, Node::Text(_) | Node::Comment(_)) {
            return Err(ContainerError::Refused(format!(
                "node {} cannot have children",
                parent.0
            )));
        }
        let key = NodeKey(self.slots.len() as u32);
        self.slots.push(Slot {
            node,
            children: Vec::new(),
        });
        self.slots[index].children.push(key);
        Ok(key)
    }

    fn watch_script(&mut self, key: NodeKey) -> ScriptWatch {
        let (sender, watch) = ScriptWatch::channel();
        if self.auto_load {
            let _ = sender.send(ScriptEvent::Loaded);
        } else {
            self.watchers.insert(key, sender);
        }
        watch
    }

    fn last_external_script(&self) -> Option<NodeKey> {
        self.external_scripts().last().copied()
    }
}
