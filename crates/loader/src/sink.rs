//! Incremental tree sink: tokens in, transformed nodes appended to a live
//! container in stream order.
//!
//! Elements are appended at their start tag and stay open until their end
//! tag; inline scripts are appended once their body is complete. An end tag
//! with no matching open element is ignored.

use crate::container::{Container, ScriptWatch};
use crate::error::{LoadError, TransformError};
use crate::pipeline::TextStream;
use futures::StreamExt;
use html::{Attributes, Node, NodeKey, ScriptElement, Token, Tokenizer, TokenizerConfig};
use std::cell::RefCell;
use std::rc::Rc;

type ScriptObserver = Box<dyn FnMut(NodeKey, &ScriptElement, ScriptWatch) -> Result<(), LoadError>>;

struct PendingScript {
    attributes: Attributes,
    text: String,
}

pub struct TreeSink<C, H> {
    entry: String,
    container: Rc<RefCell<C>>,
    hook: H,
    observer: Option<ScriptObserver>,
    tokenizer: Tokenizer,
    tokens: Vec<Token>,
    open: Vec<(String, NodeKey)>,
    pending_script: Option<PendingScript>,
    inserted: usize,
}

impl<C, H> TreeSink<C, H>
where
    C: Container,
    H: FnMut(Node, &Node) -> Result<Node, TransformError>,
{
    /// `hook` receives a working copy of each node plus the node as parsed,
    /// and returns what to insert.
    pub fn new(entry: impl Into<String>, container: Rc<RefCell<C>>, hook: H) -> Self {
        Self {
            entry: entry.into(),
            container,
            hook,
            observer: None,
            tokenizer: Tokenizer::new(TokenizerConfig::default()),
            tokens: Vec::new(),
            open: Vec::new(),
            pending_script: None,
            inserted: 0,
        }
    }

    pub fn with_tokenizer_config(mut self, config: TokenizerConfig) -> Self {
        self.tokenizer = Tokenizer::new(config);
        self
    }

    /// Called after each external script is inserted, with the watch for
    /// its load outcome.
    pub fn on_external_script(
        mut self,
        observer: impl FnMut(NodeKey, &ScriptElement, ScriptWatch) -> Result<(), LoadError> + 'static,
    ) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn inserted(&self) -> usize {
        self.inserted
    }

    pub fn push_str(&mut self, chunk: &str) -> Result<(), LoadError> {
        let mut tokens = std::mem::take(&mut self.tokens);
        self.tokenizer.push_str(chunk, &mut tokens);
        let result = self.process(&mut tokens);
        tokens.clear();
        self.tokens = tokens;
        result
    }

    pub fn finish(&mut self) -> Result<(), LoadError> {
        let mut tokens = std::mem::take(&mut self.tokens);
        self.tokenizer.finish(&mut tokens);
        self.process(&mut tokens)?;
        if let Some(script) = self.pending_script.take() {
            self.insert(Node::Script(ScriptElement::new(script.attributes, script.text)))?;
        }
        log::debug!(
            target: "entry.sink",
            "{}: stream consumed, {} nodes inserted",
            self.entry,
            self.inserted
        );
        Ok(())
    }

    /// Drive the sink to the end of `input`. Stops at the first error; nodes
    /// already inserted stay where they are.
    pub async fn consume(mut self, mut input: TextStream) -> Result<usize, LoadError> {
        while let Some(chunk) = input.next().await {
            self.push_str(&chunk?)?;
        }
        self.finish()?;
        Ok(self.inserted)
    }

    fn process(&mut self, tokens: &mut Vec<Token>) -> Result<(), LoadError> {
        for token in tokens.drain(..) {
            self.token(token)?;
        }
        Ok(())
    }

    fn token(&mut self, token: Token) -> Result<(), LoadError> {
        if let Some(script) = self.pending_script.as_mut() {
            match token {
                Token::Text(text) => {
                    script.text.push_str(&text);
                    return Ok(());
                }
                Token::EndTag(name) if name == "script" => {
                    if let Some(script) = self.pending_script.take() {
                        self.insert(Node::Script(ScriptElement::new(script.attributes, script.text)))?;
                    }
                    return Ok(());
                }
                // The tokenizer keeps script bodies raw, so nothing else
                // can show up here; close the script and carry on.
                other => {
                    if let Some(script) = self.pending_script.take() {
                        self.insert(Node::Script(ScriptElement::new(script.attributes, script.text)))?;
                    }
                    return self.token(other);
                }
            }
        }

        match token {
            Token::Doctype(_) => {}
            Token::Comment(text) => {
                self.insert(Node::Comment(text))?;
            }
            Token::Text(text) => {
                if !text.is_empty() {
                    self.insert(Node::Text(text))?;
                }
            }
            Token::StartTag {
                name,
                attributes,
                self_closing,
            } => {
                if name == "script" {
                    if self_closing {
                        self.insert(Node::Script(ScriptElement::new(attributes, String::new())))?;
                    } else {
                        self.pending_script = Some(PendingScript {
                            attributes,
                            text: String::new(),
                        });
                    }
                } else {
                    let key = self.insert(Node::element(name.clone(), attributes))?;
                    if !self_closing {
                        self.open.push((name, key));
                    }
                }
            }
            Token::EndTag(name) => {
                if let Some(pos) = self.open.iter().rposition(|(open, _)| *open == name) {
                    self.open.truncate(pos);
                } else {
                    log::trace!(target: "entry.sink", "ignoring stray </{name}>");
                }
            }
        }
        Ok(())
    }

    fn parent(&self) -> NodeKey {
        self.open.last().map(|(_, key)| *key).unwrap_or(NodeKey::ROOT)
    }

    fn insert(&mut self, node: Node) -> Result<NodeKey, LoadError> {
        let parent = self.parent();
        let raw = node.clone();
        let node = (self.hook)(node, &raw).map_err(|err| LoadError::Transform {
            entry: self.entry.clone(),
            message: err.to_string(),
        })?;
        // Tracking follows what is actually inserted.
        let external = node.as_script().filter(|s| s.is_external()).cloned();
        let key = self
            .container
            .borrow_mut()
            .append_child(parent, node)
            .map_err(|err| LoadError::Container {
                entry: self.entry.clone(),
                message: err.to_string(),
            })?;
        self.inserted += 1;
        log::trace!(target: "entry.sink", "inserted {key:?} under {parent:?}");

        if let Some(script) = external {
            let watch = self.container.borrow_mut().watch_script(key);
            if let Some(observer) = self.observer.as_mut() {
                observer(key, &script, watch)?;
            }
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::MemoryContainer;
    use futures::executor::block_on;
    use futures::stream;
    use html::chunker::build_chunk_plans;
    use pretty_assertions::assert_eq;

    fn identity(node: Node, _raw: &Node) -> Result<Node, TransformError> {
        Ok(node)
    }

    fn run(chunks: &[&str]) -> MemoryContainer {
        let container = Rc::new(RefCell::new(MemoryContainer::new("main")));
        let mut sink = TreeSink::new("test", Rc::clone(&container), identity);
        for chunk in chunks {
            sink.push_str(chunk).unwrap();
        }
        sink.finish().unwrap();
        drop(sink);
        Rc::try_unwrap(container).ok().unwrap().into_inner()
    }

    #[test]
    fn builds_nested_tree() {
        let c = run(&["<div id=a><p>hi</p><img src=x.png><span>yo</div>tail"]);
        assert_eq!(
            c.outline(20),
            vec![
                "<main>",
                r#"  <div id="a">"#,
                "    <p>",
                r#"      "hi""#,
                r#"    <img src="x.png">"#,
                "    <span>",
                r#"      "yo""#,
                r#"  "tail""#,
            ]
        );
    }

    #[test]
    fn stray_end_tags_are_ignored() {
        let c = run(&["<div></span>text</div>"]);
        assert_eq!(c.outline(10), vec!["<main>", "  <div>", r#"    "text""#]);
    }

    #[test]
    fn inline_scripts_carry_their_body() {
        let c = run(&["<script>var a = '</", "div>';</script><script src=b.js></script>"]);
        let nodes: Vec<&Node> = c.inserted().map(|(_, node)| node).collect();
        assert_eq!(nodes.len(), 2);
        let inline = nodes[0].as_script().unwrap();
        assert_eq!(inline.text, "var a = '</div>';");
        assert!(!inline.is_external());
        assert_eq!(nodes[1].as_script().unwrap().raw_src(), Some("b.js"));
    }

    #[test]
    fn doctype_is_not_inserted() {
        let c = run(&["<!DOCTYPE html><!-- note --><p>x</p>"]);
        assert_eq!(c.outline(10), vec!["<main>", "  <!-- note -->", "  <p>", r#"    "x""#]);
    }

    #[test]
    fn insertion_order_is_independent_of_chunking() {
        let doc = "<!doctype html><entry-head><title>T</title><link href=a.css></entry-head>\
                   <div class=\"x\">a &amp; b<br/><script src=\"a.js\"></script>\
                   <script>if (a < b) {}</script></div><!-- c --><script src=b.js entry></script>";
        let whole = run(&[doc]).snapshot();
        for case in build_chunk_plans(doc, 16, 0x5eed) {
            let chunks = case.plan.text_chunks(doc);
            let got = run(&chunks).snapshot();
            assert_eq!(got, whole, "plan {}", case.label);
        }
    }

    #[test]
    fn hook_sees_a_copy_and_the_raw_node() {
        let container = Rc::new(RefCell::new(MemoryContainer::new("main")));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let mut sink = TreeSink::new("test", Rc::clone(&container), move |mut node: Node, raw: &Node| {
            log.borrow_mut().push(raw.name().map(str::to_string));
            node.set_attr("data-seen", None);
            Ok(node)
        });
        sink.push_str("<p>x</p>").unwrap();
        sink.finish().unwrap();
        assert_eq!(*seen.borrow(), vec![Some("p".to_string()), None]);
        let c = container.borrow();
        let (_, p) = c.inserted().next().unwrap();
        assert!(p.has_attr("data-seen"));
    }

    #[test]
    fn transform_failure_stops_with_earlier_nodes_in_place() {
        let container = Rc::new(RefCell::new(MemoryContainer::new("main")));
        let mut calls = 0;
        let sink = TreeSink::new("doc", Rc::clone(&container), move |node: Node, _: &Node| {
            calls += 1;
            if calls == 3 {
                Err(TransformError::new("third node"))
            } else {
                Ok(node)
            }
        });
        let input = stream::iter(["<p>a</p>", "<p>b</p>", "<p>c</p>"].map(|s| Ok(s.to_string()))).boxed_local();
        let err = block_on(sink.consume(input)).unwrap_err();
        assert_eq!(
            err,
            LoadError::Transform {
                entry: "doc".into(),
                message: "third node".into()
            }
        );
        assert_eq!(container.borrow().len(), 2);
    }

    #[test]
    fn observer_sees_external_scripts_only() {
        let container = Rc::new(RefCell::new(MemoryContainer::new("main")));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let mut sink = TreeSink::new("test", Rc::clone(&container), identity).on_external_script(
            move |key, script, _watch| {
                log.borrow_mut().push((key, script.is_entry()));
                Ok(())
            },
        );
        sink.push_str("<script>inline()</script><script src=a.js></script><div><script src=b.js entry></script></div>")
            .unwrap();
        sink.finish().unwrap();
        assert_eq!(*seen.borrow(), vec![(NodeKey(2), false), (NodeKey(4), true)]);
        assert_eq!(container.borrow().pending_scripts(), vec![NodeKey(2), NodeKey(4)]);
    }
}
