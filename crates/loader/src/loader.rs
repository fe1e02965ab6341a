//! Entry loader: fetch, decode, substitute, build, track.

use crate::container::Container;
use crate::deferred::Promise;
use crate::error::{LoadError, TransformError};
use crate::pipeline::{self, TextStream};
use crate::sandbox::{EntryValue, Sandbox};
use crate::sink::TreeSink;
use crate::source::EntrySource;
use crate::tracker::EntryTracker;
use crate::transform::{AssetRewriter, BaseUrlResolver, ModuleResolver, NodeTransformer, TransformContext};
use futures::task::{LocalSpawn, LocalSpawnExt};
use html::{ChunkTransform, MarkerTable, Node, NodeKey, ScriptElement, TagTransform, TokenizerConfig};
use net::{Fetch, Response};
use std::cell::RefCell;
use std::rc::Rc;
use url::Url;

pub const DEFAULT_PRIVATE_HEAD_TAG: &str = "entry-head";

pub type StreamTransformerFactory = Rc<dyn Fn() -> Box<dyn ChunkTransform>>;

pub struct LoaderOptions {
    /// Executor the pipeline and script listeners run on.
    pub spawner: Rc<dyn LocalSpawn>,
    /// Required when the entry is a location.
    pub fetch: Option<Rc<dyn Fetch>>,
    /// Extra text stage placed before marker substitution.
    pub stream_transformer: Option<StreamTransformerFactory>,
    pub node_transformer: Rc<dyn NodeTransformer>,
    /// Defaults to resolving against the entry URL.
    pub module_resolver: Option<Rc<dyn ModuleResolver>>,
    pub sandbox: Option<Rc<dyn Sandbox>>,
    /// `<head>` is renamed to this before it reaches the container.
    pub private_head_tag: String,
    pub tokenizer: TokenizerConfig,
}

impl LoaderOptions {
    pub fn new(spawner: impl LocalSpawn + 'static) -> Self {
        Self {
            spawner: Rc::new(spawner),
            fetch: None,
            stream_transformer: None,
            node_transformer: Rc::new(AssetRewriter),
            module_resolver: None,
            sandbox: None,
            private_head_tag: DEFAULT_PRIVATE_HEAD_TAG.to_string(),
            tokenizer: TokenizerConfig::default(),
        }
    }

    pub fn with_fetch(mut self, fetch: impl Fetch + 'static) -> Self {
        self.fetch = Some(Rc::new(fetch));
        self
    }

    pub fn with_stream_transformer<T, F>(mut self, factory: F) -> Self
    where
        T: ChunkTransform + 'static,
        F: Fn() -> T + 'static,
    {
        self.stream_transformer = Some(Rc::new(move || Box::new(factory()) as Box<dyn ChunkTransform>));
        self
    }

    pub fn with_node_transformer(mut self, transformer: impl NodeTransformer + 'static) -> Self {
        self.node_transformer = Rc::new(transformer);
        self
    }

    /// Closure form of [`Self::with_node_transformer`].
    pub fn map_nodes<F>(self, f: F) -> Self
    where
        F: Fn(Node, &TransformContext<'_>) -> Result<Node, TransformError> + 'static,
    {
        self.with_node_transformer(f)
    }

    pub fn with_module_resolver(mut self, resolver: impl ModuleResolver + 'static) -> Self {
        self.module_resolver = Some(Rc::new(resolver));
        self
    }

    pub fn with_sandbox(mut self, sandbox: Rc<dyn Sandbox>) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    pub fn with_private_head_tag(mut self, tag: impl Into<String>) -> Self {
        self.private_head_tag = tag.into();
        self
    }

    pub fn with_tokenizer_config(mut self, config: TokenizerConfig) -> Self {
        self.tokenizer = config;
        self
    }
}

/// Handles on a load in progress.
#[derive(Clone)]
pub struct EntryLoad {
    flushed: Promise<()>,
    ready: Promise<EntryValue>,
}

impl EntryLoad {
    /// Resolves once every node is inserted; rejects if the pipeline fails.
    pub fn stream_flushed(&self) -> Promise<()> {
        self.flushed.clone()
    }

    pub fn entry_ready(&self) -> Promise<EntryValue> {
        self.ready.clone()
    }
}

/// Loads `entry` into `container` and resolves with the entry's exports.
///
/// Parsing and insertion carry on in the background after the entry
/// settles; use [`start_entry_load`] to also observe the end of the stream.
pub async fn load_entry<C>(
    entry: &str,
    container: Rc<RefCell<C>>,
    options: LoaderOptions,
) -> Result<EntryValue, LoadError>
where
    C: Container + 'static,
{
    start_entry_load(entry, container, options).await?.entry_ready().await
}

/// Retrieves `entry`, spawns the pipeline on `options.spawner` and returns
/// once it is running.
///
/// Fails without touching the container when the entry cannot be fetched or
/// the response has no body.
pub async fn start_entry_load<C>(
    entry: &str,
    container: Rc<RefCell<C>>,
    options: LoaderOptions,
) -> Result<EntryLoad, LoadError>
where
    C: Container + 'static,
{
    let source = EntrySource::parse(entry);
    let label = source.to_string();

    let response = match &source {
        EntrySource::Location(url) => {
            let fetch = options
                .fetch
                .clone()
                .ok_or_else(|| LoadError::MissingFetch { entry: label.clone() })?;
            fetch.fetch(url).await?
        }
        EntrySource::Markup(markup) => Response::from_text("about:srcdoc", markup),
    };
    log::debug!(
        target: "entry.loader",
        "{}: status {} content-type {:?}",
        response.url,
        response.status,
        response.content_type
    );
    if source.location().is_some() && !html::is_html(response.content_type.as_deref()) {
        log::warn!(
            target: "entry.loader",
            "{label}: unexpected content type {:?}",
            response.content_type
        );
    }
    let Some(body) = response.body else {
        return Err(LoadError::EmptyBody { entry: label });
    };
    let base_url = source.location().and_then(|_| Url::parse(&response.url).ok());

    let mut text: TextStream = pipeline::decode(body);
    if let Some(factory) = &options.stream_transformer {
        text = pipeline::through(text, factory());
    }
    let markers = MarkerTable::private_head(&options.private_head_tag);
    text = pipeline::through(text, Box::new(TagTransform::new(&markers)));

    let tracker = Rc::new(EntryTracker::new(label.clone()));
    let resolver: Rc<dyn ModuleResolver> = options
        .module_resolver
        .clone()
        .unwrap_or_else(|| Rc::new(BaseUrlResolver::new(base_url.clone())));

    let hook = {
        let transformer = Rc::clone(&options.node_transformer);
        let sandbox = options.sandbox.clone();
        let fetch = options.fetch.clone();
        move |node: Node, raw: &Node| {
            let cx = TransformContext {
                entry: &source,
                raw_node: raw,
                base_url: base_url.as_ref(),
                sandbox: sandbox.as_deref(),
                module_resolver: &*resolver,
                fetch: fetch.as_deref(),
            };
            transformer.transform(node, &cx)
        }
    };

    let observer = {
        let tracker = Rc::clone(&tracker);
        let container = Rc::clone(&container);
        let sandbox = options.sandbox.clone();
        let spawner = Rc::clone(&options.spawner);
        move |key: NodeKey, script: &ScriptElement, watch| {
            tracker.note_external_script();
            let task = Rc::clone(&tracker).track_script(
                key,
                script.is_entry(),
                watch,
                Rc::clone(&container),
                sandbox.clone(),
            );
            spawner.spawn_local(task).map_err(|err| LoadError::Spawn {
                message: err.to_string(),
            })
        }
    };

    let sink = TreeSink::new(label.clone(), container, hook)
        .with_tokenizer_config(options.tokenizer)
        .on_external_script(observer);

    let pipeline = {
        let tracker = Rc::clone(&tracker);
        async move {
            match sink.consume(text).await {
                Ok(inserted) => {
                    log::debug!(target: "entry.loader", "{label}: {inserted} nodes inserted");
                    tracker.settle_stream_flushed();
                }
                Err(err) => {
                    log::warn!(target: "entry.loader", "{label}: pipeline failed: {err}");
                    tracker.fail(err);
                }
            }
        }
    };
    options
        .spawner
        .spawn_local(pipeline)
        .map_err(|err| LoadError::Spawn {
            message: err.to_string(),
        })?;

    Ok(EntryLoad {
        flushed: tracker.stream_flushed(),
        ready: tracker.entry_ready(),
    })
}
