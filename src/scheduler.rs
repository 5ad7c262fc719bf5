//! Traversal/Pull Scheduler
//!
//! Hands roots to the translation context in order and finalizes the run.
//! Graph discovery happens entirely inside the rules' pulls; the scheduler
//! only decides root order.

use tracing::{debug, error};

use crate::config::{BridgeConfig, NamingConfig, TranslationOptions};
use crate::context::TranslationContext;
use crate::dispatch::Dispatch;
use crate::error::Result;
use crate::graph::ReferenceGraph;
use crate::model::{DomainObject, ObjectSource, ObjectStore};
use crate::output::TranslationReport;
use crate::schema::SchemaSource;

/// Driver for forward runs
pub struct PullScheduler<'a, O: DomainObject> {
    source: &'a dyn ObjectSource<O>,
    schemas: &'a dyn SchemaSource,
    dispatch: &'a dyn Dispatch<O>,
    options: TranslationOptions,
    naming: NamingConfig,
}

impl<'a, O: DomainObject> PullScheduler<'a, O> {
    pub fn new(
        source: &'a dyn ObjectSource<O>,
        schemas: &'a dyn SchemaSource,
        dispatch: &'a dyn Dispatch<O>,
    ) -> Self {
        Self {
            source,
            schemas,
            dispatch,
            options: TranslationOptions::default(),
            naming: NamingConfig::default(),
        }
    }

    pub fn with_options(mut self, options: TranslationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_naming(mut self, naming: NamingConfig) -> Self {
        self.naming = naming;
        self
    }

    /// Take the run and naming sections of a loaded config
    pub fn with_config(self, config: &BridgeConfig) -> Self {
        self.with_options(config.translation.clone())
            .with_naming(config.naming.clone())
    }

    /// Translate `roots` in the given order and finalize
    pub fn run(&self, roots: &[&O]) -> Result<TranslationReport> {
        let mut ctx = TranslationContext::new(
            self.source,
            self.schemas,
            self.dispatch,
            self.options.clone(),
            self.naming.clone(),
        );

        for root in roots {
            ctx.translate_and_map(root).map_err(|err| {
                error!(root = %root.handle(), "translation aborted: {}", err);
                err
            })?;
        }

        let visited = ctx.visited();
        let mut report = ctx.finish()?;

        let graph = ReferenceGraph::from_roots(roots, self.source);
        report.unvisited = graph
            .reachable()
            .into_iter()
            .filter(|handle| !visited.contains(handle))
            .collect();
        if !report.unvisited.is_empty() {
            debug!(count = report.unvisited.len(), "reachable objects were never pulled");
        }

        Ok(report)
    }

    /// Order objects for a whole-model run: root priority of their tag,
    /// then case-insensitive name (unnamed last), then input order.
    pub fn root_order<'o>(&self, objects: impl IntoIterator<Item = &'o O>) -> Vec<&'o O> {
        let mut keyed: Vec<_> = objects
            .into_iter()
            .enumerate()
            .map(|(index, object)| {
                let priority = self
                    .dispatch
                    .entry(object)
                    .map_or(self.options.root_priority.len(), |entry| {
                        self.options.priority_of(&entry.tag)
                    });
                let name = object.name().map(str::to_ascii_lowercase);
                ((priority, name.is_none(), name, index), object)
            })
            .collect();
        keyed.sort_by(|(a, _), (b, _)| a.cmp(b));
        keyed.into_iter().map(|(_, object)| object).collect()
    }
}

/// Translate `roots` and everything they pull
pub fn translate_forward<O: DomainObject>(
    roots: &[&O],
    source: &dyn ObjectSource<O>,
    schemas: &dyn SchemaSource,
    dispatch: &dyn Dispatch<O>,
    options: &TranslationOptions,
) -> Result<TranslationReport> {
    PullScheduler::new(source, schemas, dispatch)
        .with_options(options.clone())
        .run(roots)
}

/// Translate every object of a store, roots ordered by [`PullScheduler::root_order`]
pub fn translate_all<O: DomainObject>(
    store: &ObjectStore<O>,
    schemas: &dyn SchemaSource,
    dispatch: &dyn Dispatch<O>,
    options: &TranslationOptions,
) -> Result<TranslationReport> {
    let scheduler = PullScheduler::new(store, schemas, dispatch).with_options(options.clone());
    let roots = scheduler.root_order(store.iter());
    scheduler.run(&roots)
}

/// Translate one object and whatever it pulls
pub fn translate_single<O: DomainObject>(
    object: &O,
    source: &dyn ObjectSource<O>,
    schemas: &dyn SchemaSource,
    dispatch: &dyn Dispatch<O>,
    options: &TranslationOptions,
) -> Result<TranslationReport> {
    translate_forward(&[object], source, schemas, dispatch, options)
}
