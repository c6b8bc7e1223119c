//! # Hub
//!
//! Process-wide coordinator. Owns the registry, performs the one-time
//! initialization that assembles the logging pipeline from the
//! [`FoundationContext`], registers commands, and builds the CLI.
//!
//! ## Initialization
//!
//! At most one successful init per process; `initialize` is idempotent when
//! `force = false` and replaces state when `force = true`. Order: load
//! context → build processor chain → register built-in event sets →
//! discover declared components → mark initialized. Any failure leaves the
//! hub in a known uninitialized state; partial state never persists.
//!
//! `reset_for_testing` atomically returns the hub to its pristine
//! post-import state — registries, caches, and context are all dropped.
//! Tests are the only intended caller.
//!
//! ## Thread safety
//!
//! Double-checked locking guards the first initialization; steady-state
//! reads take the state read lock only.


use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use once_cell::sync::Lazy;

use crate::context::FoundationContext;
use crate::errors::{FoundationError, Result};
use crate::event::Level;
use crate::eventset::{builtin_event_sets, EventSet, EventSetCatalog};
use crate::logger::{LevelResolver, Logger};
use crate::pipeline::Pipeline;
use crate::processor::{
  ApplyRateLimit, FilterByLevel, FormatException, InjectBaseContext, ProcessorChain, Processor,
  ResolveEventSets, SanitizeSensitive,
};
use crate::ratelimit::{RateLimiterMap, TokenBucket};
use crate::registry::{Registry, DIMENSION_COMMAND, DIMENSION_COMPONENT, DIMENSION_EVENT_SET};
use crate::render::formatter_for;
use crate::sink::{FileSink, NullSink, Sink, StreamSink};
use crate::value::Value;

/// Signature of a registered command handler. Receives the raw trailing
/// arguments of its subcommand.
pub type CommandHandler = Arc<dyn Fn(&[String]) -> Result<()> + Send + Sync>;

/// Registry payload for the `command` dimension.
pub struct RegisteredCommand {
  pub name: String,
  pub category: Option<String>,
  pub handler: CommandHandler,
}

/// Declarative component registration, the stand-in for entry-point
/// discovery: libraries expose a `ComponentDescriptor` and the hub folds it
/// into the registry during init.
pub struct ComponentDescriptor {
  pub name: String,
  pub dimension: String,
  pub build: Box<dyn Fn() -> crate::registry::ComponentValue + Send + Sync>,
}

/// Everything assembled by a successful initialization.
pub struct Foundation {
  pub context: FoundationContext,
  pub pipeline: Arc<Pipeline>,
  pub resolver: Arc<LevelResolver>,
  pub limiters: Arc<RateLimiterMap>,
}

pub struct Hub {
  registry: Arc<Registry>,
  state: RwLock<Option<Arc<Foundation>>>,
  init_lock: Mutex<()>,
  /// Descriptors queued for discovery at init time.
  pending_components: Mutex<Vec<ComponentDescriptor>>,
}

static HUB: Lazy<Hub> = Lazy::new(|| Hub {
  registry: Arc::new(Registry::new()),
  state: RwLock::new(None),
  init_lock: Mutex::new(()),
  pending_components: Mutex::new(Vec::new()),
});

/// The process-wide hub.
pub fn global() -> &'static Hub {
  &HUB
}

impl Hub {
  pub fn registry(&self) -> &Arc<Registry> {
    &self.registry
  }

  pub fn is_initialized(&self) -> bool {
    self.state.read().expect("hub state poisoned").is_some()
  }

  /// Initialize the hub. Idempotent unless `force`; a failed init leaves
  /// the hub uninitialized.
  pub fn initialize(&self, config: Option<FoundationContext>, force: bool) -> Result<()> {
    if !force && self.is_initialized() {
      return Ok(());
    }

    let _guard = self.init_lock.lock().expect("hub init lock poisoned");
    // Double-checked: another thread may have won the race.
    if !force && self.is_initialized() {
      return Ok(());
    }

    let context = match config {
      Some(ctx) => ctx,
      None => FoundationContext::from_env()
        .map_err(|e| FoundationError::InitializationFailure(e.to_string()))?,
    };

    let foundation = self
      .build_foundation(context)
      .map_err(|e| match e {
        FoundationError::InitializationFailure(_) => e,
        other => FoundationError::InitializationFailure(other.to_string()),
      })?;

    let mut state = self.state.write().expect("hub state poisoned");
    *state = Some(Arc::new(foundation));
    Ok(())
  }

  fn build_foundation(&self, context: FoundationContext) -> Result<Foundation> {
    // (1) built-in event sets; replace so force-reinit stays clean.
    for set in builtin_event_sets() {
      self.registry.register(
        set.name.clone(),
        Arc::new(set) as crate::registry::ComponentValue,
        DIMENSION_EVENT_SET,
        None,
        None,
        true,
      )?;
    }

    // (2) catalog snapshot of the enabled sets.
    let catalog = self.catalog_for(&context)?;

    // (3) level resolution + rate limiters.
    let resolver = Arc::new(LevelResolver::new(context.default_level, &context.module_levels));
    let limiters = Arc::new(RateLimiterMap::new());

    // (4) processor chain in the standard order.
    let processors: Vec<Arc<dyn Processor>> = vec![
      Arc::new(InjectBaseContext::from_context(&context)),
      Arc::new(FilterByLevel {
        resolver: Arc::clone(&resolver),
      }),
      Arc::new(ResolveEventSets {
        catalog,
        emoji_enabled: context.emoji_enabled,
      }),
      Arc::new(SanitizeSensitive::new(&context.sanitize_patterns)),
      Arc::new(ApplyRateLimit {
        limiters: Arc::clone(&limiters),
      }),
      Arc::new(FormatException),
    ];
    let chain = ProcessorChain::new(processors);

    // (5) sinks.
    let sinks = self.build_sinks(&context)?;
    let formatter = formatter_for(context.console_formatter);
    let pipeline = Arc::new(Pipeline::new(chain, formatter, sinks));

    // (6) entry-point style component discovery.
    let pending = std::mem::take(
      &mut *self.pending_components.lock().expect("hub component lock poisoned"),
    );
    for descriptor in pending {
      let value = (descriptor.build)();
      self.registry.register(
        descriptor.name,
        value,
        descriptor.dimension,
        None,
        None,
        true,
      )?;
    }

    // (7) built-in commands go through the same registration path as user
    // commands.
    self.register_builtin_commands()?;

    Ok(Foundation {
      context,
      pipeline,
      resolver,
      limiters,
    })
  }

  fn catalog_for(&self, context: &FoundationContext) -> Result<EventSetCatalog> {
    let registered = self.registry.list(Some(DIMENSION_EVENT_SET));
    let sets: Vec<EventSet> = if context.enabled_event_sets.is_empty() {
      registered
        .iter()
        .filter_map(|entry| entry.value.clone().downcast::<EventSet>().ok())
        .map(|set| (*set).clone())
        .collect()
    } else {
      let mut selected = Vec::with_capacity(context.enabled_event_sets.len());
      for name in &context.enabled_event_sets {
        let set = self
          .registry
          .get_as::<EventSet>(name, DIMENSION_EVENT_SET)
          .ok_or_else(|| {
            FoundationError::InitializationFailure(format!("unknown event set '{}'", name))
          })?;
        selected.push((*set).clone());
      }
      selected
    };
    Ok(EventSetCatalog::new(sets))
  }

  fn build_sinks(&self, context: &FoundationContext) -> Result<Vec<Arc<dyn Sink>>> {
    if context.telemetry_disabled {
      return Ok(vec![Arc::new(NullSink)]);
    }
    let mut sinks: Vec<Arc<dyn Sink>> = vec![Arc::new(StreamSink::stderr())];
    if let Some(path) = &context.log_file_path {
      let file = FileSink::new(path).map_err(|e| {
        FoundationError::InitializationFailure(format!(
          "cannot open log file '{}': {}",
          path.display(),
          e
        ))
      })?;
      sinks.push(Arc::new(file));
    }
    Ok(sinks)
  }

  fn register_builtin_commands(&self) -> Result<()> {
    let handler: CommandHandler = Arc::new(|_args: &[String]| {
      let snapshot = crate::diag::global().snapshot();
      let rendered = serde_json::to_string_pretty(&snapshot)
        .unwrap_or_else(|_| "{}".to_string());
      println!("{}", rendered);
      Ok(())
    });
    self.register_command_impl("diag", handler, Some("builtin"), true)
  }

  /// The active foundation, initializing from the environment on first use.
  /// A failed auto-init falls back to compiled defaults so logging stays
  /// available; the failure is reported on stderr and counted.
  pub fn foundation(&self) -> Arc<Foundation> {
    if let Some(foundation) = self.state.read().expect("hub state poisoned").as_ref() {
      return Arc::clone(foundation);
    }
    if let Err(e) = self.initialize(None, false) {
      crate::diag::global().record_hot_path_error();
      eprintln!("[Hub] auto-initialization failed: {}; using defaults", e);
      let _ = self.initialize(Some(FoundationContext::default()), false);
    }
    let state = self.state.read().expect("hub state poisoned");
    Arc::clone(state.as_ref().expect("hub initialization cannot leave state empty"))
  }

  /// A logger for `name`, dispatching into the active pipeline.
  pub fn get_logger(&self, name: &str) -> Logger {
    let foundation = self.foundation();
    Logger::new(
      name,
      Arc::clone(&foundation.pipeline),
      Arc::clone(&foundation.resolver),
    )
  }

  /// The root logger.
  pub fn logger(&self) -> Logger {
    self.get_logger("root")
  }

  /// Attach a token-bucket rate limiter to one logger name.
  pub fn attach_rate_limiter(&self, logger_name: &str, capacity: f64, refill_rate: f64) -> Result<()> {
    let foundation = self.foundation();
    let bucket = TokenBucket::with_system_clock(capacity, refill_rate)?;
    foundation.limiters.attach(logger_name, bucket);
    Ok(())
  }

  /// Queue a component descriptor for discovery at init time, or register
  /// it immediately when the hub is already initialized.
  pub fn declare_component(&self, descriptor: ComponentDescriptor) -> Result<()> {
    if self.is_initialized() {
      let value = (descriptor.build)();
      return self.registry.register(
        descriptor.name,
        value,
        descriptor.dimension,
        None,
        None,
        true,
      );
    }
    self
      .pending_components
      .lock()
      .expect("hub component lock poisoned")
      .push(descriptor);
    Ok(())
  }

  pub fn add_component(
    &self,
    name: &str,
    value: crate::registry::ComponentValue,
    dimension: Option<&str>,
  ) -> Result<()> {
    self.registry.register(
      name,
      value,
      dimension.unwrap_or(DIMENSION_COMPONENT),
      None,
      None,
      false,
    )
  }

  pub fn get_component(&self, name: &str, dimension: &str) -> Option<crate::registry::ComponentValue> {
    self.registry.get(name, dimension)
  }

  /// Register a user event set; must happen before `initialize` (or before
  /// a forced re-init) to take effect in the catalog.
  pub fn register_event_set(&self, set: EventSet) -> Result<()> {
    self.registry.register(
      set.name.clone(),
      Arc::new(set) as crate::registry::ComponentValue,
      DIMENSION_EVENT_SET,
      None,
      None,
      false,
    )
  }

  /// Register a command under a dotted name (`db.migrate` nests under a
  /// `db` group in the CLI).
  pub fn register_command(
    &self,
    name: &str,
    handler: CommandHandler,
    category: Option<&str>,
  ) -> Result<()> {
    self.register_command_impl(name, handler, category, false)
  }

  fn register_command_impl(
    &self,
    name: &str,
    handler: CommandHandler,
    category: Option<&str>,
    replace: bool,
  ) -> Result<()> {
    let command = RegisteredCommand {
      name: name.to_string(),
      category: category.map(String::from),
      handler,
    };
    let mut metadata = indexmap::IndexMap::new();
    if let Some(cat) = category {
      metadata.insert("category".to_string(), Value::from(cat));
    }
    self.registry.register(
      name,
      Arc::new(command) as crate::registry::ComponentValue,
      DIMENSION_COMMAND,
      Some(metadata),
      None,
      replace,
    )
  }

  /// Build a dispatchable CLI from the `command` dimension.
  pub fn build_cli(&self, name: &str, version: &str) -> CliApp {
    // Make sure built-ins exist even when the caller never initialized.
    let _ = self.foundation();

    let mut handlers: HashMap<String, CommandHandler> = HashMap::new();
    let mut names: Vec<String> = Vec::new();
    for entry in self.registry.list(Some(DIMENSION_COMMAND)) {
      if let Ok(command) = entry.value.clone().downcast::<RegisteredCommand>() {
        handlers.insert(command.name.clone(), Arc::clone(&command.handler));
        names.push(command.name.clone());
      }
    }

    let command = build_command_tree(name, version, &names);
    CliApp { command, handlers }
  }

  /// Flush every sink in the active pipeline.
  pub fn flush(&self) {
    if let Some(foundation) = self.state.read().expect("hub state poisoned").as_ref() {
      foundation.pipeline.flush_all();
    }
  }

  /// Flush then close every sink.
  pub fn shutdown(&self) {
    if let Some(foundation) = self.state.read().expect("hub state poisoned").as_ref() {
      foundation.pipeline.shutdown();
    }
  }

  /// Restore the pristine pre-init state: no foundation, empty registry,
  /// zeroed diagnostics. Idempotent.
  pub fn reset_for_testing(&self) {
    let _guard = self.init_lock.lock().expect("hub init lock poisoned");
    let mut state = self.state.write().expect("hub state poisoned");
    *state = None;
    drop(state);
    self.registry.clear();
    self
      .pending_components
      .lock()
      .expect("hub component lock poisoned")
      .clear();
    crate::diag::global().reset();
  }

  /// Effective level currently applied to `name`; exposed for tests.
  pub fn effective_level(&self, name: &str) -> Level {
    self.foundation().resolver.effective(name)
  }
}

fn build_command_tree(name: &str, version: &str, dotted: &[String]) -> clap::Command {
  #[derive(Default)]
  struct Node {
    children: indexmap::IndexMap<String, Node>,
    is_leaf: bool,
  }

  let mut root = Node::default();
  for path in dotted {
    let mut node = &mut root;
    for part in path.split('.') {
      node = node.children.entry(part.to_string()).or_default();
    }
    node.is_leaf = true;
  }

  fn to_command(name: &str, node: &Node) -> clap::Command {
    let mut command = clap::Command::new(name.to_string());
    if node.is_leaf {
      command = command.arg(
        clap::Arg::new("args")
          .num_args(0..)
          .trailing_var_arg(true)
          .allow_hyphen_values(true)
          .value_name("ARGS"),
      );
    }
    for (child_name, child) in &node.children {
      command = command.subcommand(to_command(child_name, child));
    }
    command
  }

  let mut command = clap::Command::new(name.to_string())
    .version(version.to_string())
    .subcommand_required(true)
    .arg_required_else_help(true);
  for (child_name, child) in &root.children {
    command = command.subcommand(to_command(child_name, child));
  }
  command
}

/// A dispatchable CLI: the clap command tree plus the handler table.
pub struct CliApp {
  command: clap::Command,
  handlers: HashMap<String, CommandHandler>,
}

impl CliApp {
  pub fn command(&self) -> &clap::Command {
    &self.command
  }

  pub fn command_names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.handlers.keys().cloned().collect();
    names.sort();
    names
  }

  /// Parse `argv` and dispatch. Exit codes: 0 success, 1 handler failure,
  /// 2 usage error. Sinks are flushed before returning.
  pub fn run<I, S>(&self, argv: I) -> i32
  where
    I: IntoIterator<Item = S>,
    S: Into<std::ffi::OsString> + Clone,
  {
    let code = self.run_inner(argv);
    global().flush();
    code
  }

  fn run_inner<I, S>(&self, argv: I) -> i32
  where
    I: IntoIterator<Item = S>,
    S: Into<std::ffi::OsString> + Clone,
  {
    let matches = match self.command.clone().try_get_matches_from(argv) {
      Ok(matches) => matches,
      Err(err) => {
        use clap::error::ErrorKind;
        return match err.kind() {
          ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = err.print();
            0
          },
          _ => {
            let _ = err.print();
            2
          },
        };
      },
    };

    // Walk the subcommand path down to the leaf.
    let mut path: Vec<&str> = Vec::new();
    let mut current = &matches;
    while let Some((sub, sub_matches)) = current.subcommand() {
      path.push(sub);
      current = sub_matches;
    }
    let dotted = path.join(".");

    let Some(handler) = self.handlers.get(&dotted) else {
      eprintln!("unknown command: {}", dotted);
      return 2;
    };

    let args: Vec<String> = current
      .get_many::<String>("args")
      .map(|values| values.cloned().collect())
      .unwrap_or_default();

    match handler(&args) {
      Ok(()) => 0,
      Err(err) => {
        // Structured error output through the pipeline, in the active
        // console format.
        let logger = global().get_logger("cli");
        logger.error_with(
          "command failed",
          vec![
            ("command".to_string(), Value::from(dotted.as_str())),
            ("reason".to_string(), Value::from(err.to_string())),
          ],
        );
        1
      },
    }
  }
}
