//! Navigation and execution engine.
//!
//! Runs compiled passages as a state machine walk over the story graph:
//! `Uninitialized` until a compiled module tree is installed, then `Ready`,
//! entering `Showing` for the duration of each top-level `show` and
//! returning to `Ready`. There is no terminal state; the engine lives for
//! the process lifetime.
//!
//! Key invariant: the output stack is a strict LIFO scoped resource. One
//! `PassageOutput` is pushed per `run_passage` call and popped on every
//! exit path, including failure inside nested passages, so the stack depth
//! returns to zero after every top-level `show`.
//!
//! Checkpoint ordering is load-bearing: the tentative checkpoint is created
//! BEFORE the passage executes (so it captures pre-execution state) and
//! committed only after rendering completes, keeping the last-known-good
//! entry consistent with what is visible.

use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, warn};
use weft_core::{path, CompiledPassage, ModuleTree, PassageMap, Segment};

use crate::checkpoint::Checkpoint;
use crate::error::EngineError;
use crate::host::{DisplaySurface, HistoryStore, MarkupRenderer, ScriptHost};
use crate::links::{self, FunctionLinks, LinkCallback, FUNCTION_SCHEME, PASSAGE_SCHEME};
use crate::output::{html_escape, PassageOutput};

/// Reserved tag: render into the popup surface instead of the main one.
pub const TAG_POPUP: &str = "popup";
/// Reserved tag: render nothing.
pub const TAG_SILENT: &str = "silent";
/// Reserved tag: do not commit a checkpoint for this output.
pub const TAG_NOCHECKPOINT: &str = "nocheckpoint";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Uninitialized,
    Ready,
    Showing,
}

/// A display handler inspects a finished output and either claims it
/// (returns `true`, stopping the chain) or declines.
pub type DisplayHandler = Box<dyn FnMut(&mut PassageOutput, &mut dyn DisplaySurface) -> bool>;

/// A callback queued to run once the current render completes.
pub type AfterRender =
    Box<dyn FnOnce(&mut Engine, &mut dyn ScriptHost) -> Result<(), EngineError>>;

/// Engine options, fixed at construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Name of the passage shown at startup, resolved against `/`.
    pub start_passage: String,
    /// Replace rewired anchor hrefs with an inert `#`.
    pub hide_links: bool,
    /// Push new history entries on navigation. When disabled, the current
    /// entry is always overwritten in place.
    pub allow_undo: bool,
    /// Expose committed checkpoints to save slots. Checkpoints still drive
    /// the history store when disabled.
    pub allow_saves: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            start_passage: "Start".to_owned(),
            hide_links: true,
            allow_undo: true,
            allow_saves: true,
        }
    }
}

/// The story engine: passage registry, navigation state, output stack,
/// display-handler chain, link registry, and checkpoint bookkeeping.
///
/// An `Engine` is an explicit value; a process may run several independent
/// engines. External collaborators are supplied at construction (renderer,
/// surface, history) or per call (`ScriptHost`).
pub struct Engine {
    state: EngineState,
    config: EngineConfig,
    passages: PassageMap,
    visited: BTreeMap<String, u32>,
    current: Option<String>,
    previous: Option<String>,
    first_current: Option<String>,
    previous_first_current: Option<String>,
    output_stack: Vec<PassageOutput>,
    handlers: Vec<DisplayHandler>,
    links: FunctionLinks,
    after_render: VecDeque<AfterRender>,
    load_listeners: Vec<AfterRender>,
    last_checkpoint: Option<String>,
    renderer: Box<dyn MarkupRenderer>,
    surface: Box<dyn DisplaySurface>,
    history: Box<dyn HistoryStore>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        renderer: Box<dyn MarkupRenderer>,
        surface: Box<dyn DisplaySurface>,
        history: Box<dyn HistoryStore>,
    ) -> Self {
        Engine {
            state: EngineState::Uninitialized,
            config,
            passages: PassageMap::new(),
            visited: BTreeMap::new(),
            current: None,
            previous: None,
            first_current: None,
            previous_first_current: None,
            output_stack: Vec::new(),
            handlers: Vec::new(),
            links: FunctionLinks::default(),
            after_render: VecDeque::new(),
            load_listeners: Vec::new(),
            last_checkpoint: None,
            renderer,
            surface,
            history,
        }
    }

    /// Install a compiled story: flatten the module tree into the passage
    /// map, hand each generated unit to the script host's compiler, and
    /// install the default display-handler chain.
    ///
    /// Compiler diagnostics are bifurcated: outright failure surfaces them
    /// on the display, warnings are logged and the unit proceeds.
    pub fn init(&mut self, tree: ModuleTree, host: &mut dyn ScriptHost) {
        self.passages = tree.flatten();

        for passage in self.passages.values() {
            match host.compile_unit(passage) {
                Ok(warnings) => {
                    for message in warnings {
                        warn!(passage = passage.name.as_str(), "{message}");
                    }
                }
                Err(diagnostics) => {
                    let mut html = String::new();
                    for message in &diagnostics {
                        html.push_str("<div>");
                        html.push_str(&html_escape(message));
                        html.push_str("</div>");
                    }
                    self.surface.render_main(&html);
                }
            }
        }

        // Handlers are evaluated most-recently-installed first, so the
        // default renderer goes in first and is tried last.
        self.handlers.push(Box::new(|output, surface| {
            surface.render_main(output.rendered_html.as_deref().unwrap_or(""));
            true
        }));
        self.handlers.push(Box::new(|output, surface| {
            if !output.has_tag(TAG_POPUP) {
                return false;
            }
            surface.render_popup(output.rendered_html.as_deref().unwrap_or(""));
            output.copy_tags_from(&[TAG_NOCHECKPOINT.to_owned()]);
            true
        }));
        self.handlers.push(Box::new(|output, _surface| {
            if !output.has_tag(TAG_SILENT) {
                return false;
            }
            output.copy_tags_from(&[TAG_NOCHECKPOINT.to_owned()]);
            true
        }));

        self.state = EngineState::Ready;
    }

    /// Install a display handler ahead of all existing ones.
    pub fn install_display_handler(&mut self, handler: DisplayHandler) {
        self.handlers.push(handler);
    }

    /// Queue a callback to run once at startup, before the first passage.
    pub fn add_load_listener(&mut self, listener: AfterRender) {
        self.load_listeners.push(listener);
    }

    /// Start the story: run load listeners, then show the configured start
    /// passage. Raises if the start passage cannot be resolved.
    pub fn start(&mut self, host: &mut dyn ScriptHost) -> Result<(), EngineError> {
        if self.state == EngineState::Uninitialized {
            return Err(EngineError::NotInitialized);
        }
        let listeners: Vec<AfterRender> = self.load_listeners.drain(..).collect();
        for listener in listeners {
            listener(self, host)?;
        }
        let name = path::canonicalize("/", &self.config.start_passage);
        if !self.passages.contains_key(&name) {
            return Err(EngineError::StartNotFound { name });
        }
        self.show(&name, host)
    }

    /// Show one passage: the top-level navigation operation driving a full
    /// turn. Unresolvable names are a silent no-op.
    pub fn show(&mut self, name: &str, host: &mut dyn ScriptHost) -> Result<(), EngineError> {
        match self.state {
            EngineState::Uninitialized => return Err(EngineError::NotInitialized),
            EngineState::Showing => return Err(EngineError::Busy),
            EngineState::Ready => {}
        }
        if !self.passages.contains_key(name) {
            debug!(name, "show of unresolved passage is a no-op");
            return Ok(());
        }
        self.state = EngineState::Showing;
        let result = self.show_inner(name, host);
        self.state = EngineState::Ready;
        result
    }

    fn show_inner(&mut self, name: &str, host: &mut dyn ScriptHost) -> Result<(), EngineError> {
        self.previous_first_current = self.first_current.take();
        self.previous = self.current.take();
        self.first_current = Some(name.to_owned());
        self.current = Some(name.to_owned());

        // Whether this checkpoint may be committed is only known after the
        // output's final tag set is seen.
        let tentative = self.create_checkpoint(name, &*host);

        let mut output = self.run_passage(name, host)?;
        output.rendered_html = Some(self.renderer.render(&output.text));

        self.rewire_output(&mut output);

        {
            let surface = self.surface.as_mut();
            for handler in self.handlers.iter_mut().rev() {
                if handler(&mut output, &mut *surface) {
                    break;
                }
            }
        }

        while let Some(callback) = self.after_render.pop_front() {
            callback(self, host)?;
        }

        self.links.clear_minted();

        if let Some(blob) = tentative {
            if !output.has_tag(TAG_NOCHECKPOINT) {
                self.commit_checkpoint(blob);
            }
        }
        Ok(())
    }

    /// Execute one passage into a fresh output. Increments the visited
    /// count, runs the unit with the output on the stack (popped on every
    /// exit path), and rewrites author link shorthand in the emitted text.
    pub fn run_passage(
        &mut self,
        name: &str,
        host: &mut dyn ScriptHost,
    ) -> Result<PassageOutput, EngineError> {
        let passage = self
            .passages
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::PassageNotFound {
                name: name.to_owned(),
            })?;

        *self.visited.entry(passage.name.clone()).or_insert(0) += 1;

        self.output_stack.push(PassageOutput::seeded(&passage.tags));
        let run = self.run_segments(&passage, host);
        let mut output = self
            .output_stack
            .pop()
            .ok_or(EngineError::NoOutputInScope)?;
        run?;

        output.text = links::rewrite_shorthand(&output.text, &passage.name);
        Ok(output)
    }

    fn run_segments(
        &mut self,
        passage: &CompiledPassage,
        host: &mut dyn ScriptHost,
    ) -> Result<(), EngineError> {
        for segment in &passage.segments {
            match segment {
                Segment::Text(text) => self.emit(text)?,
                Segment::EmitEscaped { expr, line } => {
                    let value = host
                        .eval(expr, self)
                        .map_err(|e| locate(e, &passage.name, *line))?;
                    self.emit(&html_escape(&value))?;
                }
                Segment::EmitRaw { expr, line } => {
                    let value = host
                        .eval(expr, self)
                        .map_err(|e| locate(e, &passage.name, *line))?;
                    self.emit(&value)?;
                }
                Segment::Statement { code, line } => {
                    host.exec(code, self)
                        .map_err(|e| locate(e, &passage.name, *line))?;
                }
            }
        }
        Ok(())
    }

    /// Append text to the in-flight passage output. Host-visible so
    /// directive code can add to the current output without holding an
    /// explicit copy of it.
    pub fn emit(&mut self, text: &str) -> Result<(), EngineError> {
        let output = self
            .output_stack
            .last_mut()
            .ok_or(EngineError::NoOutputInScope)?;
        output.out(text);
        Ok(())
    }

    /// Run a nested passage and merge its emitted text into the caller's
    /// output. The caller's tags and navigation identity are untouched.
    pub fn include(
        &mut self,
        target: &str,
        host: &mut dyn ScriptHost,
    ) -> Result<PassageOutput, EngineError> {
        let name = self.resolve(target);
        let output = self.run_passage(&name, host)?;
        let current = self
            .output_stack
            .last_mut()
            .ok_or(EngineError::NoOutputInScope)?;
        current.merge_in(&output);
        Ok(output)
    }

    /// Like [`include`](Engine::include), but also reassigns the engine's
    /// notion of current passage to the target and overwrites the caller's
    /// output tags with the target's, so tags with runtime meaning
    /// propagate through.
    pub fn fallthrough(
        &mut self,
        target: &str,
        host: &mut dyn ScriptHost,
    ) -> Result<PassageOutput, EngineError> {
        let name = self.resolve(target);
        self.current = Some(name.clone());
        let output = self.run_passage(&name, host)?;
        let current = self
            .output_stack
            .last_mut()
            .ok_or(EngineError::NoOutputInScope)?;
        current.merge_in(&output);
        current.copy_tags_from(&output.tags);
        Ok(output)
    }

    /// Run a passage and render it directly into the popup surface,
    /// outside the normal show cycle.
    pub fn popup(&mut self, target: &str, host: &mut dyn ScriptHost) -> Result<(), EngineError> {
        let name = self.resolve(target);
        let output = self.run_passage(&name, host)?;
        let html = self.renderer.render(&output.text);
        self.surface.render_popup(&html);
        Ok(())
    }

    /// Register a deferred callback; returns the href to embed in output
    /// text. The token is valid for the turn being shown only.
    pub fn fnlink(&mut self, callback: LinkCallback) -> String {
        self.links.mint(callback)
    }

    /// Queue a callback to run after the current render completes.
    pub fn run_after(&mut self, callback: AfterRender) {
        self.after_render.push_back(callback);
    }

    /// Dispatch a clicked anchor by its intercept target (the rewired
    /// [`links::TARGET_ATTR`] value). Navigation targets re-enter `show`;
    /// function targets dispatch their registered callback exactly once.
    pub fn follow(&mut self, target: &str, host: &mut dyn ScriptHost) -> Result<(), EngineError> {
        if let Some(name) = target.strip_prefix(PASSAGE_SCHEME) {
            return self.show(name, host);
        }
        if let Some(token) = target.strip_prefix(FUNCTION_SCHEME) {
            let Ok(token) = token.parse::<u64>() else {
                debug!(target, "unparseable function token ignored");
                return Ok(());
            };
            let Some(callback) = self.links.dispatch(token) else {
                warn!(token, "stale function link dispatched");
                return Err(EngineError::StaleFunctionLink { token });
            };
            return callback(self, host);
        }
        debug!(target, "foreign link ignored");
        Ok(())
    }

    /// Restore a checkpoint blob: a replay instruction, not a screen
    /// snapshot. Malformed blobs are ignored, leaving current state
    /// untouched.
    pub fn restore_checkpoint(
        &mut self,
        blob: &str,
        host: &mut dyn ScriptHost,
    ) -> Result<(), EngineError> {
        let Some(checkpoint) = Checkpoint::decode(blob) else {
            warn!("ignoring malformed checkpoint");
            return Ok(());
        };
        self.visited = checkpoint.visited;
        host.restore_snapshot(&checkpoint.state);
        // The freshly restored state must not be immediately re-committed
        // as an identical history entry.
        self.last_checkpoint = None;
        self.show(&checkpoint.passage, host)
    }

    /// Resolve a link target relative to the current passage.
    pub fn resolve(&self, target: &str) -> String {
        let base = self.current.as_deref().unwrap_or("/");
        path::canonicalize(base, target)
    }

    // ── Navigation state queries ─────────────────────────────────────

    pub fn passage(&self, name: &str) -> Option<&CompiledPassage> {
        self.passages.get(name)
    }

    pub fn passages(&self) -> &PassageMap {
        &self.passages
    }

    pub fn current_passage(&self) -> Option<&CompiledPassage> {
        self.passages.get(self.current.as_deref()?)
    }

    pub fn previous_passage(&self) -> Option<&CompiledPassage> {
        self.passages.get(self.previous.as_deref()?)
    }

    /// The passage shown at the start of the current user-triggered turn
    /// (fallthrough may have moved `current_passage` since).
    pub fn first_current_passage(&self) -> Option<&CompiledPassage> {
        self.passages.get(self.first_current.as_deref()?)
    }

    /// The entry passage of the previous turn.
    pub fn previous_first_current_passage(&self) -> Option<&CompiledPassage> {
        self.passages.get(self.previous_first_current.as_deref()?)
    }

    /// How many times a passage has run, by any entry path.
    pub fn visited(&self, name: &str) -> u32 {
        self.visited.get(name).copied().unwrap_or(0)
    }

    /// The last committed checkpoint blob, if any. This is what save
    /// slots store; `None` whenever saving is disabled.
    pub fn last_checkpoint(&self) -> Option<&str> {
        if !self.config.allow_saves {
            return None;
        }
        self.last_checkpoint.as_deref()
    }

    /// Current output-stack depth; zero between turns.
    pub fn output_depth(&self) -> usize {
        self.output_stack.len()
    }

    // ── Checkpoint plumbing ──────────────────────────────────────────

    fn create_checkpoint(&self, name: &str, host: &dyn ScriptHost) -> Option<String> {
        let state = host.create_snapshot()?;
        let checkpoint = Checkpoint {
            passage: name.to_owned(),
            state,
            visited: self.visited.clone(),
        };
        match checkpoint.encode() {
            Ok(blob) => Some(blob),
            Err(e) => {
                warn!(error = %e, "checkpoint serialization failed; none taken this turn");
                None
            }
        }
    }

    fn commit_checkpoint(&mut self, blob: String) {
        match (&self.last_checkpoint, self.config.allow_undo) {
            (Some(last), true) => {
                // Re-write the previous entry, then advance to a new one.
                self.history.replace(last);
                self.history.push(&blob);
            }
            _ => {
                self.history.replace(&blob);
            }
        }
        self.last_checkpoint = Some(blob);
    }

    fn rewire_output(&mut self, output: &mut PassageOutput) {
        self.links.wire();
        if let Some(html) = output.rendered_html.take() {
            let rewired = links::rewire_anchors(&html, self.config.hide_links, &mut |base, dest| {
                path::canonicalize(base, dest)
            });
            output.rendered_html = Some(rewired);
        }
    }
}

/// Attach directive location to host errors that lack one.
fn locate(err: EngineError, passage: &str, line: u32) -> EngineError {
    match err {
        e @ EngineError::Script { .. } => e,
        other => EngineError::script(passage, line, other.to_string()),
    }
}
