//! Replay engine.
//!
//! One engine replays one log against one builder. Lines are read, lexed,
//! classified and dispatched strictly in order; the first error stops the
//! run and comes back with the line it happened on.

use crate::api::IlBuilderApi;
use crate::dispatch::dispatch;
use crate::phase::PhaseMachine;
use crate::registry::{Handle, RebindPolicy, Registry};
use crate::statement::StatementKind;
use ilreplay_core::{DispatchError, LogId, ProtocolError, ReplayResult};
use ilreplay_log::{classify, DefPayload, Definition, Line, LineSource, StatementLine};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, info_span, warn};

/// Replay engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Skip the first line as the recorder header
    pub skip_header: bool,
    /// What to do when an ID is registered twice
    pub rebind_policy: RebindPolicy,
    /// ID the method builder is bound to before the first line
    pub method_builder_id: LogId,
    /// Maximum lines to replay, header excluded (0 = unlimited)
    pub max_lines: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            skip_header: true,
            rebind_policy: RebindPolicy::Reject,
            method_builder_id: LogId::METHOD_BUILDER,
            max_lines: 0,
        }
    }
}

/// Counts for a finished replay
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySummary {
    /// Name of the log
    pub source: String,
    /// Physical lines read up to the end of the body, header included
    pub lines: usize,
    /// Definition lines
    pub definitions: usize,
    /// Statements dispatched, `DoneConstructor` included
    pub statements: usize,
    /// Annotation lines skipped
    pub annotations: usize,
    /// IDs bound at the end
    pub bindings: usize,
    /// Lines after the end of the body
    pub trailing_lines: usize,
}

/// What a successful replay hands back
#[derive(Debug)]
pub struct ReplayOutcome<B> {
    /// The builder, with everything the log did to it
    pub builder: B,
    /// Final ID bindings
    pub registry: Registry,
    /// Counts
    pub summary: ReplaySummary,
}

/// Replays a log against a builder
pub struct ReplayEngine<B> {
    builder: B,
    config: ReplayConfig,
    registry: Registry,
    phases: PhaseMachine,
    summary: ReplaySummary,
}

impl<B: IlBuilderApi> ReplayEngine<B> {
    /// Create an engine driving `builder`
    #[must_use]
    pub fn new(builder: B) -> Self {
        Self {
            builder,
            config: ReplayConfig::default(),
            registry: Registry::new(),
            phases: PhaseMachine::new(),
            summary: ReplaySummary::default(),
        }
    }

    /// Use a custom config
    #[must_use]
    pub fn with_config(mut self, config: ReplayConfig) -> Self {
        self.registry = Registry::with_policy(config.rebind_policy);
        self.config = config;
        self
    }

    /// Current config
    #[must_use]
    pub const fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Replay a log from any reader
    ///
    /// # Errors
    ///
    /// Returns the first error, with the offending line attached
    pub fn replay<R: BufRead>(
        mut self,
        name: &str,
        reader: R,
    ) -> ReplayResult<ReplayOutcome<B>> {
        let span = info_span!("replay", source = %name);
        let _enter = span.enter();

        self.summary.source = name.to_string();
        let method = Handle::MethodBuilder(self.builder.method_builder());
        self.registry.register(self.config.method_builder_id, method)?;

        let mut source = LineSource::new(reader).with_header_skip(self.config.skip_header);
        let mut replayed = 0;
        while let Some(line) = source.next_line()? {
            if self.config.max_lines > 0 && replayed >= self.config.max_lines {
                return Err(ProtocolError::LineLimit {
                    limit: self.config.max_lines,
                }
                .into());
            }
            replayed += 1;

            self.step(line.number, &line.text)
                .map_err(|e| e.at_line(line.number, line.text.as_str()))?;
            if self.phases.is_done() {
                break;
            }
        }
        self.phases.finish()?;

        self.summary.lines = source.lines_read();
        self.summary.trailing_lines = source.drain()?;
        if self.summary.trailing_lines > 0 {
            warn!(
                lines = self.summary.trailing_lines,
                "ignoring lines after the end of the body"
            );
        }
        self.summary.bindings = self.registry.len();

        info!(
            statements = self.summary.statements,
            definitions = self.summary.definitions,
            bindings = self.summary.bindings,
            "replay complete"
        );
        Ok(ReplayOutcome {
            builder: self.builder,
            registry: self.registry,
            summary: self.summary,
        })
    }

    /// Replay a log held in memory
    ///
    /// # Errors
    ///
    /// Returns the first error, with the offending line attached
    pub fn replay_str(self, text: &str) -> ReplayResult<ReplayOutcome<B>> {
        self.replay("<memory>", text.as_bytes())
    }

    /// Replay a log file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened, or the first replay error
    pub fn replay_path(self, path: impl AsRef<Path>) -> ReplayResult<ReplayOutcome<B>> {
        let path = path.as_ref();
        let file = File::open(path)?;
        self.replay(&path.display().to_string(), BufReader::new(file))
    }

    fn step(&mut self, number: usize, text: &str) -> ReplayResult<()> {
        match classify(text)? {
            Line::Definition(def) => self.define(def),
            Line::Annotation => {
                self.phases.annotation()?;
                debug!(line = number, "skipping annotation");
                self.summary.annotations += 1;
                Ok(())
            }
            Line::EndOfBody => self.phases.end_of_body(),
            Line::Statement(stmt) => self.statement(number, stmt),
        }
    }

    fn define(&mut self, def: Definition) -> ReplayResult<()> {
        let handle = match def.payload {
            DefPayload::Text(text) => Handle::Text(text),
            DefPayload::Address(addr) => Handle::Address(addr),
        };
        self.registry.register(def.id, handle)?;
        self.summary.definitions += 1;
        Ok(())
    }

    fn statement(&mut self, number: usize, stmt: StatementLine<'_>) -> ReplayResult<()> {
        let name = self.registry.text(stmt.name)?;
        let kind = StatementKind::from_name(name).ok_or_else(|| DispatchError::UnknownStatement {
            name: name.to_string(),
        })?;
        debug!(line = number, statement = %kind, owner = %stmt.owner, "dispatch");

        if kind == StatementKind::DoneConstructor {
            self.done_constructor(stmt)?;
        } else {
            self.phases.check(kind)?;
            dispatch(kind, stmt.owner, stmt.args, &mut self.registry, &mut self.builder)?;
        }
        self.summary.statements += 1;
        Ok(())
    }

    /// `DoneConstructor` may carry a quoted marker; nothing else
    fn done_constructor(&mut self, stmt: StatementLine<'_>) -> ReplayResult<()> {
        let mut args = stmt.args;
        self.registry.method_builder(stmt.owner)?;
        if !args.is_end() {
            args.next_text()?;
        }
        args.finish()?;
        self.phases.done_constructor()
    }
}
