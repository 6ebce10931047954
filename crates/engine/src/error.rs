/// All errors that can be returned by the navigation engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The configured start passage could not be resolved at startup.
    #[error("cannot find start passage {name}")]
    StartNotFound { name: String },

    /// A passage named by an include, fallthrough, or popup call does not
    /// exist in the passage map.
    #[error("passage not found: {name}")]
    PassageNotFound { name: String },

    /// The engine has not been initialized with a compiled story yet.
    #[error("engine not initialized")]
    NotInitialized,

    /// A navigation entry point was invoked while a passage was already
    /// being shown. The engine is single-threaded and non-reentrant.
    #[error("engine is already showing a passage")]
    Busy,

    /// A function-link token from a previous turn was dispatched. Tokens
    /// are single-turn-scoped; the table is cleared at end of turn.
    #[error("stale function link token: {token}")]
    StaleFunctionLink { token: u64 },

    /// The output stack was empty where a passage output was required.
    /// Indicates a script host bypassed the engine's execution entry points.
    #[error("no passage output in scope")]
    NoOutputInScope,

    /// The script host failed evaluating a directive.
    #[error("script error in {passage} (line {line}): {message}")]
    Script {
        passage: String,
        line: u32,
        message: String,
    },
}

impl EngineError {
    /// Wrap a host-reported message with the directive's location.
    pub fn script(passage: &str, line: u32, message: impl Into<String>) -> Self {
        EngineError::Script {
            passage: passage.to_owned(),
            line,
            message: message.into(),
        }
    }
}
