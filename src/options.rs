//! Per-parse configuration.

use tracing::Dispatch;
use typed_builder::TypedBuilder;

/// Name given to the scanner thread unless overridden.
pub const DEFAULT_SCANNER_THREAD_NAME: &str = "ein-scanner";

/// Options for a single parse.
///
/// ## Examples
///
/// ```
/// use ein::ParseOptions;
///
/// let options = ParseOptions::builder()
///     .scanner_thread_name("template-lexer")
///     .build();
///
/// assert_eq!(options.scanner_thread_name, "template-lexer");
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct ParseOptions {
    /// Where the scanner and parser send their trace events. Both threads of a
    /// parse use this dispatch and nothing else; the default drops everything.
    #[builder(default = Dispatch::none(), setter(into))]
    pub dispatch: Dispatch,

    /// Name of the scanner thread.
    #[builder(default = DEFAULT_SCANNER_THREAD_NAME.to_owned(), setter(into))]
    pub scanner_thread_name: String,
}

impl ParseOptions {
    /// Options that log to whichever subscriber is the default on the calling
    /// thread.
    pub fn with_current_dispatch() -> Self {
        let dispatch = tracing::dispatcher::get_default(Dispatch::clone);
        Self::builder().dispatch(dispatch).build()
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_do_not_log() {
        let options = ParseOptions::default();
        let enabled = tracing::dispatcher::with_default(&options.dispatch, || {
            tracing::enabled!(tracing::Level::ERROR)
        });
        assert!(!enabled);
        assert_eq!(options.scanner_thread_name, DEFAULT_SCANNER_THREAD_NAME);
    }
}
