//! The polling runtime.
//!
//! [`ParleyRuntime`] owns an [`UpdateSource`], an [`EventBus`] and the
//! [`UpdateDriver`] connecting them. It remembers the highest update id it
//! has seen and always asks the source for the updates after it.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use parley_runtime::{MemorySource, ParleyRuntime};
//!
//! let runtime = ParleyRuntime::builder()
//!     .config_file("parley.toml")
//!     .source(MemorySource::new())
//!     .build()?;
//!
//! runtime.add_message_handler(MessageHandler::new(echo).commands(["echo"]));
//! runtime.run().await?;
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use parley_core::{EventName, Update};
use parley_framework::{
    CallbackQueryHandler, ChosenInlineResultHandler, EventBus, InlineHandler, ListenerId,
    MessageHandler, update_observer,
};

use crate::config::{ConfigLoader, ParleyConfig, validate_config};
use crate::driver::{BatchReport, FailurePolicy, UpdateDriver};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::source::UpdateSource;

/// Timeout used when skipping pending updates.
const SKIP_TIMEOUT: Duration = Duration::from_secs(1);

/// Polls an update source and dispatches what it returns.
pub struct ParleyRuntime {
    config: ParleyConfig,
    driver: UpdateDriver,
    source: tokio::sync::Mutex<Box<dyn UpdateSource>>,
    last_update_id: AtomicI64,
    shutdown: Mutex<CancellationToken>,
}

impl ParleyRuntime {
    /// Creates a runtime with default configuration.
    ///
    /// Logging is left alone; use [`builder`](Self::builder) or
    /// [`from_config`](Self::from_config) to have it set up.
    pub fn new(source: impl UpdateSource + 'static) -> Self {
        Self::assemble(ParleyConfig::default(), Box::new(source), None)
    }

    /// Creates a runtime builder.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from configuration and initializes logging.
    pub fn from_config(config: &ParleyConfig, source: impl UpdateSource + 'static) -> Self {
        logging::init_from_config(&config.logging);
        Self::assemble(config.clone(), Box::new(source), None)
    }

    fn assemble(
        config: ParleyConfig,
        source: Box<dyn UpdateSource>,
        policy: Option<FailurePolicy>,
    ) -> Self {
        let policy = policy.unwrap_or_else(|| config.polling.failure_policy.into());
        let driver = UpdateDriver::new(EventBus::new()).with_policy(policy);

        info!(
            log_level = %config.logging.level,
            timeout_secs = config.polling.timeout_secs,
            failure_policy = ?config.polling.failure_policy,
            "Runtime initialized"
        );

        Self {
            config,
            driver,
            source: tokio::sync::Mutex::new(source),
            last_update_id: AtomicI64::new(0),
            shutdown: Mutex::new(CancellationToken::new()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ParleyConfig {
        &self.config
    }

    /// Returns the event bus.
    pub fn bus(&self) -> &EventBus {
        self.driver.bus()
    }

    /// Returns the update driver.
    pub fn driver(&self) -> &UpdateDriver {
        &self.driver
    }

    /// Returns the highest update id seen so far, or 0.
    pub fn last_update_id(&self) -> i64 {
        self.last_update_id.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a handler for new messages.
    pub fn add_message_handler(&self, handler: MessageHandler) -> ListenerId {
        debug!(handler = handler.get_name(), "Registering message handler");
        self.bus().append(EventName::Message, handler)
    }

    /// Registers a handler for edited messages.
    pub fn add_edited_message_handler(&self, handler: MessageHandler) -> ListenerId {
        debug!(handler = handler.get_name(), "Registering edited message handler");
        self.bus().append(EventName::EditedMessage, handler)
    }

    /// Registers a handler for inline queries.
    pub fn add_inline_handler(&self, handler: InlineHandler) -> ListenerId {
        debug!(handler = handler.get_name(), "Registering inline handler");
        self.bus().append(EventName::InlineQuery, handler)
    }

    /// Registers a handler for chosen inline results.
    pub fn add_chosen_inline_handler(&self, handler: ChosenInlineResultHandler) -> ListenerId {
        debug!(handler = handler.get_name(), "Registering chosen inline result handler");
        self.bus().append(EventName::ChosenInlineResult, handler)
    }

    /// Registers a handler for callback queries.
    pub fn add_callback_query_handler(&self, handler: CallbackQueryHandler) -> ListenerId {
        debug!(handler = handler.get_name(), "Registering callback query handler");
        self.bus().append(EventName::CallbackQuery, handler)
    }

    /// Registers a function called with every raw update.
    pub fn add_update_listener<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&Update) + Send + Sync + 'static,
    {
        self.bus()
            .append(EventName::Update, update_observer("update_listener", f))
    }

    /// Removes a registered listener or handler.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.bus().remove(id)
    }

    // =========================================================================
    // Processing
    // =========================================================================

    /// Dispatches a batch of updates.
    ///
    /// If the failure policy halts the batch, polling is stopped as well.
    pub async fn process_new_updates(&self, updates: &[Update]) -> BatchReport {
        let report = self.driver.process_updates(updates).await;
        if report.halted {
            self.stop_polling();
        }
        report
    }

    /// Fetches and dispatches updates until the source has none left.
    ///
    /// Returns the number of updates fetched. The stored offset moves past
    /// each update once it has been processed. When the failure policy halts
    /// a batch, the update that failed and everything after it are fetched
    /// again on the next call.
    pub async fn retrieve_updates(&self, timeout: Duration) -> RuntimeResult<usize> {
        let mut source = self.source.lock().await;
        let mut total = 0;

        loop {
            let offset = self.last_update_id() + 1;
            let updates = source.fetch(offset, timeout).await?;
            if updates.is_empty() {
                break;
            }

            debug!(count = updates.len(), offset, "Received updates");
            total += updates.len();

            let report = self.process_new_updates(&updates).await;
            if let Some(id) = report.last_processed {
                self.last_update_id.fetch_max(id, Ordering::SeqCst);
            }
            if report.halted {
                break;
            }
        }

        Ok(total)
    }

    /// Discards every pending update and returns how many there were.
    pub async fn skip_updates(&self) -> RuntimeResult<usize> {
        let mut source = self.source.lock().await;
        let mut total = 0;

        loop {
            let offset = self.last_update_id() + 1;
            let updates = source.fetch(offset, SKIP_TIMEOUT).await?;
            let Some(max_id) = updates.iter().map(|u| u.update_id).max() else {
                break;
            };

            self.last_update_id.fetch_max(max_id, Ordering::SeqCst);
            total += updates.len();
        }

        Ok(total)
    }

    // =========================================================================
    // Polling
    // =========================================================================

    /// Polls until [`stop_polling`](Self::stop_polling) is called.
    ///
    /// A failed fetch is logged and retried after the idle delay.
    pub async fn polling(&self, skip_pending: bool) -> RuntimeResult<()> {
        let token = {
            let mut shutdown = self.shutdown.lock();
            *shutdown = CancellationToken::new();
            shutdown.clone()
        };

        info!("Started polling");

        if skip_pending {
            let skipped = self.skip_updates().await?;
            info!(skipped, "Skipped pending updates");
        }

        let timeout = self.config.polling.timeout();
        let idle_delay = self.config.polling.idle_delay();

        while !token.is_cancelled() {
            let idle = match self.retrieve_updates(timeout).await {
                Ok(count) => count == 0,
                Err(err) => {
                    error!(error = %err, "Failed to retrieve updates");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(idle_delay) => {}
                }
            }
        }

        info!("Stopped polling");
        Ok(())
    }

    /// Stops the polling loop after the current fetch.
    pub fn stop_polling(&self) {
        self.shutdown.lock().cancel();
    }

    /// Returns whether polling has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.shutdown.lock().is_cancelled()
    }

    /// Returns the token cancelled by [`stop_polling`](Self::stop_polling).
    ///
    /// Each call to [`polling`](Self::polling) installs a fresh token.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.lock().clone()
    }

    /// Polls until stopped or until Ctrl+C or SIGTERM arrives.
    pub async fn run(&self) -> RuntimeResult<()> {
        info!("Parley runtime is now running. Press Ctrl+C to stop.");

        tokio::select! {
            result = self.polling(self.config.polling.skip_pending) => result,
            _ = wait_for_shutdown() => {
                self.stop_polling();
                info!("Stopped polling");
                Ok(())
            }
        }
    }
}

/// Waits for Ctrl+C or SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {
                        info!("Received Ctrl+C, shutting down");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
                return;
            }
            Err(err) => warn!(error = %err, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(err) => {
            error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`ParleyRuntime`] with loaded configuration.
///
/// # Example
///
/// ```rust,ignore
/// let runtime = ParleyRuntime::builder()
///     .profile("production")
///     .source(source)
///     .policy(FailurePolicy::continuing())
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    source: Option<Box<dyn UpdateSource>>,
    policy: Option<FailurePolicy>,
}

impl RuntimeBuilder {
    /// Creates a builder searching the current directory for configuration.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            source: None,
            policy: None,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Enables `PARLEY_*` environment variables (the default).
    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    /// Disables `PARLEY_*` environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration on top of everything loaded.
    pub fn merge(mut self, config: ParleyConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Sets the update source.
    pub fn source(mut self, source: impl UpdateSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Overrides the failure policy chosen by configuration.
    pub fn policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Loads and validates configuration, then builds the runtime.
    pub fn build(self) -> RuntimeResult<ParleyRuntime> {
        let source = self.source.ok_or(RuntimeError::MissingSource)?;
        let config = self.config_loader.load()?;
        validate_config(&config)?;

        logging::init_from_config(&config.logging);
        Ok(ParleyRuntime::assemble(config, source, self.policy))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    use parley_core::Message;

    use super::*;
    use crate::source::MemorySource;

    fn text(id: i64, chat: i64, text: &str) -> Update {
        Update::message(id, Message::text_in(chat, text))
    }

    fn counting_handler(runtime: &ParleyRuntime) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        runtime.add_message_handler(MessageHandler::new(move |_msg: Message| {
            let count = count_clone.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        }));
        count
    }

    #[tokio::test]
    async fn test_retrieve_updates_advances_offset() {
        let source = MemorySource::with_batches([
            vec![text(1, 1, "a"), text(2, 1, "b")],
            vec![text(3, 1, "c")],
        ]);
        let runtime = ParleyRuntime::new(source.clone());
        let count = counting_handler(&runtime);

        let fetched = runtime.retrieve_updates(Duration::ZERO).await.unwrap();

        assert_eq!(fetched, 3);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(runtime.last_update_id(), 3);
        assert_eq!(source.offsets(), vec![1, 3, 4]);
    }

    #[tokio::test]
    async fn test_skip_updates() {
        let source = MemorySource::with_batches([vec![text(5, 1, "a"), text(6, 1, "b")]]);
        let runtime = ParleyRuntime::new(source.clone());
        let count = counting_handler(&runtime);

        assert_eq!(runtime.skip_updates().await.unwrap(), 2);
        assert_eq!(runtime.last_update_id(), 6);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_source_error_propagates() {
        let source = MemorySource::new();
        source.push_error("unauthorized");
        let runtime = ParleyRuntime::new(source);

        let err = runtime.retrieve_updates(Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Source(_)));
    }

    #[tokio::test]
    async fn test_stopping_policy_stops_polling() {
        let source = MemorySource::with_batches([vec![
            text(1, 1, "ok"),
            text(2, 1, "fail"),
            text(3, 1, "never"),
        ]]);
        let runtime = ParleyRuntime::new(source);
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        runtime.add_message_handler(MessageHandler::new(move |msg: Message| {
            let seen = seen_clone.clone();
            async move {
                let text = msg.text().unwrap_or_default().to_string();
                seen.lock().push(text.clone());
                if text == "fail" {
                    anyhow::bail!("handler failed");
                }
                Ok(())
            }
        }));

        runtime.polling(false).await.unwrap();

        assert!(runtime.is_stopped());
        assert_eq!(*seen.lock(), vec!["ok", "fail"]);
        assert_eq!(runtime.last_update_id(), 1);
    }

    #[tokio::test]
    async fn test_halted_batch_is_fetched_again() {
        let batch = || vec![text(1, 1, "ok"), text(2, 1, "fail"), text(3, 1, "never")];
        let source = MemorySource::with_batches([batch()]);
        let runtime = ParleyRuntime::new(source.clone());
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let failed_once = Arc::new(AtomicBool::new(false));

        let seen_clone = seen.clone();
        runtime.add_message_handler(MessageHandler::new(move |msg: Message| {
            let seen = seen_clone.clone();
            let failed_once = failed_once.clone();
            async move {
                let text = msg.text().unwrap_or_default().to_string();
                seen.lock().push(text.clone());
                if text == "fail" && !failed_once.swap(true, Ordering::SeqCst) {
                    anyhow::bail!("handler failed");
                }
                Ok(())
            }
        }));

        runtime.retrieve_updates(Duration::ZERO).await.unwrap();
        assert_eq!(runtime.last_update_id(), 1);

        source.push_batch(batch());
        runtime.retrieve_updates(Duration::ZERO).await.unwrap();

        assert_eq!(*seen.lock(), vec!["ok", "fail", "fail", "never"]);
        assert_eq!(runtime.last_update_id(), 3);
        assert_eq!(source.offsets(), vec![1, 2, 4]);
    }

    #[tokio::test]
    async fn test_polling_skips_pending_then_stops() {
        let source = MemorySource::with_batches([vec![text(1, 1, "old")]]);
        let mut config = ParleyConfig::default();
        config.polling.idle_delay_ms = 1;
        let runtime = ParleyRuntime::assemble(config, Box::new(source.clone()), None);
        let count = counting_handler(&runtime);

        let stopper = async {
            while source.offsets().len() < 3 {
                tokio::task::yield_now().await;
            }
            runtime.stop_polling();
        };
        let (result, ()) = tokio::join!(runtime.polling(true), stopper);

        result.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(runtime.last_update_id(), 1);
    }

    #[test]
    fn test_builder_requires_source() {
        let result = ParleyRuntime::builder().without_env().build();
        assert!(matches!(result, Err(RuntimeError::MissingSource)));
    }
}
