//! Ctrl+C handling for graceful shutdown.
//!
//! A single `AtomicBool` is shared by the walker, the hasher and the refinement
//! engine. Ctrl+C sets it; each of them checks it between units of work and
//! stops early. Groups already written stay valid and the process exits with
//! [`crate::error::ExitCode::Interrupted`].
//!
//! ```rust,no_run
//! use chaindupe::duplicates::FinderConfig;
//! use chaindupe::signal::install_handler;
//!
//! let handler = install_handler();
//! let config = FinderConfig::default().with_shutdown_flag(handler.flag());
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with no shutdown requested and no signal hook.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True once Ctrl+C was pressed or [`ShutdownHandler::request_shutdown`] called.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Raise the flag by hand.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// The flag to pass to workers.
    #[must_use]
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Lower the flag again.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C hook and return its handler.
///
/// The hook can only be registered once per process. Later calls (for example
/// from tests that call [`crate::run_app`] repeatedly) get the same handler
/// back with the flag lowered. If registration fails the returned handler
/// still works for [`ShutdownHandler::request_shutdown`].
pub fn install_handler() -> ShutdownHandler {
    let handler = GLOBAL_HANDLER.get_or_init(|| {
        let handler = ShutdownHandler::new();
        let flag = handler.flag();

        let hooked = ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
            let _ = writeln!(std::io::stderr(), "\nInterrupted. Finishing up...");
            let _ = std::io::stderr().flush();
            log::info!("Shutdown signal received");
        });
        if let Err(e) = hooked {
            log::debug!("Ctrl+C handler not installed ({}), using unhooked handler", e);
        }

        handler
    });

    handler.reset();
    handler.clone()
}
