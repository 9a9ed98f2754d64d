// =============================================================================
// Collaborator ports
// =============================================================================
//
// Traits for everything the engine talks to outside its own process, plus the
// minimal in-process implementations the binary runs with.

pub mod calendar;
pub mod notifier;
pub mod provider;
pub mod store;

pub use calendar::{BlackoutStatus, NewsCalendar, NewsEvent, NoNews};
pub use notifier::{format_message, LogNotifier, Notifier};
pub use provider::{MarketDataProvider, ProviderError, ReplayProvider, RetryingProvider};
pub use store::{MemorySignalStore, OutcomeKind, OutcomeRecord, SignalStore, StoreError};
