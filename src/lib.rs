//! Campaign state engine for tabletop game facilitators.
//!
//! This crate provides:
//! - A single-owner state store over one JSON document, with path-addressed
//!   reads and writes, snapshot isolation, and change notifications
//! - Typed campaign operations: plot threads, story beats, characters and
//!   relationships, and a combat initiative tracker
//! - Throttled persistence to a pluggable key-value storage adapter, plus
//!   pretty-printed export and merge-on-import
//!
//! # Quick Start
//!
//! ```no_run
//! use campaign_keeper::{CampaignSession, Combatant, FileStorage, StateStore};
//!
//! let storage = FileStorage::new("./saves", "campaign-state");
//! let mut session = CampaignSession::new(StateStore::new(storage));
//! session.initialize();
//!
//! let thread = session.add_thread("The Missing Warden", "Who silenced the post?")?;
//! session.add_beat(&thread, "Arrival", "The party reaches Hollowbrook.")?;
//!
//! session.start_combat(vec![
//!     Combatant::new("Aralyn", 17, 21, 15).player(),
//!     Combatant::new("Goblin", 12, 7, 13),
//! ])?;
//! session.save();
//! # Ok::<(), campaign_keeper::StoreError>(())
//! ```

pub mod campaign;
pub mod document;
pub mod model;
pub mod notify;
pub mod persist;
pub mod store;

// Primary public API
pub use campaign::CampaignSession;
pub use document::{Path, Segment};
pub use model::{
    AppState, Campaign, CharacterRecord, Characters, CombatTracker, Combatant, Encounter,
    Location, PlotThread, Relationship, Settings, Story, StoryBeat, ThreadStatus, UiState,
};
pub use notify::{ChangeBus, ChangeRecord, SubscriberError, SubscriptionId};
pub use persist::{FileStorage, MemoryStorage, PersistError, PersistThrottle, StorageAdapter};
pub use store::{StateStore, StoreConfig, StoreError};
