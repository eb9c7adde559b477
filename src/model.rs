//! Typed state document for a tabletop campaign.
//!
//! These types mirror the persisted JSON layout exactly (camelCase keys), so
//! string paths like `combat.activeIndex` or `settings.autosaveInterval`
//! address the same fields whether the document is handled generically or
//! through this typed layer.
//!
//! Every struct tolerates missing fields on deserialize (struct-level
//! `serde(default)`): forward/backward compatibility of persisted documents
//! relies on this plus deep-merge-on-load.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// ============================================================================
// ID generation
// ============================================================================

/// Generate an entity id: base-36 millisecond timestamp plus a 4-character
/// random base-36 suffix.
///
/// Low-volume, single-writer ids: collision probability is low but non-zero,
/// and ordering is not guaranteed under clock skew.
pub fn generate_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let suffix = rand::thread_rng().gen_range(0..36u64.pow(4));
    format!("{}{:0>4}", base36(millis), base36(suffix))
}

fn base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

// ============================================================================
// UI
// ============================================================================

/// Ephemeral UI state plus the persisted presentation preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UiState {
    /// Identifier of the active tab ("story", "characters", "combat", ...).
    pub active_tab: String,

    /// Whether focus mode (distraction-free single panel) is on.
    pub focus_mode: bool,

    /// ISO-8601 timestamp of the last mutation, stamped by the store.
    pub last_saved: String,

    /// Panel size ratios of the full window width, keyed by panel name.
    pub panel_ratios: BTreeMap<String, f64>,

    /// Active theme name.
    pub theme: String,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            active_tab: "story".to_string(),
            focus_mode: false,
            last_saved: String::new(),
            panel_ratios: BTreeMap::from([
                ("left".to_string(), 0.35),
                ("right".to_string(), 0.65),
            ]),
            theme: "parchment".to_string(),
        }
    }
}

// ============================================================================
// Story
// ============================================================================

/// The campaign record plus its ordered narrative collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Story {
    pub campaign: Campaign,
    pub threads: Vec<PlotThread>,
    pub beats: Vec<StoryBeat>,
    pub locations: Vec<Location>,
}

/// Top-level campaign record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Campaign {
    pub name: String,
    pub description: String,
    pub setting: String,
    /// Number of sessions run so far.
    pub session_count: u32,
}

/// Lifecycle of a plot thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    #[default]
    Active,
    Resolved,
    Abandoned,
}

/// A named narrative arc tracked across sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlotThread {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: ThreadStatus,
}

impl PlotThread {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            title: title.into(),
            description: description.into(),
            status: ThreadStatus::Active,
        }
    }
}

/// A discrete narrative event belonging to one thread.
///
/// `revealed` controls facilitator-only visibility: hidden beats are prep
/// notes, revealed beats have happened at the table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoryBeat {
    pub id: String,
    /// Id of the thread this beat belongs to.
    pub thread_id: String,
    pub title: String,
    pub content: String,
    /// Position within the thread.
    pub order: u32,
    pub revealed: bool,
}

impl StoryBeat {
    pub fn new(
        thread_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        order: u32,
    ) -> Self {
        Self {
            id: generate_id(),
            thread_id: thread_id.into(),
            title: title.into(),
            content: content.into(),
            order,
            revealed: false,
        }
    }
}

/// A place the campaign can visit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
}

impl Location {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            name: name.into(),
            description: description.into(),
            tags: Vec::new(),
        }
    }
}

// ============================================================================
// Characters
// ============================================================================

/// Player characters, NPCs, and the relationships between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Characters {
    pub players: Vec<CharacterRecord>,
    pub npcs: Vec<CharacterRecord>,
    pub relationships: Vec<Relationship>,
}

/// A tracked character, player or NPC alike.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CharacterRecord {
    pub id: String,
    pub name: String,
    pub race: String,
    pub class: String,
    pub description: String,
    pub notes: String,
}

impl CharacterRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            name: name.into(),
            ..Self::default()
        }
    }
}

/// An unordered pair of character ids with a type tag and free text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Relationship {
    pub id: String,
    pub character_a: String,
    pub character_b: String,
    /// Type tag ("ally", "rival", "family", ...). Free-form.
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

impl Relationship {
    pub fn new(
        character_a: impl Into<String>,
        character_b: impl Into<String>,
        kind: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_id(),
            character_a: character_a.into(),
            character_b: character_b.into(),
            kind: kind.into(),
            description: description.into(),
        }
    }

    /// Whether either endpoint references the given character id.
    pub fn references(&self, character_id: &str) -> bool {
        self.character_a == character_id || self.character_b == character_id
    }
}

// ============================================================================
// Combat
// ============================================================================

/// Combat encounter tracking.
///
/// Invariant: `active_index` is meaningful only while `in_combat` is true,
/// and must then be `< initiative.len()`. The typed ops layer repairs it on
/// every combatant removal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CombatTracker {
    pub in_combat: bool,
    pub round: u32,
    pub active_index: usize,
    pub initiative: Vec<Combatant>,
    pub encounters: Vec<Encounter>,
}

/// A participant in a combat encounter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Combatant {
    pub id: String,
    pub name: String,
    pub initiative: i32,
    #[serde(rename = "currentHP")]
    pub current_hp: i32,
    #[serde(rename = "maxHP")]
    pub max_hp: i32,
    /// Armor class.
    pub ac: u8,
    /// Active conditions ("prone", "poisoned", ...).
    pub conditions: Vec<String>,
    pub is_player: bool,
}

impl Combatant {
    pub fn new(name: impl Into<String>, initiative: i32, hp: i32, ac: u8) -> Self {
        Self {
            id: generate_id(),
            name: name.into(),
            initiative,
            current_hp: hp,
            max_hp: hp,
            ac,
            conditions: Vec::new(),
            is_player: false,
        }
    }

    pub fn player(mut self) -> Self {
        self.is_player = true;
        self
    }
}

/// A saved encounter template: a named initiative roster that can be loaded
/// back into the tracker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Encounter {
    pub id: String,
    pub name: String,
    pub combatants: Vec<Combatant>,
}

// ============================================================================
// Settings
// ============================================================================

/// Flat record of user preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Seconds between host-driven autosave ticks.
    pub autosave_interval: u32,
    pub confirm_before_delete: bool,
    /// Show hidden (unrevealed) beats in the story view.
    pub show_hidden_beats: bool,
    /// Roll initiative automatically when adding combatants.
    pub auto_roll_initiative: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            autosave_interval: 30,
            confirm_before_delete: true,
            show_hidden_beats: false,
            auto_roll_initiative: false,
        }
    }
}

// ============================================================================
// Document root
// ============================================================================

/// The complete application state: one JSON-serializable document with five
/// top-level sections. `AppState::default()` is the hard-coded reset
/// skeleton (empty collections, default settings).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppState {
    pub ui: UiState,
    pub story: Story,
    pub characters: Characters,
    pub combat: CombatTracker,
    pub settings: Settings,
}

impl AppState {
    /// Serialize into the generic document form the store operates on.
    pub fn to_document(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}

/// Seed dataset installed on first launch, when no persisted document
/// exists. Gives the facilitator something to explore instead of a blank
/// screen.
pub fn sample_campaign() -> AppState {
    let mut state = AppState::default();

    state.story.campaign = Campaign {
        name: "The Shattered Vale".to_string(),
        description: "A frontier valley where the old wards are failing.".to_string(),
        setting: "Low-magic frontier".to_string(),
        session_count: 1,
    };

    let missing_warden = PlotThread::new(
        "The Missing Warden",
        "Warden Elsbeth has not reported in since the equinox.",
    );
    let failing_wards = PlotThread::new(
        "The Failing Wards",
        "The standing stones around the vale are cracking one by one.",
    );

    let mut arrival = StoryBeat::new(
        &missing_warden.id,
        "Arrival at Hollowbrook",
        "The party reaches the village and finds the warden's post abandoned.",
        1,
    );
    arrival.revealed = true;
    let cold_trail = StoryBeat::new(
        &missing_warden.id,
        "A Cold Trail",
        "Tracks from the post lead toward the northern stones, then stop.",
        2,
    );
    let first_crack = StoryBeat::new(
        &failing_wards.id,
        "The First Crack",
        "A shepherd reports a humming fracture in the eastern ward stone.",
        1,
    );

    let hollowbrook = Location::new(
        "Hollowbrook",
        "A village of forty souls at the mouth of the vale.",
    );

    let mut aralyn = CharacterRecord::new("Aralyn");
    aralyn.race = "Half-elf".to_string();
    aralyn.class = "Ranger".to_string();
    aralyn.description = "Tracker hired by the village council.".to_string();

    let mut berrin = CharacterRecord::new("Berrin");
    berrin.race = "Dwarf".to_string();
    berrin.class = "Cleric".to_string();
    berrin.description = "Keeper of the roadside shrine.".to_string();

    let mut elsbeth = CharacterRecord::new("Warden Elsbeth");
    elsbeth.race = "Human".to_string();
    elsbeth.description = "The vale's missing warden.".to_string();

    let mut maer = CharacterRecord::new("Old Maer");
    maer.race = "Human".to_string();
    maer.description = "Hollowbrook's council elder; knows more than she says.".to_string();

    let mentor = Relationship::new(
        &berrin.id,
        &elsbeth.id,
        "mentor",
        "Elsbeth trained under Berrin before taking the warden post.",
    );

    state.story.threads = vec![missing_warden, failing_wards];
    state.story.beats = vec![arrival, cold_trail, first_crack];
    state.story.locations = vec![hollowbrook];
    state.characters.players = vec![aralyn, berrin];
    state.characters.npcs = vec![elsbeth, maer];
    state.characters.relationships = vec![mentor];

    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_generate_id_format() {
        let id = generate_id();
        assert!(id.len() >= 5);
        assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_generate_id_uniqueness() {
        let ids: HashSet<String> = (0..200).map(|_| generate_id()).collect();
        assert_eq!(ids.len(), 200);
    }

    #[test]
    fn test_base36() {
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "z");
        assert_eq!(base36(36), "10");
        assert_eq!(base36(36 * 36 + 1), "101");
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.autosave_interval, 30);
        assert!(settings.confirm_before_delete);
        assert!(!settings.show_hidden_beats);
    }

    #[test]
    fn test_document_uses_persisted_key_layout() {
        let doc = AppState::default().to_document();
        assert!(doc.pointer("/combat/inCombat").is_some());
        assert!(doc.pointer("/combat/activeIndex").is_some());
        assert!(doc.pointer("/settings/autosaveInterval").is_some());
        assert!(doc.pointer("/story/campaign/sessionCount").is_some());
        assert!(doc.pointer("/ui/lastSaved").is_some());
        assert_eq!(doc.pointer("/ui/panelRatios/left"), Some(&json!(0.35)));
        assert_eq!(doc.pointer("/ui/panelRatios/right"), Some(&json!(0.65)));
    }

    #[test]
    fn test_combatant_hp_keys() {
        let goblin = Combatant::new("Goblin", 12, 7, 13);
        let value = serde_json::to_value(&goblin).unwrap();
        assert_eq!(value["currentHP"], 7);
        assert_eq!(value["maxHP"], 7);
        assert_eq!(value["ac"], 13);
    }

    #[test]
    fn test_relationship_type_tag_key() {
        let rel = Relationship::new("a", "b", "rival", "");
        let value = serde_json::to_value(&rel).unwrap();
        assert_eq!(value["type"], "rival");
        assert_eq!(value["characterA"], "a");
        assert!(rel.references("a"));
        assert!(rel.references("b"));
        assert!(!rel.references("c"));
    }

    #[test]
    fn test_partial_document_deserializes_with_defaults() {
        let state: AppState =
            serde_json::from_str(r#"{"settings": {"autosaveInterval": 60}}"#).unwrap();
        assert_eq!(state.settings.autosave_interval, 60);
        assert!(state.settings.confirm_before_delete);
        assert_eq!(state.ui.active_tab, "story");
        assert!(state.story.threads.is_empty());
    }

    #[test]
    fn test_sample_campaign_references_are_consistent() {
        let seed = sample_campaign();
        assert!(!seed.story.campaign.name.is_empty());

        let thread_ids: HashSet<&str> =
            seed.story.threads.iter().map(|t| t.id.as_str()).collect();
        for beat in &seed.story.beats {
            assert!(
                thread_ids.contains(beat.thread_id.as_str()),
                "beat {} references unknown thread",
                beat.title
            );
        }

        let character_ids: HashSet<&str> = seed
            .characters
            .players
            .iter()
            .chain(seed.characters.npcs.iter())
            .map(|c| c.id.as_str())
            .collect();
        for rel in &seed.characters.relationships {
            assert!(character_ids.contains(rel.character_a.as_str()));
            assert!(character_ids.contains(rel.character_b.as_str()));
        }
    }

    #[test]
    fn test_thread_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(ThreadStatus::Resolved).unwrap(),
            serde_json::json!("resolved")
        );
    }
}
