//! Typed operations over the state store: the seam view components consume.
//!
//! [`CampaignSession`] wraps a [`StateStore`] with per-section accessors and
//! mutations so views never touch string paths for day-to-day work; the
//! generic path machinery stays underneath for the persistence and import
//! boundary.
//!
//! Referential integrity policy, applied uniformly here: creation validates
//! references (a beat needs an existing thread, a relationship two existing
//! characters) and deletion cascades (removing a thread removes its beats,
//! removing a character removes relationships naming it). The generic store
//! stays schema-agnostic and non-cascading.

use crate::document::Path;
use crate::model::{
    generate_id, CharacterRecord, Characters, CombatTracker, Combatant, Encounter, PlotThread,
    Settings, Story, StoryBeat, UiState,
};
use crate::store::{StateStore, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

const THREADS: &str = "story.threads";
const BEATS: &str = "story.beats";
const LOCATIONS: &str = "story.locations";
const PLAYERS: &str = "characters.players";
const NPCS: &str = "characters.npcs";
const RELATIONSHIPS: &str = "characters.relationships";
const INITIATIVE: &str = "combat.initiative";
const ENCOUNTERS: &str = "combat.encounters";

/// A facilitator's working session over one campaign document.
pub struct CampaignSession {
    store: StateStore,
}

impl CampaignSession {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// Load persisted state or seed the sample campaign. See
    /// [`StateStore::initialize`].
    pub fn initialize(&mut self) {
        self.store.initialize();
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Direct store access, for subscriptions and generic path writes.
    pub fn store_mut(&mut self) -> &mut StateStore {
        &mut self.store
    }

    pub fn save(&mut self) {
        self.store.save();
    }

    pub fn export(&self) -> String {
        self.store.export_json()
    }

    pub fn import(&mut self, json: &str) -> Result<(), StoreError> {
        self.store.import_json(json)
    }

    // ------------------------------------------------------------------
    // Section snapshots
    // ------------------------------------------------------------------

    pub fn ui(&self) -> UiState {
        self.section("ui")
    }

    pub fn story(&self) -> Story {
        self.section("story")
    }

    pub fn characters(&self) -> Characters {
        self.section("characters")
    }

    pub fn combat(&self) -> CombatTracker {
        self.section("combat")
    }

    pub fn settings(&self) -> Settings {
        self.section("settings")
    }

    /// Deserialize one top-level section. A section whose shape has drifted
    /// (a hand-edited or badly imported document) falls back to defaults
    /// rather than failing the read.
    fn section<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        match self.store.state_at(&Path::parse(name)) {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|error| {
                warn!(section = name, %error, "state section failed to deserialize; using defaults");
                T::default()
            }),
            None => T::default(),
        }
    }

    // ------------------------------------------------------------------
    // Story
    // ------------------------------------------------------------------

    pub fn add_thread(
        &mut self,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<String, StoreError> {
        let thread = PlotThread::new(title, description);
        self.store.add_item(&Path::parse(THREADS), encode(&thread)?)
    }

    pub fn update_thread(&mut self, id: &str, updates: Value) -> bool {
        self.store.update_item(&Path::parse(THREADS), id, updates)
    }

    /// Remove a thread and every beat belonging to it.
    pub fn remove_thread(&mut self, id: &str) -> bool {
        if !self.store.remove_item(&Path::parse(THREADS), id) {
            return false;
        }
        self.retain_items(BEATS, |item| item["threadId"] != json!(id));
        true
    }

    /// Add a beat to an existing thread, ordered after the thread's current
    /// last beat. Beats start hidden.
    pub fn add_beat(
        &mut self,
        thread_id: &str,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<String, StoreError> {
        let story = self.story();
        if !story.threads.iter().any(|thread| thread.id == thread_id) {
            return Err(StoreError::UnknownId(thread_id.to_string()));
        }
        let order = story
            .beats
            .iter()
            .filter(|beat| beat.thread_id == thread_id)
            .map(|beat| beat.order)
            .max()
            .map_or(1, |max| max + 1);

        let beat = StoryBeat::new(thread_id, title, content, order);
        self.store.add_item(&Path::parse(BEATS), encode(&beat)?)
    }

    pub fn update_beat(&mut self, id: &str, updates: Value) -> bool {
        self.store.update_item(&Path::parse(BEATS), id, updates)
    }

    /// Flip a beat between facilitator-only and revealed at the table.
    pub fn set_beat_revealed(&mut self, id: &str, revealed: bool) -> bool {
        self.update_beat(id, json!({ "revealed": revealed }))
    }

    pub fn set_beat_order(&mut self, id: &str, order: u32) -> bool {
        self.update_beat(id, json!({ "order": order }))
    }

    pub fn remove_beat(&mut self, id: &str) -> bool {
        self.store.remove_item(&Path::parse(BEATS), id)
    }

    pub fn add_location(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<String, StoreError> {
        let location = crate::model::Location::new(name, description);
        self.store
            .add_item(&Path::parse(LOCATIONS), encode(&location)?)
    }

    pub fn update_location(&mut self, id: &str, updates: Value) -> bool {
        self.store.update_item(&Path::parse(LOCATIONS), id, updates)
    }

    pub fn remove_location(&mut self, id: &str) -> bool {
        self.store.remove_item(&Path::parse(LOCATIONS), id)
    }

    /// Bump the session counter at the end of a play session. Returns the
    /// new count.
    pub fn advance_session(&mut self) -> u32 {
        let path = Path::parse("story.campaign.sessionCount");
        let next = self.store.state_as::<u32>(&path).unwrap_or(0) + 1;
        self.store.set_value(&path, json!(next));
        next
    }

    // ------------------------------------------------------------------
    // Characters
    // ------------------------------------------------------------------

    pub fn add_player(&mut self, record: CharacterRecord) -> Result<String, StoreError> {
        self.store.add_item(&Path::parse(PLAYERS), encode(&record)?)
    }

    pub fn add_npc(&mut self, record: CharacterRecord) -> Result<String, StoreError> {
        self.store.add_item(&Path::parse(NPCS), encode(&record)?)
    }

    pub fn update_player(&mut self, id: &str, updates: Value) -> bool {
        self.store.update_item(&Path::parse(PLAYERS), id, updates)
    }

    pub fn update_npc(&mut self, id: &str, updates: Value) -> bool {
        self.store.update_item(&Path::parse(NPCS), id, updates)
    }

    /// Remove a character from either roster, cascading to relationships
    /// that reference it.
    pub fn remove_character(&mut self, id: &str) -> bool {
        let removed = self.store.remove_item(&Path::parse(PLAYERS), id)
            || self.store.remove_item(&Path::parse(NPCS), id);
        if !removed {
            return false;
        }
        self.retain_items(RELATIONSHIPS, |item| {
            item["characterA"] != json!(id) && item["characterB"] != json!(id)
        });
        true
    }

    /// Relate two existing characters. Both endpoints are validated against
    /// the rosters.
    pub fn add_relationship(
        &mut self,
        character_a: &str,
        character_b: &str,
        kind: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<String, StoreError> {
        let characters = self.characters();
        for id in [character_a, character_b] {
            let known = characters
                .players
                .iter()
                .chain(characters.npcs.iter())
                .any(|character| character.id == id);
            if !known {
                return Err(StoreError::UnknownId(id.to_string()));
            }
        }
        let relationship =
            crate::model::Relationship::new(character_a, character_b, kind, description);
        self.store
            .add_item(&Path::parse(RELATIONSHIPS), encode(&relationship)?)
    }

    pub fn remove_relationship(&mut self, id: &str) -> bool {
        self.store.remove_item(&Path::parse(RELATIONSHIPS), id)
    }

    // ------------------------------------------------------------------
    // Combat
    // ------------------------------------------------------------------

    /// Begin an encounter: initiative sorted descending, round 1, first
    /// combatant active. An empty roster is rejected, leaving combat off:
    /// `activeIndex` must stay within the initiative list whenever
    /// `inCombat` is set.
    pub fn start_combat(&mut self, combatants: Vec<Combatant>) -> Result<(), StoreError> {
        if combatants.is_empty() {
            return Err(StoreError::EmptyRoster);
        }
        let mut roster = combatants;
        for combatant in &mut roster {
            if combatant.id.is_empty() {
                combatant.id = generate_id();
            }
        }
        roster.sort_by(|a, b| b.initiative.cmp(&a.initiative));

        self.store.batch_update(vec![
            (Path::parse("combat.inCombat"), json!(true)),
            (Path::parse("combat.round"), json!(1)),
            (Path::parse("combat.activeIndex"), json!(0)),
            (Path::parse(INITIATIVE), encode(&roster)?),
        ]);
        Ok(())
    }

    /// End the encounter. The initiative roster is kept for review until the
    /// next start or load.
    pub fn end_combat(&mut self) {
        self.store.batch_update(vec![
            (Path::parse("combat.inCombat"), json!(false)),
            (Path::parse("combat.round"), json!(0)),
            (Path::parse("combat.activeIndex"), json!(0)),
        ]);
    }

    /// Insert a combatant in initiative order. Mid-combat the currently
    /// active combatant keeps its turn.
    pub fn add_combatant(&mut self, combatant: Combatant) -> Result<String, StoreError> {
        let mut combatant = combatant;
        if combatant.id.is_empty() {
            combatant.id = generate_id();
        }
        let id = combatant.id.clone();

        let mut combat = self.combat();
        let active_id = combat
            .initiative
            .get(combat.active_index)
            .map(|active| active.id.clone());

        combat.initiative.push(combatant);
        combat
            .initiative
            .sort_by(|a, b| b.initiative.cmp(&a.initiative));

        let active_index = match active_id {
            Some(active_id) if combat.in_combat => combat
                .initiative
                .iter()
                .position(|c| c.id == active_id)
                .unwrap_or(0),
            _ => 0,
        };

        self.store.batch_update(vec![
            (Path::parse(INITIATIVE), encode(&combat.initiative)?),
            (Path::parse("combat.activeIndex"), json!(active_index)),
        ]);
        Ok(id)
    }

    /// Remove a combatant, repairing `activeIndex` so it stays in bounds.
    /// Removing the last combatant ends the encounter.
    pub fn remove_combatant(&mut self, id: &str) -> bool {
        let combat = self.combat();
        let Some(removed_index) = combat.initiative.iter().position(|c| c.id == id) else {
            return false;
        };

        let mut initiative = combat.initiative;
        initiative.remove(removed_index);

        if initiative.is_empty() {
            self.store.batch_update(vec![
                (Path::parse(INITIATIVE), json!([])),
                (Path::parse("combat.inCombat"), json!(false)),
                (Path::parse("combat.round"), json!(0)),
                (Path::parse("combat.activeIndex"), json!(0)),
            ]);
            return true;
        }

        let mut active_index = combat.active_index;
        if removed_index < active_index {
            active_index -= 1;
        }
        if active_index >= initiative.len() {
            active_index = 0;
        }

        let Ok(roster) = encode(&initiative) else {
            return false;
        };
        self.store.batch_update(vec![
            (Path::parse(INITIATIVE), roster),
            (Path::parse("combat.activeIndex"), json!(active_index)),
        ]);
        true
    }

    /// Advance to the next combatant; wrapping past the end starts a new
    /// round. Returns the combatant whose turn begins.
    pub fn next_turn(&mut self) -> Option<Combatant> {
        let combat = self.combat();
        if !combat.in_combat || combat.initiative.is_empty() {
            return None;
        }

        let mut next_index = combat.active_index + 1;
        let mut updates = Vec::new();
        if next_index >= combat.initiative.len() {
            next_index = 0;
            updates.push((Path::parse("combat.round"), json!(combat.round + 1)));
        }
        updates.push((Path::parse("combat.activeIndex"), json!(next_index)));
        self.store.batch_update(updates);

        combat.initiative.get(next_index).cloned()
    }

    /// The combatant whose turn it is, while in combat.
    pub fn active_combatant(&self) -> Option<Combatant> {
        let combat = self.combat();
        if !combat.in_combat {
            return None;
        }
        combat.initiative.get(combat.active_index).cloned()
    }

    /// Set a combatant's current HP, clamped to `0..=maxHP`.
    pub fn set_combatant_hp(&mut self, id: &str, hp: i32) -> bool {
        let combat = self.combat();
        let Some(combatant) = combat.initiative.iter().find(|c| c.id == id) else {
            return false;
        };
        // maxHP can arrive negative through imported documents or raw
        // update_item writes; treat anything below zero as zero.
        let clamped = hp.clamp(0, combatant.max_hp.max(0));
        self.store
            .update_item(&Path::parse(INITIATIVE), id, json!({ "currentHP": clamped }))
    }

    /// Add a condition to a combatant. Adding one it already has is a no-op
    /// success.
    pub fn add_condition(&mut self, id: &str, condition: &str) -> bool {
        let combat = self.combat();
        let Some(combatant) = combat.initiative.iter().find(|c| c.id == id) else {
            return false;
        };
        if combatant.conditions.iter().any(|c| c == condition) {
            return true;
        }
        let mut conditions = combatant.conditions.clone();
        conditions.push(condition.to_string());
        self.store
            .update_item(&Path::parse(INITIATIVE), id, json!({ "conditions": conditions }))
    }

    pub fn remove_condition(&mut self, id: &str, condition: &str) -> bool {
        let combat = self.combat();
        let Some(combatant) = combat.initiative.iter().find(|c| c.id == id) else {
            return false;
        };
        let conditions: Vec<String> = combatant
            .conditions
            .iter()
            .filter(|c| *c != condition)
            .cloned()
            .collect();
        if conditions.len() == combatant.conditions.len() {
            return false;
        }
        self.store
            .update_item(&Path::parse(INITIATIVE), id, json!({ "conditions": conditions }))
    }

    /// Save the current initiative roster as a reusable encounter template.
    pub fn save_encounter(&mut self, name: impl Into<String>) -> Result<String, StoreError> {
        let encounter = Encounter {
            id: generate_id(),
            name: name.into(),
            combatants: self.combat().initiative,
        };
        self.store
            .add_item(&Path::parse(ENCOUNTERS), encode(&encounter)?)
    }

    /// Load an encounter template into the tracker, replacing the roster.
    /// Any running combat ends.
    pub fn load_encounter(&mut self, id: &str) -> bool {
        let combat = self.combat();
        let Some(encounter) = combat.encounters.iter().find(|e| e.id == id) else {
            return false;
        };
        let Ok(roster) = encode(&encounter.combatants) else {
            return false;
        };
        self.store.batch_update(vec![
            (Path::parse(INITIATIVE), roster),
            (Path::parse("combat.inCombat"), json!(false)),
            (Path::parse("combat.round"), json!(0)),
            (Path::parse("combat.activeIndex"), json!(0)),
        ]);
        true
    }

    pub fn remove_encounter(&mut self, id: &str) -> bool {
        self.store.remove_item(&Path::parse(ENCOUNTERS), id)
    }

    // ------------------------------------------------------------------
    // Ui / settings
    // ------------------------------------------------------------------

    pub fn set_active_tab(&mut self, tab: &str) {
        self.store.set_value(&Path::parse("ui.activeTab"), json!(tab));
    }

    /// Toggle focus mode and return the new value.
    pub fn toggle_focus_mode(&mut self) -> bool {
        let path = Path::parse("ui.focusMode");
        let next = !self.store.state_as::<bool>(&path).unwrap_or(false);
        self.store.set_value(&path, json!(next));
        next
    }

    /// Shallow-merge a partial settings object over the current settings.
    pub fn update_settings(&mut self, updates: Value) -> bool {
        let Value::Object(updates) = updates else {
            return false;
        };
        let mut settings = match self.store.state_at(&Path::parse("settings")) {
            Some(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        for (key, value) in updates {
            settings.insert(key, value);
        }
        self.store
            .set_value(&Path::parse("settings"), Value::Object(settings));
        true
    }

    // ------------------------------------------------------------------

    /// Keep only the items of the array at `path` matching the predicate;
    /// writes back only when something was dropped.
    fn retain_items(&mut self, path: &str, keep: impl Fn(&Value) -> bool) {
        let path = Path::parse(path);
        let Some(Value::Array(items)) = self.store.state_at(&path) else {
            return;
        };
        let before = items.len();
        let kept: Vec<Value> = items.into_iter().filter(|item| keep(item)).collect();
        if kept.len() < before {
            self.store.set_value(&path, Value::Array(kept));
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(StoreError::Serialize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryStorage;

    fn session() -> CampaignSession {
        CampaignSession::new(StateStore::new(MemoryStorage::new()))
    }

    fn seeded_session() -> CampaignSession {
        let mut session = session();
        session.initialize();
        session
    }

    fn goblin(initiative: i32) -> Combatant {
        Combatant::new("Goblin", initiative, 7, 13)
    }

    #[test]
    fn test_seed_sections_deserialize() {
        let session = seeded_session();
        let story = session.story();
        assert_eq!(story.campaign.name, "The Shattered Vale");
        assert_eq!(story.threads.len(), 2);
        assert_eq!(story.beats.len(), 3);
        assert_eq!(session.characters().players.len(), 2);
        assert!(!session.combat().in_combat);
    }

    #[test]
    fn test_add_beat_orders_within_thread() {
        let mut session = session();
        let thread = session.add_thread("The Wards", "").expect("thread");
        let other = session.add_thread("The Warden", "").expect("thread");

        session.add_beat(&thread, "First", "").expect("beat");
        session.add_beat(&thread, "Second", "").expect("beat");
        session.add_beat(&other, "Elsewhere", "").expect("beat");

        let orders: Vec<u32> = session
            .story()
            .beats
            .iter()
            .filter(|beat| beat.thread_id == thread)
            .map(|beat| beat.order)
            .collect();
        assert_eq!(orders, vec![1, 2]);
    }

    #[test]
    fn test_add_beat_requires_existing_thread() {
        let mut session = session();
        let result = session.add_beat("no-such-thread", "Orphan", "");
        assert!(matches!(result, Err(StoreError::UnknownId(_))));
        assert!(session.story().beats.is_empty());
    }

    #[test]
    fn test_remove_thread_cascades_to_beats() {
        let mut session = session();
        let doomed = session.add_thread("Doomed", "").expect("thread");
        let kept = session.add_thread("Kept", "").expect("thread");
        session.add_beat(&doomed, "Gone", "").expect("beat");
        session.add_beat(&kept, "Stays", "").expect("beat");

        assert!(session.remove_thread(&doomed));

        let story = session.story();
        assert_eq!(story.threads.len(), 1);
        assert_eq!(story.beats.len(), 1);
        assert_eq!(story.beats[0].thread_id, kept);
    }

    #[test]
    fn test_reveal_beat() {
        let mut session = session();
        let thread = session.add_thread("T", "").expect("thread");
        let beat = session.add_beat(&thread, "B", "").expect("beat");

        assert!(!session.story().beats[0].revealed);
        assert!(session.set_beat_revealed(&beat, true));
        assert!(session.story().beats[0].revealed);
    }

    #[test]
    fn test_relationship_endpoints_validated() {
        let mut session = session();
        let a = session.add_player(CharacterRecord::new("Aralyn")).expect("player");

        let result = session.add_relationship(&a, "ghost", "ally", "");
        assert!(matches!(result, Err(StoreError::UnknownId(_))));

        let b = session.add_npc(CharacterRecord::new("Maer")).expect("npc");
        session
            .add_relationship(&a, &b, "ally", "travelling together")
            .expect("relationship");
        assert_eq!(session.characters().relationships.len(), 1);
    }

    #[test]
    fn test_remove_character_cascades_to_relationships() {
        let mut session = session();
        let a = session.add_player(CharacterRecord::new("Aralyn")).expect("player");
        let b = session.add_npc(CharacterRecord::new("Maer")).expect("npc");
        let c = session.add_npc(CharacterRecord::new("Elsbeth")).expect("npc");
        session.add_relationship(&a, &b, "ally", "").expect("rel");
        session.add_relationship(&b, &c, "rival", "").expect("rel");

        assert!(session.remove_character(&b));

        let characters = session.characters();
        assert_eq!(characters.npcs.len(), 1);
        assert!(characters.relationships.is_empty());
        assert!(!session.remove_character(&b));
    }

    #[test]
    fn test_start_combat_sorts_initiative() {
        let mut session = session();
        session
            .start_combat(vec![goblin(8), Combatant::new("Aralyn", 17, 21, 15).player(), goblin(12)])
            .expect("start");

        let combat = session.combat();
        assert!(combat.in_combat);
        assert_eq!(combat.round, 1);
        assert_eq!(combat.active_index, 0);
        let rolls: Vec<i32> = combat.initiative.iter().map(|c| c.initiative).collect();
        assert_eq!(rolls, vec![17, 12, 8]);
        assert_eq!(session.active_combatant().unwrap().name, "Aralyn");
    }

    #[test]
    fn test_next_turn_wraps_and_increments_round() {
        let mut session = session();
        session
            .start_combat(vec![goblin(12), goblin(8)])
            .expect("start");

        assert!(session.next_turn().is_some());
        assert_eq!(session.combat().active_index, 1);

        session.next_turn();
        let combat = session.combat();
        assert_eq!(combat.active_index, 0);
        assert_eq!(combat.round, 2);
    }

    #[test]
    fn test_next_turn_outside_combat_is_none() {
        let mut session = session();
        assert!(session.next_turn().is_none());
        assert!(session.active_combatant().is_none());
    }

    #[test]
    fn test_add_combatant_mid_combat_keeps_active_turn() {
        let mut session = session();
        session
            .start_combat(vec![goblin(12), goblin(8)])
            .expect("start");
        session.next_turn();
        let active_before = session.active_combatant().unwrap().id;

        // Higher roll slots in above the active combatant.
        session
            .add_combatant(Combatant::new("Ogre", 15, 30, 11))
            .expect("add");

        let combat = session.combat();
        assert_eq!(combat.initiative.len(), 3);
        assert_eq!(combat.initiative[combat.active_index].id, active_before);
    }

    #[test]
    fn test_remove_combatant_repairs_active_index() {
        let mut session = session();
        session
            .start_combat(vec![goblin(12), goblin(8), goblin(4)])
            .expect("start");
        session.next_turn(); // active_index 1
        let combat = session.combat();
        let first = combat.initiative[0].id.clone();
        let last = combat.initiative[2].id.clone();

        // Removing someone before the active combatant shifts it down.
        assert!(session.remove_combatant(&first));
        assert_eq!(session.combat().active_index, 0);

        // Removing the trailing active combatant wraps to the top.
        session.next_turn(); // active_index 1 (the last combatant)
        assert!(session.remove_combatant(&last));
        assert_eq!(session.combat().active_index, 0);
    }

    #[test]
    fn test_removing_last_combatant_ends_combat() {
        let mut session = session();
        session.start_combat(vec![goblin(12)]).expect("start");
        let id = session.combat().initiative[0].id.clone();

        assert!(session.remove_combatant(&id));
        let combat = session.combat();
        assert!(!combat.in_combat);
        assert!(combat.initiative.is_empty());
        assert_eq!(combat.active_index, 0);
    }

    #[test]
    fn test_set_combatant_hp_clamps() {
        let mut session = session();
        session.start_combat(vec![goblin(12)]).expect("start");
        let id = session.combat().initiative[0].id.clone();

        assert!(session.set_combatant_hp(&id, -5));
        assert_eq!(session.combat().initiative[0].current_hp, 0);

        assert!(session.set_combatant_hp(&id, 99));
        assert_eq!(session.combat().initiative[0].current_hp, 7);

        assert!(!session.set_combatant_hp("missing", 3));
    }

    #[test]
    fn test_set_combatant_hp_tolerates_negative_max() {
        let mut session = session();
        // A negative max can arrive through imports or raw item updates.
        session
            .start_combat(vec![Combatant::new("Wisp", 10, -5, 10)])
            .expect("start");
        let id = session.combat().initiative[0].id.clone();

        assert!(session.set_combatant_hp(&id, 3));
        assert_eq!(session.combat().initiative[0].current_hp, 0);
    }

    #[test]
    fn test_start_combat_rejects_empty_roster() {
        let mut session = session();
        let result = session.start_combat(Vec::new());
        assert!(matches!(result, Err(StoreError::EmptyRoster)));

        let combat = session.combat();
        assert!(!combat.in_combat);
        assert_eq!(combat.round, 0);
        assert_eq!(combat.active_index, 0);
        assert!(combat.initiative.is_empty());
    }

    #[test]
    fn test_conditions_deduplicate() {
        let mut session = session();
        session.start_combat(vec![goblin(12)]).expect("start");
        let id = session.combat().initiative[0].id.clone();

        assert!(session.add_condition(&id, "prone"));
        assert!(session.add_condition(&id, "prone"));
        assert_eq!(session.combat().initiative[0].conditions, vec!["prone"]);

        assert!(session.remove_condition(&id, "prone"));
        assert!(!session.remove_condition(&id, "prone"));
        assert!(session.combat().initiative[0].conditions.is_empty());
    }

    #[test]
    fn test_encounter_template_round_trip() {
        let mut session = session();
        session
            .start_combat(vec![goblin(12), goblin(8)])
            .expect("start");
        let encounter = session.save_encounter("Goblin ambush").expect("save");
        session.end_combat();
        let survivor = session.combat().initiative[0].id.clone();
        session.remove_combatant(&survivor);

        assert!(session.load_encounter(&encounter));
        let combat = session.combat();
        assert_eq!(combat.initiative.len(), 2);
        assert!(!combat.in_combat);
        assert_eq!(combat.active_index, 0);

        assert!(!session.load_encounter("missing"));
        assert!(session.remove_encounter(&encounter));
    }

    #[test]
    fn test_advance_session_counter() {
        let mut session = seeded_session();
        assert_eq!(session.advance_session(), 2);
        assert_eq!(session.advance_session(), 3);
        assert_eq!(session.story().campaign.session_count, 3);
    }

    #[test]
    fn test_ui_toggles() {
        let mut session = session();
        session.set_active_tab("combat");
        assert_eq!(session.ui().active_tab, "combat");

        assert!(session.toggle_focus_mode());
        assert!(session.ui().focus_mode);
        assert!(!session.toggle_focus_mode());
    }

    #[test]
    fn test_update_settings_merges() {
        let mut session = session();
        assert!(session.update_settings(json!({"autosaveInterval": 60})));

        let settings = session.settings();
        assert_eq!(settings.autosave_interval, 60);
        assert!(settings.confirm_before_delete);

        assert!(!session.update_settings(json!("not an object")));
    }

    #[test]
    fn test_drifted_section_falls_back_to_default() {
        let mut session = session();
        session
            .store_mut()
            .set_value(&Path::parse("story"), json!("scribbles"));
        assert_eq!(session.story(), Story::default());
    }
}
