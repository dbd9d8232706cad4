//! Intermediate records passed between pipeline stages.
//!
//! Raw documents keep their `serde_json::Value` shape because the PokéAPI
//! owns their structure; the transformer validates them field by field and
//! produces the normalized types below. Normalized records are immutable
//! after creation and consumed exactly once by the loader.

use serde::Serialize;
use serde_json::Value;

/// One entry from the paginated listing endpoint, with the ID parsed from
/// the trailing path segment of the resource URL.
#[derive(Debug, Clone)]
pub struct PokemonListEntry {
    pub id: i32,
    pub name: String,
}

/// A move detail document paired with the learn history the Pokémon document
/// carried for it.
#[derive(Debug, Clone)]
pub struct RawMoveEntry {
    pub detail: Value,
    pub learn_details: Vec<Value>,
}

/// Everything fetched for one Pokémon: the primary document, the species
/// document, the evolution chain it references, and move details.
/// Produced by the extractor, consumed once by the transformer.
#[derive(Debug, Clone)]
pub struct RawPokemonPayload {
    pub pokemon: Value,
    pub species: Value,
    pub evolution_chain: Value,
    pub moves: Vec<RawMoveEntry>,
}

/// The six canonical base stats. Missing stats default to 0 during
/// transformation; that default never applies to other numeric fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BaseStats {
    pub hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub special_attack: i32,
    pub special_defense: i32,
    pub speed: i32,
}

/// A type reference with its slot order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeSlot {
    pub name: String,
    pub slot: i32,
}

/// An ability reference with its slot order and hidden flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbilitySlot {
    pub name: String,
    pub slot: i32,
    pub is_hidden: bool,
}

/// Validated, flattened Pokémon record. `pokedex_id` is the natural key for
/// all upsert matching. Type and ability lists are sorted by slot ascending.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedPokemon {
    pub pokedex_id: i32,
    pub name: String,
    pub height: i32,
    pub weight: i32,
    /// `None` when absent upstream; never defaulted to 0.
    pub base_experience: Option<i32>,
    pub stats: BaseStats,
    pub sprite_front_default: String,
    pub sprite_front_shiny: String,
    pub types: Vec<TypeSlot>,
    pub abilities: Vec<AbilitySlot>,
}

/// Evolution chain identity plus its opaque tree payload. Chains are shared
/// between Pokémon and upserted before the Pokémon that reference them.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedEvolutionChain {
    pub chain_id: i32,
    pub chain_data: Value,
}

/// One-to-one species extension of a Pokémon.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedSpecies {
    pub genus: String,
    pub generation: i32,
    pub gender_rate: i32,
    pub egg_groups: Vec<String>,
    pub base_happiness: Option<i32>,
    pub capture_rate: i32,
    pub is_legendary: bool,
    pub is_mythical: bool,
}

/// Normalized move definition, globally unique by name in the store.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedMove {
    pub name: String,
    pub power: Option<i32>,
    pub pp: Option<i32>,
    pub accuracy: Option<i32>,
    pub move_type: String,
    pub damage_class: String,
    pub description: String,
}

/// How a Pokémon learns a move. The effective learn details come from the
/// last entry of the upstream history list (latest version wins).
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedLearnedMove {
    pub move_data: NormalizedMove,
    pub learn_method: String,
    pub level_learned: Option<i32>,
    pub version_group: String,
}

/// Full normalized output for one Pokémon, handed to the loader as a unit.
#[derive(Debug, Clone, Serialize)]
pub struct PokemonBundle {
    pub pokemon: NormalizedPokemon,
    pub species: NormalizedSpecies,
    pub evolution_chain: NormalizedEvolutionChain,
    pub moves: Vec<NormalizedLearnedMove>,
}
