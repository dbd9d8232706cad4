//! Row types for the Pokédex schema, used by queries and tests.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Pokemon {
    pub id: i32,
    pub pokedex_id: i32,
    pub name: String,
    pub height: i32,
    pub weight: i32,
    pub base_experience: Option<i32>,
    pub hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub special_attack: i32,
    pub special_defense: i32,
    pub speed: i32,
    pub sprite_front_default: String,
    pub sprite_front_shiny: String,
    pub evolution_chain_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EvolutionChain {
    pub id: i32,
    pub chain_id: i32,
    pub chain_data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PokemonSpecies {
    pub id: i32,
    pub pokemon_id: i32,
    pub genus: String,
    pub generation: i32,
    pub gender_rate: i32,
    pub egg_groups: Vec<String>,
    pub base_happiness: Option<i32>,
    pub capture_rate: i32,
    pub is_legendary: bool,
    pub is_mythical: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Type {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Ability {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Move {
    pub id: i32,
    pub name: String,
    pub power: Option<i32>,
    pub pp: Option<i32>,
    pub accuracy: Option<i32>,
    pub type_id: i32,
    pub damage_class: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PokemonMove {
    pub id: i32,
    pub pokemon_id: i32,
    pub move_id: i32,
    pub learn_method: String,
    pub level_learned: Option<i32>,
    pub version_group: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
