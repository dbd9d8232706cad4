//! Pure transformation from raw PokéAPI documents to normalized records.
//!
//! No I/O happens here. Every rule is schema-first: a fixed table of
//! required fields per document section, hard failures for anything
//! required that is absent or mistyped, and documented soft defaults for
//! the cases that warrant them (missing stats default to 0, malformed URLs
//! are blanked, malformed individual move entries are skipped).

use crate::error::ValidationError;
use crate::etl::extractor::extract_trailing_id;
use crate::etl::records::{
    AbilitySlot, BaseStats, NormalizedEvolutionChain, NormalizedLearnedMove, NormalizedMove,
    NormalizedPokemon, NormalizedSpecies, PokemonBundle, RawMoveEntry, RawPokemonPayload, TypeSlot,
};
use serde_json::Value;

/// The six canonical stats, as named by the API.
const REQUIRED_STATS: [&str; 6] = [
    "hp",
    "attack",
    "defense",
    "special-attack",
    "special-defense",
    "speed",
];

/// Localized text fields are selected by this language tag.
const TARGET_LANGUAGE: &str = "en";

/// Transform one raw payload into a normalized bundle.
///
/// Fails with a field-tagged [`ValidationError`] on the first hard
/// violation; the input is never mutated.
pub fn transform_payload(raw: &RawPokemonPayload) -> Result<PokemonBundle, ValidationError> {
    let pokemon = transform_pokemon(&raw.pokemon)?;
    let species = transform_species(&raw.species)?;
    let evolution_chain = transform_evolution_chain(&raw.evolution_chain)?;
    let moves = transform_moves(&raw.moves);

    log::info!("transformed data for pokemon {}", pokemon.name);

    Ok(PokemonBundle {
        pokemon,
        species,
        evolution_chain,
        moves,
    })
}

fn transform_pokemon(data: &Value) -> Result<NormalizedPokemon, ValidationError> {
    if !data.is_object() {
        return Err(ValidationError::new("pokemon", "document is not an object"));
    }

    // Required fields with expected primitive types.
    let pokedex_id = require_i32(data, "pokemon", "id")?;
    let name = require_str(data, "pokemon", "name")?.to_lowercase();
    let height = require_i32(data, "pokemon", "height")?;
    let weight = require_i32(data, "pokemon", "weight")?;
    let stat_entries = require_array(data, "pokemon", "stats")?;

    let stats = transform_stats(stat_entries, &name);

    Ok(NormalizedPokemon {
        pokedex_id,
        name,
        height,
        weight,
        base_experience: optional_i32(data, "base_experience"),
        stats,
        sprite_front_default: validate_url(data.pointer("/sprites/front_default")),
        sprite_front_shiny: validate_url(data.pointer("/sprites/front_shiny")),
        types: transform_types(data.get("types")),
        abilities: transform_abilities(data.get("abilities")),
    })
}

/// Collect the six canonical stats. Missing stats default to 0 with a
/// warning; this is the only place a missing numeric field becomes 0.
fn transform_stats(entries: &[Value], pokemon_name: &str) -> BaseStats {
    let mut stats = BaseStats::default();
    let mut seen = [false; REQUIRED_STATS.len()];

    for entry in entries {
        let name = entry.pointer("/stat/name").and_then(Value::as_str);
        let base = entry.get("base_stat").and_then(Value::as_i64);
        let (Some(name), Some(base)) = (name, base) else {
            continue;
        };
        if let Some(index) = REQUIRED_STATS.iter().position(|stat| *stat == name) {
            seen[index] = true;
            let base = base as i32;
            match name {
                "hp" => stats.hp = base,
                "attack" => stats.attack = base,
                "defense" => stats.defense = base,
                "special-attack" => stats.special_attack = base,
                "special-defense" => stats.special_defense = base,
                "speed" => stats.speed = base,
                _ => {}
            }
        }
    }

    let missing: Vec<&str> = REQUIRED_STATS
        .iter()
        .zip(seen)
        .filter(|(_, seen)| !seen)
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        log::warn!(
            "missing stats for {}: {:?}; defaulting to 0",
            pokemon_name,
            missing
        );
    }

    stats
}

/// Type sub-records sorted by slot ascending. The sort is stable, so entries
/// sharing a slot keep their original relative order. Malformed entries are
/// skipped with a warning.
fn transform_types(data: Option<&Value>) -> Vec<TypeSlot> {
    let mut types = Vec::new();
    for entry in data.and_then(Value::as_array).into_iter().flatten() {
        let name = entry.pointer("/type/name").and_then(Value::as_str);
        let slot = entry.get("slot").and_then(Value::as_i64);
        match (name, slot) {
            (Some(name), Some(slot)) => types.push(TypeSlot {
                name: name.to_string(),
                slot: slot as i32,
            }),
            _ => log::warn!("skipping malformed type entry: {}", entry),
        }
    }
    types.sort_by_key(|t| t.slot);
    types
}

fn transform_abilities(data: Option<&Value>) -> Vec<AbilitySlot> {
    let mut abilities = Vec::new();
    for entry in data.and_then(Value::as_array).into_iter().flatten() {
        let name = entry.pointer("/ability/name").and_then(Value::as_str);
        let slot = entry.get("slot").and_then(Value::as_i64);
        let is_hidden = entry.get("is_hidden").and_then(Value::as_bool);
        match (name, slot, is_hidden) {
            (Some(name), Some(slot), Some(is_hidden)) => abilities.push(AbilitySlot {
                name: name.to_string(),
                slot: slot as i32,
                is_hidden,
            }),
            _ => log::warn!("skipping malformed ability entry: {}", entry),
        }
    }
    abilities.sort_by_key(|a| a.slot);
    abilities
}

fn transform_species(data: &Value) -> Result<NormalizedSpecies, ValidationError> {
    if !data.is_object() {
        return Err(ValidationError::new("species", "document is not an object"));
    }

    let generation_url = data
        .pointer("/generation/url")
        .and_then(Value::as_str)
        .ok_or_else(|| ValidationError::new("species", "missing required field: generation"))?;
    let generation = extract_trailing_id(generation_url).ok_or_else(|| {
        ValidationError::new(
            "species",
            format!("malformed generation url: {generation_url}"),
        )
    })?;

    let egg_groups = data
        .get("egg_groups")
        .and_then(Value::as_array)
        .map(|groups| {
            groups
                .iter()
                .filter_map(|group| group.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(NormalizedSpecies {
        genus: english_text(data.get("genera"), "genus"),
        generation,
        gender_rate: require_i32(data, "species", "gender_rate")?,
        egg_groups,
        base_happiness: optional_i32(data, "base_happiness"),
        capture_rate: require_i32(data, "species", "capture_rate")?,
        is_legendary: require_bool(data, "species", "is_legendary")?,
        is_mythical: require_bool(data, "species", "is_mythical")?,
    })
}

fn transform_evolution_chain(data: &Value) -> Result<NormalizedEvolutionChain, ValidationError> {
    let chain_id = require_i32(data, "evolution_chain", "id")?;
    let chain_data = data
        .get("chain")
        .cloned()
        .ok_or_else(|| ValidationError::new("evolution_chain", "missing required field: chain"))?;

    Ok(NormalizedEvolutionChain {
        chain_id,
        chain_data,
    })
}

/// Per-entry failures are skipped with a warning; they never fail the whole
/// transform.
fn transform_moves(entries: &[RawMoveEntry]) -> Vec<NormalizedLearnedMove> {
    entries
        .iter()
        .filter_map(|entry| match transform_move_entry(entry) {
            Ok(learned) => Some(learned),
            Err(err) => {
                log::warn!("skipping malformed move entry: {}", err);
                None
            }
        })
        .collect()
}

fn transform_move_entry(entry: &RawMoveEntry) -> Result<NormalizedLearnedMove, ValidationError> {
    let detail = &entry.detail;

    let name = require_str(detail, "move", "name")?.to_string();
    let move_type = detail
        .pointer("/type/name")
        .and_then(Value::as_str)
        .ok_or_else(|| ValidationError::new("move", "missing required field: type"))?
        .to_string();
    let damage_class = detail
        .pointer("/damage_class/name")
        .and_then(Value::as_str)
        .ok_or_else(|| ValidationError::new("move", "missing required field: damage_class"))?
        .to_string();

    // The last history entry is treated as the effective one. This assumes
    // the upstream orders version_group_details oldest to newest.
    let learn = entry
        .learn_details
        .last()
        .ok_or_else(|| ValidationError::new("move", "empty learn history"))?;
    let learn_method = learn
        .pointer("/move_learn_method/name")
        .and_then(Value::as_str)
        .ok_or_else(|| ValidationError::new("move", "missing required field: move_learn_method"))?
        .to_string();
    let version_group = learn
        .pointer("/version_group/name")
        .and_then(Value::as_str)
        .ok_or_else(|| ValidationError::new("move", "missing required field: version_group"))?
        .to_string();

    Ok(NormalizedLearnedMove {
        move_data: NormalizedMove {
            name,
            power: optional_i32(detail, "power"),
            pp: optional_i32(detail, "pp"),
            accuracy: optional_i32(detail, "accuracy"),
            move_type,
            damage_class,
            description: english_text(detail.get("flavor_text_entries"), "flavor_text"),
        },
        learn_method,
        level_learned: optional_i32(learn, "level_learned_at"),
        version_group,
    })
}

/// First entry matching the target language, else empty string.
fn english_text(entries: Option<&Value>, field: &str) -> String {
    entries
        .and_then(Value::as_array)
        .and_then(|entries| {
            entries.iter().find(|entry| {
                entry.pointer("/language/name").and_then(Value::as_str) == Some(TARGET_LANGUAGE)
            })
        })
        .and_then(|entry| entry.get(field))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// URLs must carry an http(s) scheme. Anything else is blanked with a
/// warning; a bad URL never fails the transform.
fn validate_url(value: Option<&Value>) -> String {
    match value.and_then(Value::as_str) {
        Some(url) if url.is_empty() || url.starts_with("http://") || url.starts_with("https://") => {
            url.to_string()
        }
        Some(url) => {
            log::warn!("invalid url format: {}", url);
            String::new()
        }
        None => String::new(),
    }
}

fn require_i32(data: &Value, section: &'static str, key: &str) -> Result<i32, ValidationError> {
    let value = data
        .get(key)
        .ok_or_else(|| ValidationError::new(section, format!("missing required field: {key}")))?;
    value
        .as_i64()
        .map(|v| v as i32)
        .ok_or_else(|| ValidationError::new(section, format!("invalid type for {key}: expected integer")))
}

fn require_str<'a>(
    data: &'a Value,
    section: &'static str,
    key: &str,
) -> Result<&'a str, ValidationError> {
    let value = data
        .get(key)
        .ok_or_else(|| ValidationError::new(section, format!("missing required field: {key}")))?;
    value
        .as_str()
        .ok_or_else(|| ValidationError::new(section, format!("invalid type for {key}: expected string")))
}

fn require_bool(data: &Value, section: &'static str, key: &str) -> Result<bool, ValidationError> {
    let value = data
        .get(key)
        .ok_or_else(|| ValidationError::new(section, format!("missing required field: {key}")))?;
    value
        .as_bool()
        .ok_or_else(|| ValidationError::new(section, format!("invalid type for {key}: expected boolean")))
}

fn require_array<'a>(
    data: &'a Value,
    section: &'static str,
    key: &str,
) -> Result<&'a [Value], ValidationError> {
    let value = data
        .get(key)
        .ok_or_else(|| ValidationError::new(section, format!("missing required field: {key}")))?;
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| ValidationError::new(section, format!("invalid type for {key}: expected list")))
}

/// `None` when the field is absent or not an integer. Distinct from the
/// stats default: optional numeric attributes stay null, never 0.
fn optional_i32(data: &Value, key: &str) -> Option<i32> {
    data.get(key).and_then(Value::as_i64).map(|v| v as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stat(name: &str, base: i64) -> Value {
        json!({ "stat": { "name": name }, "base_stat": base })
    }

    fn sample_pokemon() -> Value {
        json!({
            "id": 25,
            "name": "Pikachu",
            "height": 4,
            "weight": 60,
            "base_experience": 112,
            "stats": [
                stat("hp", 35),
                stat("attack", 55),
                stat("defense", 40),
                stat("special-attack", 50),
                stat("special-defense", 50),
                stat("speed", 90),
            ],
            "sprites": {
                "front_default": "https://sprites.example/25.png",
                "front_shiny": "https://sprites.example/25-shiny.png",
            },
            "types": [
                { "type": { "name": "electric" }, "slot": 1 },
            ],
            "abilities": [
                { "ability": { "name": "static" }, "slot": 1, "is_hidden": false },
                { "ability": { "name": "lightning-rod" }, "slot": 3, "is_hidden": true },
            ],
        })
    }

    fn sample_species() -> Value {
        json!({
            "genera": [
                { "genus": "Ratón", "language": { "name": "es" } },
                { "genus": "Mouse Pokémon", "language": { "name": "en" } },
            ],
            "generation": { "url": "https://pokeapi.co/api/v2/generation/1/" },
            "gender_rate": 4,
            "egg_groups": [ { "name": "ground" }, { "name": "fairy" } ],
            "base_happiness": 50,
            "capture_rate": 190,
            "is_legendary": false,
            "is_mythical": false,
            "evolution_chain": { "url": "https://pokeapi.co/api/v2/evolution-chain/10/" },
        })
    }

    fn sample_move_entry() -> RawMoveEntry {
        RawMoveEntry {
            detail: json!({
                "name": "thunder-shock",
                "power": 40,
                "pp": 30,
                "accuracy": 100,
                "type": { "name": "electric" },
                "damage_class": { "name": "special" },
                "flavor_text_entries": [
                    { "flavor_text": "A shock attack.", "language": { "name": "en" } },
                ],
            }),
            learn_details: vec![
                json!({
                    "move_learn_method": { "name": "level-up" },
                    "version_group": { "name": "red-blue" },
                    "level_learned_at": 1,
                }),
                json!({
                    "move_learn_method": { "name": "machine" },
                    "version_group": { "name": "sword-shield" },
                    "level_learned_at": 0,
                }),
            ],
        }
    }

    fn sample_payload() -> RawPokemonPayload {
        RawPokemonPayload {
            pokemon: sample_pokemon(),
            species: sample_species(),
            evolution_chain: json!({ "id": 10, "chain": { "species": { "name": "pichu" } } }),
            moves: vec![sample_move_entry()],
        }
    }

    #[test]
    fn transforms_complete_payload() {
        let bundle = transform_payload(&sample_payload()).expect("transform succeeds");

        assert_eq!(bundle.pokemon.pokedex_id, 25);
        assert_eq!(bundle.pokemon.name, "pikachu");
        assert_eq!(bundle.pokemon.stats.speed, 90);
        assert_eq!(bundle.pokemon.base_experience, Some(112));
        assert_eq!(bundle.species.genus, "Mouse Pokémon");
        assert_eq!(bundle.species.generation, 1);
        assert_eq!(bundle.species.egg_groups, vec!["ground", "fairy"]);
        assert_eq!(bundle.evolution_chain.chain_id, 10);
        assert_eq!(bundle.moves.len(), 1);
    }

    #[test]
    fn missing_stats_default_to_zero_but_optional_fields_stay_null() {
        let mut payload = sample_payload();
        payload.pokemon["stats"] = json!([stat("hp", 35)]);
        payload.pokemon.as_object_mut().unwrap().remove("base_experience");

        let bundle = transform_payload(&payload).expect("missing stats are soft failures");
        assert_eq!(bundle.pokemon.stats.hp, 35);
        assert_eq!(bundle.pokemon.stats.attack, 0);
        assert_eq!(bundle.pokemon.stats.speed, 0);
        assert_eq!(bundle.pokemon.base_experience, None);
    }

    #[test]
    fn missing_required_pokemon_field_is_tagged() {
        let mut payload = sample_payload();
        payload.pokemon.as_object_mut().unwrap().remove("height");

        let err = transform_payload(&payload).expect_err("missing height is a hard failure");
        assert_eq!(err.field, "pokemon");
        assert!(err.reason.contains("height"));
    }

    #[test]
    fn mistyped_required_field_is_tagged() {
        let mut payload = sample_payload();
        payload.pokemon["weight"] = json!("heavy");

        let err = transform_payload(&payload).expect_err("mistyped weight is a hard failure");
        assert_eq!(err.field, "pokemon");
        assert!(err.reason.contains("weight"));
    }

    #[test]
    fn non_object_species_document_is_tagged() {
        let mut payload = sample_payload();
        payload.species = json!(null);

        let err = transform_payload(&payload).expect_err("species must be an object");
        assert_eq!(err.field, "species");
    }

    #[test]
    fn slot_sort_is_ascending_and_stable() {
        let mut payload = sample_payload();
        payload.pokemon["types"] = json!([
            { "type": { "name": "flying" }, "slot": 2 },
            { "type": { "name": "fire" }, "slot": 1 },
            { "type": { "name": "dragon" }, "slot": 2 },
        ]);

        let bundle = transform_payload(&payload).expect("transform succeeds");
        let names: Vec<&str> = bundle.pokemon.types.iter().map(|t| t.name.as_str()).collect();
        // Ties on slot 2 keep their original relative order.
        assert_eq!(names, vec!["fire", "flying", "dragon"]);
    }

    #[test]
    fn malformed_type_entries_are_skipped() {
        let mut payload = sample_payload();
        payload.pokemon["types"] = json!([
            { "type": { "name": "electric" }, "slot": 1 },
            { "slot": 2 },
        ]);

        let bundle = transform_payload(&payload).expect("transform succeeds");
        assert_eq!(bundle.pokemon.types.len(), 1);
    }

    #[test]
    fn bad_sprite_url_is_blanked_not_fatal() {
        let mut payload = sample_payload();
        payload.pokemon["sprites"]["front_default"] = json!("ftp://sprites.example/25.png");

        let bundle = transform_payload(&payload).expect("bad url never fails the transform");
        assert_eq!(bundle.pokemon.sprite_front_default, "");
        assert_eq!(
            bundle.pokemon.sprite_front_shiny,
            "https://sprites.example/25-shiny.png"
        );
    }

    #[test]
    fn last_learn_history_entry_wins() {
        let bundle = transform_payload(&sample_payload()).expect("transform succeeds");

        let learned = &bundle.moves[0];
        assert_eq!(learned.learn_method, "machine");
        assert_eq!(learned.version_group, "sword-shield");
        assert_eq!(learned.level_learned, Some(0));
    }

    #[test]
    fn malformed_move_entry_is_skipped_without_failing_transform() {
        let mut payload = sample_payload();
        payload.moves.push(RawMoveEntry {
            detail: json!({ "name": "broken-move" }),
            learn_details: vec![],
        });

        let bundle = transform_payload(&payload).expect("bad move entries are skipped");
        assert_eq!(bundle.moves.len(), 1);
        assert_eq!(bundle.moves[0].move_data.name, "thunder-shock");
    }

    #[test]
    fn english_text_defaults_to_empty_when_absent() {
        let mut payload = sample_payload();
        payload.species["genera"] = json!([
            { "genus": "Ratón", "language": { "name": "es" } },
        ]);

        let bundle = transform_payload(&payload).expect("transform succeeds");
        assert_eq!(bundle.species.genus, "");
    }

    #[test]
    fn evolution_chain_requires_id_and_chain() {
        let mut payload = sample_payload();
        payload.evolution_chain = json!({ "id": 10 });

        let err = transform_payload(&payload).expect_err("chain payload is required");
        assert_eq!(err.field, "evolution_chain");
        assert!(err.reason.contains("chain"));
    }
}
