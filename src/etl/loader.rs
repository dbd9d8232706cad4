//! Transactional PostgreSQL loader with natural-key upserts.
//!
//! All writes for one Pokémon happen inside a single transaction, so a
//! failure anywhere leaves no partial bundle behind. Shared lookup rows
//! (types, abilities, moves, evolution chains) are cached by natural key;
//! cache entries are staged per call and only published after the
//! transaction commits, so a rollback can never leave the cache pointing
//! at rows that do not exist.

use crate::error::LoadError;
use crate::etl::records::{NormalizedLearnedMove, PokemonBundle};
use dashmap::DashMap;
use sqlx::{PgPool, Postgres, Transaction};

pub struct PokemonLoader {
    pool: PgPool,
    /// Natural key -> surrogate id caches for shared rows.
    type_ids: DashMap<String, i32>,
    ability_ids: DashMap<String, i32>,
    move_ids: DashMap<String, i32>,
    chain_ids: DashMap<i32, i32>,
}

/// Ids resolved during one load, held back until the transaction commits.
#[derive(Default)]
struct PendingIds {
    types: Vec<(String, i32)>,
    abilities: Vec<(String, i32)>,
    moves: Vec<(String, i32)>,
    chains: Vec<(i32, i32)>,
}

impl PokemonLoader {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            type_ids: DashMap::new(),
            ability_ids: DashMap::new(),
            move_ids: DashMap::new(),
            chain_ids: DashMap::new(),
        }
    }

    /// Load one normalized bundle, returning the pokemon and species row
    /// ids. Idempotent: running the same bundle twice updates rather than
    /// duplicates, matched on natural keys.
    pub async fn load_bundle(&self, bundle: &PokemonBundle) -> Result<(i32, i32), LoadError> {
        validate_bundle(bundle)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LoadError::database("transaction", e))?;
        let mut pending = PendingIds::default();

        let chain_row_id = self
            .upsert_evolution_chain(&mut tx, bundle, &mut pending)
            .await?;
        let pokemon_id = self.upsert_pokemon(&mut tx, bundle, chain_row_id).await?;
        self.replace_types(&mut tx, pokemon_id, bundle, &mut pending)
            .await?;
        self.replace_abilities(&mut tx, pokemon_id, bundle, &mut pending)
            .await?;
        let species_id = self.upsert_species(&mut tx, pokemon_id, bundle).await?;
        self.upsert_moves(&mut tx, pokemon_id, &bundle.moves, &mut pending)
            .await?;

        tx.commit()
            .await
            .map_err(|e| LoadError::database("transaction", e))?;

        // Publish staged cache entries only now that the rows are durable.
        for (name, id) in pending.types {
            self.type_ids.insert(name, id);
        }
        for (name, id) in pending.abilities {
            self.ability_ids.insert(name, id);
        }
        for (name, id) in pending.moves {
            self.move_ids.insert(name, id);
        }
        for (chain_id, id) in pending.chains {
            self.chain_ids.insert(chain_id, id);
        }

        log::info!("loaded pokemon {}", bundle.pokemon.name);
        Ok((pokemon_id, species_id))
    }

    /// Drop all cached lookup ids. Called once at the end of a run so the
    /// next run never trusts ids resolved by this one.
    pub fn clear_caches(&self) {
        self.type_ids.clear();
        self.ability_ids.clear();
        self.move_ids.clear();
        self.chain_ids.clear();
        log::debug!("cleared loader caches");
    }

    async fn upsert_evolution_chain(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        bundle: &PokemonBundle,
        pending: &mut PendingIds,
    ) -> Result<i32, LoadError> {
        let chain = &bundle.evolution_chain;
        if let Some(id) = self.chain_ids.get(&chain.chain_id) {
            // Chain payloads are shared between Pokémon; once cached in this
            // run the stored tree is considered current.
            return Ok(*id);
        }

        let id: i32 = sqlx::query_scalar(
            r#"INSERT INTO evolution_chains (chain_id, chain_data, created_at, updated_at)
               VALUES ($1, $2, NOW(), NOW())
               ON CONFLICT (chain_id) DO UPDATE
               SET chain_data = EXCLUDED.chain_data,
                   updated_at = NOW()
               RETURNING id"#,
        )
        .bind(chain.chain_id)
        .bind(&chain.chain_data)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| LoadError::database("evolution_chain", e))?;

        pending.chains.push((chain.chain_id, id));
        Ok(id)
    }

    async fn upsert_pokemon(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        bundle: &PokemonBundle,
        chain_row_id: i32,
    ) -> Result<i32, LoadError> {
        let p = &bundle.pokemon;
        sqlx::query_scalar(
            r#"INSERT INTO pokemon
               (pokedex_id, name, height, weight, base_experience,
                hp, attack, defense, special_attack, special_defense, speed,
                sprite_front_default, sprite_front_shiny, evolution_chain_id,
                created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, NOW(), NOW())
               ON CONFLICT (pokedex_id) DO UPDATE
               SET name = EXCLUDED.name,
                   height = EXCLUDED.height,
                   weight = EXCLUDED.weight,
                   base_experience = EXCLUDED.base_experience,
                   hp = EXCLUDED.hp,
                   attack = EXCLUDED.attack,
                   defense = EXCLUDED.defense,
                   special_attack = EXCLUDED.special_attack,
                   special_defense = EXCLUDED.special_defense,
                   speed = EXCLUDED.speed,
                   sprite_front_default = EXCLUDED.sprite_front_default,
                   sprite_front_shiny = EXCLUDED.sprite_front_shiny,
                   evolution_chain_id = EXCLUDED.evolution_chain_id,
                   updated_at = NOW()
               RETURNING id"#,
        )
        .bind(p.pokedex_id)
        .bind(&p.name)
        .bind(p.height)
        .bind(p.weight)
        .bind(p.base_experience)
        .bind(p.stats.hp)
        .bind(p.stats.attack)
        .bind(p.stats.defense)
        .bind(p.stats.special_attack)
        .bind(p.stats.special_defense)
        .bind(p.stats.speed)
        .bind(&p.sprite_front_default)
        .bind(&p.sprite_front_shiny)
        .bind(chain_row_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            LoadError::with_data(
                "pokemon",
                format!("database error: {e}"),
                serde_json::json!({ "pokedex_id": p.pokedex_id, "name": p.name }),
            )
        })
    }

    /// Replace the Pokémon's type set: membership follows the bundle exactly,
    /// so types dropped upstream disappear here too.
    async fn replace_types(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        pokemon_id: i32,
        bundle: &PokemonBundle,
        pending: &mut PendingIds,
    ) -> Result<(), LoadError> {
        sqlx::query("DELETE FROM pokemon_types WHERE pokemon_id = $1")
            .bind(pokemon_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| LoadError::database("pokemon_type", e))?;

        for type_slot in &bundle.pokemon.types {
            let type_id = self
                .get_or_create_type(tx, &type_slot.name, pending)
                .await?;

            sqlx::query(
                "INSERT INTO pokemon_types (pokemon_id, type_id, slot) VALUES ($1, $2, $3)",
            )
            .bind(pokemon_id)
            .bind(type_id)
            .bind(type_slot.slot)
            .execute(&mut **tx)
            .await
            .map_err(|e| LoadError::database("pokemon_type", e))?;
        }

        Ok(())
    }

    /// Get-or-create a type row by name, cache-checked. Used for both the
    /// Pokémon type set and move type references.
    async fn get_or_create_type(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
        pending: &mut PendingIds,
    ) -> Result<i32, LoadError> {
        if let Some(id) = self.type_ids.get(name) {
            return Ok(*id);
        }
        if let Some((_, id)) = pending.types.iter().find(|(staged, _)| staged == name) {
            return Ok(*id);
        }

        let id: i32 = sqlx::query_scalar(
            r#"INSERT INTO types (name) VALUES ($1)
               ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
               RETURNING id"#,
        )
        .bind(name)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| LoadError::database("type", e))?;
        pending.types.push((name.to_string(), id));
        Ok(id)
    }

    /// Get-or-create an ability row by name, cache-checked the same way as
    /// types.
    async fn get_or_create_ability(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
        pending: &mut PendingIds,
    ) -> Result<i32, LoadError> {
        if let Some(id) = self.ability_ids.get(name) {
            return Ok(*id);
        }
        if let Some((_, id)) = pending.abilities.iter().find(|(staged, _)| staged == name) {
            return Ok(*id);
        }

        let id: i32 = sqlx::query_scalar(
            r#"INSERT INTO abilities (name) VALUES ($1)
               ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
               RETURNING id"#,
        )
        .bind(name)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| LoadError::database("ability", e))?;
        pending.abilities.push((name.to_string(), id));
        Ok(id)
    }

    async fn replace_abilities(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        pokemon_id: i32,
        bundle: &PokemonBundle,
        pending: &mut PendingIds,
    ) -> Result<(), LoadError> {
        sqlx::query("DELETE FROM pokemon_abilities WHERE pokemon_id = $1")
            .bind(pokemon_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| LoadError::database("pokemon_ability", e))?;

        for ability in &bundle.pokemon.abilities {
            let ability_id = self
                .get_or_create_ability(tx, &ability.name, pending)
                .await?;

            sqlx::query(
                r#"INSERT INTO pokemon_abilities (pokemon_id, ability_id, slot, is_hidden)
                   VALUES ($1, $2, $3, $4)"#,
            )
            .bind(pokemon_id)
            .bind(ability_id)
            .bind(ability.slot)
            .bind(ability.is_hidden)
            .execute(&mut **tx)
            .await
            .map_err(|e| LoadError::database("pokemon_ability", e))?;
        }

        Ok(())
    }

    async fn upsert_species(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        pokemon_id: i32,
        bundle: &PokemonBundle,
    ) -> Result<i32, LoadError> {
        let s = &bundle.species;
        sqlx::query_scalar(
            r#"INSERT INTO pokemon_species
               (pokemon_id, genus, generation, gender_rate, egg_groups,
                base_happiness, capture_rate, is_legendary, is_mythical,
                created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW())
               ON CONFLICT (pokemon_id) DO UPDATE
               SET genus = EXCLUDED.genus,
                   generation = EXCLUDED.generation,
                   gender_rate = EXCLUDED.gender_rate,
                   egg_groups = EXCLUDED.egg_groups,
                   base_happiness = EXCLUDED.base_happiness,
                   capture_rate = EXCLUDED.capture_rate,
                   is_legendary = EXCLUDED.is_legendary,
                   is_mythical = EXCLUDED.is_mythical,
                   updated_at = NOW()
               RETURNING id"#,
        )
        .bind(pokemon_id)
        .bind(&s.genus)
        .bind(s.generation)
        .bind(s.gender_rate)
        .bind(&s.egg_groups)
        .bind(s.base_happiness)
        .bind(s.capture_rate)
        .bind(s.is_legendary)
        .bind(s.is_mythical)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| LoadError::database("pokemon_species", e))
    }

    /// Upsert move definitions and the learn relationships for this Pokémon.
    /// The relationship key is (pokemon, move, learn method); duplicates in
    /// the bundle resolve to the last occurrence.
    async fn upsert_moves(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        pokemon_id: i32,
        moves: &[NormalizedLearnedMove],
        pending: &mut PendingIds,
    ) -> Result<(), LoadError> {
        for learned in moves {
            let m = &learned.move_data;
            let move_id = match self.move_ids.get(&m.name) {
                Some(id) => *id,
                None => {
                    let type_id = self.get_or_create_type(tx, &m.move_type, pending).await?;
                    let id: i32 = sqlx::query_scalar(
                        r#"INSERT INTO moves
                           (name, power, pp, accuracy, type_id, damage_class, description,
                            created_at, updated_at)
                           VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
                           ON CONFLICT (name) DO UPDATE
                           SET power = EXCLUDED.power,
                               pp = EXCLUDED.pp,
                               accuracy = EXCLUDED.accuracy,
                               type_id = EXCLUDED.type_id,
                               damage_class = EXCLUDED.damage_class,
                               description = EXCLUDED.description,
                               updated_at = NOW()
                           RETURNING id"#,
                    )
                    .bind(&m.name)
                    .bind(m.power)
                    .bind(m.pp)
                    .bind(m.accuracy)
                    .bind(type_id)
                    .bind(&m.damage_class)
                    .bind(&m.description)
                    .fetch_one(&mut **tx)
                    .await
                    .map_err(|e| LoadError::database("move", e))?;
                    pending.moves.push((m.name.clone(), id));
                    id
                }
            };

            sqlx::query(
                r#"INSERT INTO pokemon_moves
                   (pokemon_id, move_id, learn_method, level_learned, version_group,
                    created_at, updated_at)
                   VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
                   ON CONFLICT (pokemon_id, move_id, learn_method) DO UPDATE
                   SET level_learned = EXCLUDED.level_learned,
                       version_group = EXCLUDED.version_group,
                       updated_at = NOW()"#,
            )
            .bind(pokemon_id)
            .bind(move_id)
            .bind(&learned.learn_method)
            .bind(learned.level_learned)
            .bind(&learned.version_group)
            .execute(&mut **tx)
            .await
            .map_err(|e| LoadError::database("pokemon_move", e))?;
        }

        Ok(())
    }
}

/// Reject records the schema could not represent meaningfully before any
/// write happens.
fn validate_bundle(bundle: &PokemonBundle) -> Result<(), LoadError> {
    let p = &bundle.pokemon;
    if p.pokedex_id <= 0 {
        return Err(LoadError::with_data(
            "pokemon",
            "pokedex_id must be positive",
            serde_json::json!({ "pokedex_id": p.pokedex_id }),
        ));
    }
    if p.name.is_empty() {
        return Err(LoadError::with_data(
            "pokemon",
            "missing required field: name",
            serde_json::json!({ "pokedex_id": p.pokedex_id }),
        ));
    }
    for learned in &bundle.moves {
        if learned.move_data.name.is_empty() {
            return Err(LoadError::new("move", "missing required field: name"));
        }
    }
    Ok(())
}
