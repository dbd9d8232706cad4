use pokedex_sync::test_support::provision_database;
use sqlx::migrate::Migrator;

static TEST_MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[tokio::test]
async fn migrations_apply_and_revert_cleanly() {
    let Some(test_db) = provision_database().await else {
        return;
    };
    let pool = test_db.pool_clone();

    TEST_MIGRATOR.run(&pool).await.expect("migrations run");

    TEST_MIGRATOR
        .undo(&pool, 0)
        .await
        .expect("migrations revert");

    let pokemon_tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = 'public' AND table_name = 'pokemon'",
    )
    .fetch_one(&pool)
    .await
    .expect("lookup succeeded");

    assert_eq!(pokemon_tables, 0, "pokemon should be dropped after revert");

    TEST_MIGRATOR.run(&pool).await.expect("migrations rerun");

    let pokemon_tables_after: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = 'public' AND table_name = 'pokemon'",
    )
    .fetch_one(&pool)
    .await
    .expect("lookup succeeded");

    assert_eq!(pokemon_tables_after, 1);
}
