//! Integration tests for the life-event intake: per-category rules, dedup,
//! and the cancellation chain seen through the processor.

use std::sync::Arc;

use chrono::{Months, Utc};
use personfeed_core::event::{
    ChangeKind, Classification, EventDetails, LifeEvent,
};
use personfeed_core::metrics::RecordingMetrics;
use personfeed_db::store::EventStore;
use personfeed_intake::LifeEventProcessor;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const ACTOR: &str = "1234567890123";

fn life_event(event_id: &str, kind: ChangeKind, details: EventDetails) -> LifeEvent {
    LifeEvent {
        event_id: event_id.to_string(),
        change_kind: kind,
        subject_identifiers: vec!["12345678901".to_string(), ACTOR.to_string()],
        actor_id: ACTOR.to_string(),
        previous_event_id: None,
        created_at: Utc::now(),
        source_offset: 0,
        master_source: "FREG".to_string(),
        classification: Classification::default(),
        details,
    }
}

fn processor(pool: PgPool) -> (LifeEventProcessor, Arc<RecordingMetrics>) {
    let metrics = Arc::new(RecordingMetrics::new());
    let processor = LifeEventProcessor::new(EventStore::new(pool), metrics.clone());
    (processor, metrics)
}

async fn stored_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM received_events")
        .fetch_one(pool)
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Dispatch and dedup
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn unsupported_events_are_dropped(pool: PgPool) {
    let (processor, metrics) = processor(pool.clone());
    let event = life_event("e-1", ChangeKind::Created, EventDetails::Unsupported);

    let result = processor.process(event).await.unwrap();
    assert!(result.is_none());
    assert_eq!(stored_count(&pool).await, 0);
    assert_eq!(metrics.count("UNSUPPORTED.ignored"), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn processing_the_same_event_twice_stores_it_once(pool: PgPool) {
    let (processor, metrics) = processor(pool.clone());
    let event = life_event(
        "e-1",
        ChangeKind::Created,
        EventDetails::ResidentialAddress { move_date: None },
    );

    assert!(processor.process(event.clone()).await.unwrap().is_some());
    assert!(processor.process(event).await.unwrap().is_none());

    assert_eq!(stored_count(&pool).await, 1);
    assert_eq!(metrics.count("duplicate"), 1);
    assert_eq!(metrics.count("RESIDENTIAL_ADDRESS.CREATED"), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn annulment_chain_through_the_processor_cancels_both(pool: PgPool) {
    let (processor, _) = processor(pool.clone());
    processor
        .process(life_event(
            "e-1",
            ChangeKind::Created,
            EventDetails::ResidentialAddress { move_date: None },
        ))
        .await
        .unwrap();

    let mut annulment = life_event(
        "e-2",
        ChangeKind::Annulled,
        EventDetails::ResidentialAddress { move_date: None },
    );
    annulment.previous_event_id = Some("e-1".to_string());
    processor.process(annulment).await.unwrap();

    let statuses: Vec<String> =
        sqlx::query_scalar("SELECT status::text FROM received_events ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(statuses, ["cancelled", "cancelled"]);
}

// ---------------------------------------------------------------------------
// Death
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn death_without_a_date_is_dropped(pool: PgPool) {
    let (processor, metrics) = processor(pool.clone());
    let event = life_event(
        "e-1",
        ChangeKind::Created,
        EventDetails::Death { death_date: None },
    );

    assert!(processor.process(event).await.unwrap().is_none());
    assert_eq!(stored_count(&pool).await, 0);
    assert_eq!(metrics.count("DEATH.ignored"), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn death_annulment_is_stored_without_a_date(pool: PgPool) {
    let (processor, _) = processor(pool.clone());
    let event = life_event(
        "e-1",
        ChangeKind::Annulled,
        EventDetails::Death { death_date: None },
    );
    assert!(processor.process(event).await.unwrap().is_some());
}

// ---------------------------------------------------------------------------
// Birth
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn birth_today_abroad_is_not_persisted(pool: PgPool) {
    let (processor, metrics) = processor(pool.clone());
    let event = life_event(
        "e-1",
        ChangeKind::Created,
        EventDetails::Birth {
            birth_date: Some(Utc::now().date_naive()),
            birth_country: Some("POL".to_string()),
        },
    );

    assert!(processor.process(event).await.unwrap().is_none());
    assert_eq!(stored_count(&pool).await, 0);
    assert_eq!(metrics.count("BIRTH.ignored"), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn birth_today_at_home_is_not_persisted_either(pool: PgPool) {
    let (processor, _) = processor(pool.clone());
    let event = life_event(
        "e-1",
        ChangeKind::Created,
        EventDetails::Birth {
            birth_date: Some(Utc::now().date_naive()),
            birth_country: Some("NOR".to_string()),
        },
    );
    assert!(processor.process(event).await.unwrap().is_none());
    assert_eq!(stored_count(&pool).await, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn birth_without_a_date_is_not_persisted(pool: PgPool) {
    let (processor, _) = processor(pool.clone());
    let event = life_event(
        "e-1",
        ChangeKind::Created,
        EventDetails::Birth {
            birth_date: None,
            birth_country: Some("NOR".to_string()),
        },
    );
    assert!(processor.process(event).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn birth_older_than_six_months_is_stored(pool: PgPool) {
    let (processor, _) = processor(pool.clone());
    let birth_date = Utc::now()
        .date_naive()
        .checked_sub_months(Months::new(9))
        .unwrap();
    let event = life_event(
        "e-1",
        ChangeKind::Created,
        EventDetails::Birth {
            birth_date: Some(birth_date),
            birth_country: Some("NOR".to_string()),
        },
    );
    assert!(processor.process(event).await.unwrap().is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn birth_annulment_is_stored_regardless_of_age(pool: PgPool) {
    let (processor, _) = processor(pool.clone());
    let event = life_event(
        "e-1",
        ChangeKind::Annulled,
        EventDetails::Birth {
            birth_date: Some(Utc::now().date_naive()),
            birth_country: None,
        },
    );
    assert!(processor.process(event).await.unwrap().is_some());
}

// ---------------------------------------------------------------------------
// Name
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn name_with_a_missing_part_is_dropped(pool: PgPool) {
    let (processor, _) = processor(pool.clone());
    let event = life_event(
        "e-1",
        ChangeKind::Created,
        EventDetails::Name {
            first_name: Some("Ada".to_string()),
            last_name: None,
        },
    );
    assert!(processor.process(event).await.unwrap().is_none());
    assert_eq!(stored_count(&pool).await, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn name_annulment_is_stored_even_without_names(pool: PgPool) {
    let (processor, _) = processor(pool.clone());
    let event = life_event(
        "e-1",
        ChangeKind::Annulled,
        EventDetails::Name {
            first_name: None,
            last_name: None,
        },
    );
    assert!(processor.process(event).await.unwrap().is_some());
}

// ---------------------------------------------------------------------------
// National id: validation is advisory
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn national_id_without_a_kind_is_flagged_but_stored(pool: PgPool) {
    let (processor, metrics) = processor(pool.clone());
    let event = life_event(
        "e-1",
        ChangeKind::Created,
        EventDetails::NationalId {
            identifier_kind: None,
        },
    );

    assert!(processor.process(event).await.unwrap().is_some());
    assert_eq!(stored_count(&pool).await, 1);
    assert_eq!(metrics.count("NATIONAL_ID.ignored"), 1);
}

// ---------------------------------------------------------------------------
// Immigration / emigration / marital status kind filters
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn corrected_immigration_is_dropped(pool: PgPool) {
    let (processor, metrics) = processor(pool.clone());
    let event = life_event(
        "e-1",
        ChangeKind::Corrected,
        EventDetails::Immigration { from_country: None },
    );
    assert!(processor.process(event).await.unwrap().is_none());
    assert_eq!(metrics.count("IMMIGRATION.ignored"), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn annulled_emigration_is_stored(pool: PgPool) {
    let (processor, _) = processor(pool.clone());
    let event = life_event(
        "e-1",
        ChangeKind::Annulled,
        EventDetails::Emigration {
            emigration_date: None,
        },
    );
    assert!(processor.process(event).await.unwrap().is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn closed_marital_status_is_dropped(pool: PgPool) {
    let (processor, _) = processor(pool.clone());
    let event = life_event(
        "e-1",
        ChangeKind::Closed,
        EventDetails::MaritalStatus { changed_at: None },
    );
    assert!(processor.process(event).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn corrected_marital_status_is_stored(pool: PgPool) {
    let (processor, _) = processor(pool.clone());
    let event = life_event(
        "e-1",
        ChangeKind::Corrected,
        EventDetails::MaritalStatus { changed_at: None },
    );
    assert!(processor.process(event).await.unwrap().is_some());
}

// ---------------------------------------------------------------------------
// Always-persisted categories
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn corrected_residential_address_is_stored(pool: PgPool) {
    let (processor, metrics) = processor(pool.clone());
    let event = life_event(
        "e-1",
        ChangeKind::Corrected,
        EventDetails::ResidentialAddress { move_date: None },
    );
    assert!(processor.process(event).await.unwrap().is_some());
    assert_eq!(metrics.count("RESIDENTIAL_ADDRESS.CORRECTED"), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn guardianship_is_always_stored(pool: PgPool) {
    let (processor, _) = processor(pool.clone());
    let event = life_event(
        "e-1",
        ChangeKind::Closed,
        EventDetails::Guardianship {
            scope: Some("full".to_string()),
        },
    );
    assert!(processor.process(event).await.unwrap().is_some());
}
