use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

use crate::models::{CheckIn, CheckInPing, County, Job, Message, User};

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Per-county booking collections
    for county in County::ALL {
        create_indexes(
            db,
            county.collection(),
            vec![
                index(bson::doc! { "booking_date": -1 }),
                index_unique_sparse(bson::doc! { "_upsert_key": 1 }),
                index(bson::doc! { "crm_stage": 1, "booking_date": -1 }),
                index(bson::doc! { "bond_amount": -1 }),
                index(bson::doc! { "crm_details.assigned_department": 1 }),
            ],
        )
        .await?;
    }

    // Messages
    create_indexes(
        db,
        Message::COLLECTION,
        vec![
            index_unique_sparse(bson::doc! { "provider_sid": 1 }),
            index(bson::doc! { "case_id": 1, "created_at": -1 }),
        ],
    )
    .await?;

    // Check-ins
    create_indexes(
        db,
        CheckIn::COLLECTION,
        vec![
            index(bson::doc! { "case_id": 1, "due_at": -1 }),
            index(bson::doc! { "status": 1, "due_at": 1 }),
        ],
    )
    .await?;

    create_indexes(
        db,
        CheckInPing::COLLECTION,
        vec![index(bson::doc! { "checkin_id": 1, "received_at": -1 })],
    )
    .await?;

    // Users
    create_indexes(
        db,
        User::COLLECTION,
        vec![index_unique(bson::doc! { "uid": 1 })],
    )
    .await?;

    // Jobs
    create_indexes(
        db,
        Job::COLLECTION,
        vec![index(bson::doc! { "status": 1, "finished_at": -1 })],
    )
    .await?;

    info!("All indexes ensured");
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

fn index_unique_sparse(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).sparse(true).build())
        .build()
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    db.collection::<bson::Document>(collection)
        .create_indexes(indexes)
        .await?;
    info!(collection, "Indexes created");
    Ok(())
}
