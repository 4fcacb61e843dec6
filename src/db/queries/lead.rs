//! Lead queries used by the bulk importer

use anyhow::Result;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::types::{ExistingContacts, NormalizedLead};

/// Phone numbers (primary and secondary) and lower-cased emails of all leads
pub async fn existing_contacts(pool: &PgPool) -> Result<ExistingContacts> {
    let phones: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT phone_number FROM leads
        WHERE phone_number IS NOT NULL AND phone_number <> ''
        UNION
        SELECT secondary_phone_number FROM leads
        WHERE secondary_phone_number IS NOT NULL AND secondary_phone_number <> ''
        "#
    )
    .fetch_all(pool)
    .await?;

    let emails: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT lower(email) FROM leads
        WHERE email IS NOT NULL AND email <> ''
        "#
    )
    .fetch_all(pool)
    .await?;

    Ok(ExistingContacts { phones, emails })
}

/// Count all leads
pub async fn count_leads(pool: &PgPool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Insert one batch of leads with a single multi-row statement.
///
/// `ids` is parallel to `leads`.
pub async fn insert_leads(
    conn: &mut PgConnection,
    leads: &[NormalizedLead],
    ids: &[Uuid],
) -> Result<u64, sqlx::Error> {
    if leads.is_empty() {
        return Ok(0);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        r#"INSERT INTO leads (
            id, name, first_name, last_name, phone_number, phone_country_code,
            whatsapp_number, secondary_phone_number, email, country, program,
            occupation, source, status, priority, comment, follow_up_date,
            follow_up_status, ielts_score, assigned_staff_id, created_by,
            created_at, updated_at
        ) "#,
    );

    builder.push_values(leads.iter().zip(ids), |mut row, (lead, id)| {
        row.push_bind(*id)
            .push_bind(lead.name.clone())
            .push_bind(lead.first_name.clone())
            .push_bind(lead.last_name.clone())
            .push_bind(lead.phone_number.clone())
            .push_bind(lead.phone_country_code.clone())
            .push_bind(lead.whatsapp_number.clone())
            .push_bind(lead.secondary_phone_number.clone())
            .push_bind(lead.email.clone())
            .push_bind(lead.country.clone())
            .push_bind(lead.program.clone())
            .push_bind(lead.occupation.clone())
            .push_bind(lead.source.clone())
            .push_bind(lead.status.as_str())
            .push_bind(lead.priority.clone())
            .push_bind(lead.comment.clone())
            .push_bind(lead.follow_up_date)
            .push_bind(lead.follow_up_status.clone())
            .push_bind(lead.ielts_score.clone())
            .push_bind(lead.assigned_staff_id)
            .push_bind(lead.created_by)
            .push_bind(lead.created_at)
            .push_bind(lead.updated_at);
    });

    let result = builder.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

/// Insert the activity comment of each lead in a batch.
pub async fn insert_import_comments(
    conn: &mut PgConnection,
    leads: &[NormalizedLead],
    ids: &[Uuid],
) -> Result<u64, sqlx::Error> {
    if leads.is_empty() {
        return Ok(0);
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO lead_comments (id, lead_id, user_id, comment, created_at) ");

    builder.push_values(leads.iter().zip(ids), |mut row, (lead, id)| {
        row.push_bind(Uuid::new_v4())
            .push_bind(*id)
            .push_bind(lead.created_by)
            .push_bind(lead.import_comment())
            .push_bind(lead.created_at);
    });

    let result = builder.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}
