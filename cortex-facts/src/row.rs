use chrono::{DateTime, Utc};
use rusqlite::Row;

use cortex_core::model::{Fact, FactState, FactType};

pub fn fact_from_row(row: &Row) -> rusqlite::Result<Fact> {
    let fact_type: String = row.get("fact_type")?;
    let state: String = row.get("state")?;
    Ok(Fact {
        id: row.get("id")?,
        memory_id: row.get("memory_id")?,
        subject: row.get("subject")?,
        predicate: row.get("predicate")?,
        object: row.get("object")?,
        fact_type: FactType::parse(&fact_type).map_err(to_sqlite_err)?,
        confidence: row.get("confidence")?,
        decay_rate: row.get("decay_rate")?,
        last_reinforced: row.get::<_, DateTime<Utc>>("last_reinforced")?,
        source_quote: row.get("source_quote")?,
        created_at: row.get::<_, DateTime<Utc>>("created_at")?,
        superseded_by: row.get("superseded_by")?,
        state: FactState::parse(&state).map_err(to_sqlite_err)?,
        agent_id: row.get("agent_id")?,
    })
}

fn to_sqlite_err(e: cortex_core::errors::CortexError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())),
    )
}
