use chrono::{DateTime, Utc};

/// Optional filters shared by both the FTS and embedding search paths.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilters {
    pub project: Option<String>,
    /// Matched against `json_extract(metadata, '$.agent')`.
    pub agent: Option<String>,
    /// Matched against `json_extract(metadata, '$.channel')`.
    pub channel: Option<String>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

impl MetadataFilters {
    /// Appends `AND ...` clauses (with the given table alias prefix) to
    /// `sql`, pushing bound values onto `args`. Caller supplies the alias
    /// used for the `memories` table in its query (e.g. `"m"`).
    pub fn apply(&self, alias: &str, sql: &mut String, args: &mut Vec<Box<dyn rusqlite::ToSql>>) {
        if let Some(project) = &self.project {
            sql.push_str(&format!(" AND {alias}.project = ?{}", args.len() + 1));
            args.push(Box::new(project.clone()));
        }
        if let Some(agent) = &self.agent {
            sql.push_str(&format!(
                " AND json_extract({alias}.metadata, '$.agent') = ?{}",
                args.len() + 1
            ));
            args.push(Box::new(agent.clone()));
        }
        if let Some(channel) = &self.channel {
            sql.push_str(&format!(
                " AND json_extract({alias}.metadata, '$.channel') = ?{}",
                args.len() + 1
            ));
            args.push(Box::new(channel.clone()));
        }
        if let Some(after) = &self.after {
            sql.push_str(&format!(" AND {alias}.imported_at >= ?{}", args.len() + 1));
            args.push(Box::new(*after));
        }
        if let Some(before) = &self.before {
            sql.push_str(&format!(" AND {alias}.imported_at < ?{}", args.len() + 1));
            args.push(Box::new(*before));
        }
    }
}
