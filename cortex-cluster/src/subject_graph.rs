use std::collections::{HashMap, HashSet};

use cortex_facts::normalize_group_key;
use petgraph::unionfind::UnionFind;

/// A single active fact's contribution to the subject co-occurrence graph.
#[derive(Debug, Clone)]
pub struct FactSubjectRow {
    pub fact_id: i64,
    pub memory_id: i64,
    pub subject: String,
    pub confidence: f64,
}

/// A connected component of the subject graph, with its rollup statistics
/// already computed.
#[derive(Debug, Clone)]
pub struct ClusterComputation {
    pub name: String,
    pub aliases: Vec<String>,
    pub top_subjects: Vec<String>,
    pub cohesion: f64,
    pub fact_count: i64,
    pub avg_confidence: f64,
    pub fact_ids: Vec<i64>,
}

const MAX_ALIASES: usize = 8;

/// Builds the subject co-occurrence graph (an edge exists between two
/// normalized subjects when they appear on facts of the same memory) and
/// returns one [`ClusterComputation`] per connected component. Rows with a
/// blank subject are skipped entirely.
pub fn compute_clusters(rows: &[FactSubjectRow]) -> Vec<ClusterComputation> {
    let mut subject_index: HashMap<String, usize> = HashMap::new();
    let mut index_rows: Vec<Vec<&FactSubjectRow>> = Vec::new();
    let mut memory_subjects: HashMap<i64, HashSet<usize>> = HashMap::new();

    for row in rows {
        let normalized = normalize_group_key(&row.subject);
        if normalized.is_empty() {
            continue;
        }
        let idx = *subject_index.entry(normalized).or_insert_with(|| {
            index_rows.push(Vec::new());
            index_rows.len() - 1
        });
        index_rows[idx].push(row);
        memory_subjects.entry(row.memory_id).or_default().insert(idx);
    }

    let n = index_rows.len();
    if n == 0 {
        return Vec::new();
    }

    let mut uf: UnionFind<usize> = UnionFind::new(n);
    let mut edges: HashSet<(usize, usize)> = HashSet::new();
    for subjects in memory_subjects.values() {
        let members: Vec<usize> = subjects.iter().copied().collect();
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                let (a, b) = (members[i].min(members[j]), members[i].max(members[j]));
                uf.union(a, b);
                edges.insert((a, b));
            }
        }
    }

    let mut components: HashMap<usize, Vec<usize>> = HashMap::new();
    for idx in 0..n {
        components.entry(uf.find(idx)).or_default().push(idx);
    }

    let mut result = Vec::with_capacity(components.len());
    for members in components.into_values() {
        let member_set: HashSet<usize> = members.iter().copied().collect();
        let actual_edges = edges
            .iter()
            .filter(|(a, b)| member_set.contains(a) && member_set.contains(b))
            .count();
        let size = members.len();
        let possible_edges = if size <= 1 { 1 } else { size * (size - 1) / 2 };
        let cohesion = actual_edges as f64 / possible_edges as f64;

        let mut subject_counts: HashMap<String, usize> = HashMap::new();
        let mut fact_ids = Vec::new();
        let mut confidence_sum = 0.0;
        let mut fact_count = 0i64;
        for &idx in &members {
            for row in &index_rows[idx] {
                *subject_counts.entry(row.subject.clone()).or_default() += 1;
                fact_ids.push(row.fact_id);
                confidence_sum += row.confidence;
                fact_count += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = subject_counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let name = ranked.first().map(|(s, _)| s.clone()).unwrap_or_default();
        let top_subjects: Vec<String> = ranked.iter().take(MAX_ALIASES).map(|(s, _)| s.clone()).collect();
        let aliases: Vec<String> = ranked
            .iter()
            .filter(|(s, _)| *s != name)
            .take(MAX_ALIASES)
            .map(|(s, _)| s.clone())
            .collect();

        result.push(ClusterComputation {
            name,
            aliases,
            top_subjects,
            cohesion,
            fact_count,
            avg_confidence: if fact_count > 0 { confidence_sum / fact_count as f64 } else { 0.0 },
            fact_ids,
        });
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fact_id: i64, memory_id: i64, subject: &str, confidence: f64) -> FactSubjectRow {
        FactSubjectRow {
            fact_id,
            memory_id,
            subject: subject.to_string(),
            confidence,
        }
    }

    #[test]
    fn blank_subjects_are_skipped() {
        let rows = vec![row(1, 1, "", 1.0)];
        assert!(compute_clusters(&rows).is_empty());
    }

    #[test]
    fn singleton_subject_has_full_cohesion() {
        let rows = vec![row(1, 1, "Quinn", 1.0)];
        let clusters = compute_clusters(&rows);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].cohesion, 1.0);
    }

    #[test]
    fn co_occurring_subjects_form_one_component() {
        let rows = vec![row(1, 1, "Quinn", 1.0), row(2, 1, "Philadelphia", 0.8)];
        let clusters = compute_clusters(&rows);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].fact_count, 2);
        assert_eq!(clusters[0].cohesion, 1.0);
    }

    #[test]
    fn disjoint_memories_form_separate_components() {
        let rows = vec![row(1, 1, "Quinn", 1.0), row(2, 2, "Avery", 1.0)];
        let clusters = compute_clusters(&rows);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn canonical_name_is_most_frequent_subject_spelling() {
        let rows = vec![row(1, 1, "quinn", 1.0), row(2, 1, "Quinn", 1.0), row(3, 1, "Quinn", 1.0)];
        let clusters = compute_clusters(&rows);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].name, "Quinn");
        assert!(clusters[0].aliases.contains(&"quinn".to_string()));
    }

    #[test]
    fn tie_breaks_name_alphabetically() {
        let rows = vec![row(1, 1, "Zebra", 1.0), row(2, 1, "Apple", 1.0)];
        let clusters = compute_clusters(&rows);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].name, "Apple");
    }
}
