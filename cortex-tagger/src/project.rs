use cortex_core::config::TaggerConfig;

/// A path-based project rule: `project` is assigned when `source_file`
/// contains any of `substrings` (case-insensitive).
#[derive(Debug, Clone)]
pub struct PathRule {
    pub project: String,
    pub substrings: Vec<String>,
}

impl PathRule {
    pub fn new(project: impl Into<String>, substrings: Vec<String>) -> Self {
        Self { project: project.into(), substrings }
    }
}

/// A content-based project rule: `project` is assigned when at least
/// `min_hits` distinct `keywords` appear in the memory's content.
#[derive(Debug, Clone)]
pub struct ContentRule {
    pub project: String,
    pub keywords: Vec<String>,
}

impl ContentRule {
    pub fn new(project: impl Into<String>, keywords: Vec<String>) -> Self {
        Self { project: project.into(), keywords }
    }
}

/// Case-insensitive substring match on the normalized path; the first rule
/// with a matching substring wins.
pub fn infer_project(source_file: &str, path_rules: &[PathRule]) -> Option<String> {
    let path_lower = source_file.to_lowercase();
    path_rules
        .iter()
        .find(|rule| rule.substrings.iter().any(|s| path_lower.contains(&s.to_lowercase())))
        .map(|rule| rule.project.clone())
}

/// Counts distinct keyword hits per rule (case-insensitive substring); a
/// rule fires once its hit count reaches `min_hits`. The firing rule with
/// the most hits wins; ties go to whichever rule appears first.
pub fn infer_project_from_content(content: &str, content_rules: &[ContentRule], config: &TaggerConfig) -> Option<String> {
    let content_lower = content.to_lowercase();
    let mut best: Option<(&ContentRule, usize)> = None;

    for rule in content_rules {
        let hits = rule.keywords.iter().filter(|k| content_lower.contains(k.to_lowercase().as_str())).count();
        if hits < config.content_rule_min_hits {
            continue;
        }
        match best {
            Some((_, best_hits)) if hits <= best_hits => {}
            _ => best = Some((rule, hits)),
        }
    }

    best.map(|(rule, _)| rule.project.clone())
}

/// Path rules first; content rules as a fallback when no path rule matches.
pub fn infer_project_full(
    source_file: &str,
    content: &str,
    path_rules: &[PathRule],
    content_rules: &[ContentRule],
    config: &TaggerConfig,
) -> Option<String> {
    infer_project(source_file, path_rules).or_else(|| infer_project_from_content(content, content_rules, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_rule_matches_case_insensitively() {
        let rules = vec![PathRule::new("cortex", vec!["cortex-core".to_string()])];
        assert_eq!(infer_project("/repo/CORTEX-CORE/src/lib.rs", &rules), Some("cortex".to_string()));
    }

    #[test]
    fn first_matching_path_rule_wins() {
        let rules = vec![
            PathRule::new("a", vec!["src".to_string()]),
            PathRule::new("b", vec!["src".to_string()]),
        ];
        assert_eq!(infer_project("/repo/src/lib.rs", &rules), Some("a".to_string()));
    }

    #[test]
    fn no_path_rule_matches_returns_none() {
        let rules = vec![PathRule::new("a", vec!["nope".to_string()])];
        assert_eq!(infer_project("/repo/src/lib.rs", &rules), None);
    }

    #[test]
    fn content_rule_requires_min_hits() {
        let config = TaggerConfig { content_rule_min_hits: 2 };
        let rules = vec![ContentRule::new("infra", vec!["deploy".to_string(), "outage".to_string(), "rollback".to_string()])];
        assert_eq!(infer_project_from_content("a deploy happened", &rules, &config), None);
        assert_eq!(infer_project_from_content("a deploy then an outage", &rules, &config), Some("infra".to_string()));
    }

    #[test]
    fn highest_hit_count_wins_ties_broken_by_order() {
        let config = TaggerConfig { content_rule_min_hits: 1 };
        let rules = vec![
            ContentRule::new("a", vec!["x".to_string()]),
            ContentRule::new("b", vec!["x".to_string(), "y".to_string()]),
        ];
        assert_eq!(infer_project_from_content("x y", &rules, &config), Some("b".to_string()));

        let tied_rules = vec![
            ContentRule::new("first", vec!["x".to_string()]),
            ContentRule::new("second", vec!["x".to_string()]),
        ];
        assert_eq!(infer_project_from_content("x", &tied_rules, &config), Some("first".to_string()));
    }

    #[test]
    fn full_inference_falls_back_to_content() {
        let config = TaggerConfig { content_rule_min_hits: 1 };
        let path_rules = vec![PathRule::new("a", vec!["nope".to_string()])];
        let content_rules = vec![ContentRule::new("infra", vec!["outage".to_string()])];
        assert_eq!(
            infer_project_full("/repo/misc.md", "there was an outage", &path_rules, &content_rules, &config),
            Some("infra".to_string())
        );
    }
}
