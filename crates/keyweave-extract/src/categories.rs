//! Keyword → category classification by lookup table and certification patterns.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Classification tag stored in `job_keywords.category`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    TechnicalSkill,
    SoftSkill,
    Tool,
    Certification,
}

impl Category {
    pub fn all() -> &'static [Category] {
        &[
            Self::TechnicalSkill,
            Self::SoftSkill,
            Self::Tool,
            Self::Certification,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TechnicalSkill => "technical_skill",
            Self::SoftSkill => "soft_skill",
            Self::Tool => "tool",
            Self::Certification => "certification",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category: {}", s))
    }
}

static CERTIFICATION_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(certified|certification|certificate|licensed)\b|^(pmp|cissp|cism|cisa|ccna|ccnp|cka|ckad|cpa|cfa|csm|itil|security\+|comptia\b.*)$",
    )
    .ok()
});

/// Normalized keyword → category.
static KEYWORD_MAP: Lazy<HashMap<&'static str, Category>> = Lazy::new(|| {
    let mut m = HashMap::new();
    // Technical skills
    for kw in &[
        "python", "sql", "rust", "java", "javascript", "typescript", "go", "golang",
        "c", "c++", "c#", "ruby", "scala", "kotlin", "swift", "php", "r", "html", "css",
        "machine learning", "deep learning", "data analysis", "data science",
        "statistics", "nlp", "computer vision", "distributed systems",
        "systems programming", "algorithms", "data structures", "rest", "graphql",
        "microservices", "devops", "ci/cd", "etl", "data modeling", "networking",
        "security", "cloud computing", "backend", "frontend", "react", "django",
        "flask", "spring", "node.js", "pandas", "numpy", "pytorch", "tensorflow",
    ] {
        m.insert(*kw, Category::TechnicalSkill);
    }
    // Tools and platforms
    for kw in &[
        "docker", "kubernetes", "git", "github", "gitlab", "jira", "confluence",
        "jenkins", "terraform", "ansible", "aws", "azure", "gcp", "excel", "tableau",
        "power bi", "figma", "postgresql", "postgres", "mysql", "mongodb", "redis",
        "kafka", "spark", "hadoop", "airflow", "snowflake", "linux", "salesforce",
        "slack", "vs code", "grafana", "prometheus", "elasticsearch",
    ] {
        m.insert(*kw, Category::Tool);
    }
    // Soft skills
    for kw in &[
        "communication", "leadership", "teamwork", "collaboration", "problem solving",
        "critical thinking", "time management", "mentoring", "ownership",
        "adaptability", "creativity", "presentation", "negotiation",
        "stakeholder management", "attention to detail", "project management",
        "customer focus", "self-motivated", "organization",
    ] {
        m.insert(*kw, Category::SoftSkill);
    }
    m
});

/// Classify a normalized keyword. Unknown keywords get no category.
pub fn classify_keyword(text: &str) -> Option<Category> {
    if CERTIFICATION_PATTERN
        .as_ref()
        .is_some_and(|re| re.is_match(text))
    {
        return Some(Category::Certification);
    }
    KEYWORD_MAP.get(text).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(classify_keyword("python"), Some(Category::TechnicalSkill));
        assert_eq!(classify_keyword("docker"), Some(Category::Tool));
        assert_eq!(classify_keyword("leadership"), Some(Category::SoftSkill));
        assert_eq!(classify_keyword("basket weaving"), None);
    }

    #[test]
    fn test_certifications() {
        assert_eq!(
            classify_keyword("aws certified solutions architect"),
            Some(Category::Certification)
        );
        assert_eq!(classify_keyword("pmp"), Some(Category::Certification));
        assert_eq!(classify_keyword("comptia a+"), Some(Category::Certification));
        // Bare platform names stay tools
        assert_eq!(classify_keyword("aws"), Some(Category::Tool));
    }

    #[test]
    fn test_round_trip_names() {
        for c in Category::all() {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), *c);
        }
        assert!("hobby".parse::<Category>().is_err());
    }
}
