//! Post-processing of model replies: keep only verified WebMD links and attach
//! a topic link to paragraphs that have none.

use futures::future::join_all;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::constants::SITE_ROOT;
use crate::formatter::format_url;
use crate::probe::UrlProber;
use crate::sitemap::SitemapCache;
use crate::taxonomy::is_site_url;

lazy_static::lazy_static! {
    // Markdown link target in group 2, bare URL in group 3.
    static ref URL_PATTERN: Regex =
        Regex::new(r"\[([^\]]+)\]\(([^)]+)\)|(https?://[^\s]+)").expect("url regex is valid");
    static ref EXCESS_NEWLINES: Regex = Regex::new(r"\n{3,}").expect("newline regex is valid");
}

const CONDITIONS_HUB: &str = "https://www.webmd.com/conditions";
const CONDITIONS_LABEL: &str = "Comprehensive Health Conditions Guide";

/// Keyword to hub page. Scanned in order; the first keyword found wins.
pub const TOPIC_LINKS: &[(&str, &str)] = &[
    ("symptoms", "https://www.webmd.com/symptom-checker"),
    ("conditions", CONDITIONS_HUB),
    ("diabetes", CONDITIONS_HUB),
    ("arthritis", CONDITIONS_HUB),
    ("allergies", CONDITIONS_HUB),
    ("migraine", CONDITIONS_HUB),
    ("asthma", CONDITIONS_HUB),
    ("eczema", CONDITIONS_HUB),
    ("psoriasis", CONDITIONS_HUB),
    ("lupus", CONDITIONS_HUB),
    ("heart disease", CONDITIONS_HUB),
    ("cancer", CONDITIONS_HUB),
    ("medications", "https://www.webmd.com/drugs"),
    ("drugs", "https://www.webmd.com/drugs"),
    ("diet", "https://www.webmd.com/diet"),
    ("nutrition", "https://www.webmd.com/diet"),
    ("exercise", "https://www.webmd.com/fitness-exercise"),
    ("fitness", "https://www.webmd.com/fitness-exercise"),
    ("mental health", "https://www.webmd.com/mental-health"),
    ("depression", "https://www.webmd.com/mental-health"),
    ("anxiety", "https://www.webmd.com/mental-health"),
    ("children", "https://www.webmd.com/children"),
    ("kids", "https://www.webmd.com/children"),
    ("pediatric", "https://www.webmd.com/children"),
    ("women", "https://www.webmd.com/women"),
    ("pregnancy", "https://www.webmd.com/women"),
    ("menopause", "https://www.webmd.com/women"),
    ("men", "https://www.webmd.com/men"),
    ("prostate", "https://www.webmd.com/men"),
    ("testosterone", "https://www.webmd.com/men"),
];

/// Keyword to human-readable link text, matched against the topic keyword.
pub const LINK_LABELS: &[(&str, &str)] = &[
    ("symptoms", "Understanding Symptoms and Conditions"),
    ("conditions", CONDITIONS_LABEL),
    ("diabetes", CONDITIONS_LABEL),
    ("arthritis", CONDITIONS_LABEL),
    ("allergies", CONDITIONS_LABEL),
    ("migraine", CONDITIONS_LABEL),
    ("asthma", CONDITIONS_LABEL),
    ("eczema", CONDITIONS_LABEL),
    ("psoriasis", CONDITIONS_LABEL),
    ("lupus", CONDITIONS_LABEL),
    ("heart disease", CONDITIONS_LABEL),
    ("cancer", CONDITIONS_LABEL),
    ("medications", "Understanding Medications and Treatments"),
    ("drugs", "Understanding Medications and Treatments"),
    ("diet", "Nutrition and Diet Information"),
    ("nutrition", "Nutrition and Diet Information"),
    ("exercise", "Fitness and Exercise Resources"),
    ("fitness", "Fitness and Exercise Resources"),
    ("mental health", "Mental Health and Wellness Guide"),
    ("depression", "Understanding Depression"),
    ("anxiety", "Understanding Anxiety"),
    ("children", "Children's Health Information"),
    ("kids", "Children's Health Information"),
    ("pediatric", "Pediatric Health Resources"),
    ("women", "Women's Health Information"),
    ("pregnancy", "Pregnancy and Parenting Guide"),
    ("menopause", "Understanding Menopause"),
    ("men", "Men's Health Information"),
    ("prostate", "Understanding Prostate Health"),
    ("testosterone", "Understanding Testosterone and Men's Health"),
];

pub const DEFAULT_LINK_LABEL: &str = "Learn More About This Topic";

pub fn link_label(topic: &str) -> &'static str {
    let topic = topic.to_lowercase();
    LINK_LABELS
        .iter()
        .find(|(key, _)| topic.contains(key))
        .map(|(_, label)| *label)
        .unwrap_or(DEFAULT_LINK_LABEL)
}

/// Raw WebMD-family URLs in `text`, from markdown links or bare URLs, in
/// order of appearance.
pub fn extract_site_urls(text: &str) -> Vec<String> {
    URL_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(2).or_else(|| caps.get(3)))
        .map(|m| m.as_str())
        .filter(|url| is_site_url(url))
        .map(str::to_string)
        .collect()
}

pub struct LinkInjector {
    prober: Arc<dyn UrlProber>,
    sitemap: Arc<SitemapCache>,
}

impl LinkInjector {
    pub fn new(prober: Arc<dyn UrlProber>, sitemap: Arc<SitemapCache>) -> Self {
        Self { prober, sitemap }
    }

    pub fn sitemap(&self) -> &SitemapCache {
        &self.sitemap
    }

    /// Canonical forms of the WebMD links already present in `text`. Links
    /// that fail formatting are dropped silently.
    pub async fn extract_and_clean_urls(&self, text: &str) -> Vec<String> {
        let mut urls = Vec::new();
        for raw in extract_site_urls(text) {
            if let Some(cleaned) = format_url(&raw, self.prober.as_ref()).await {
                urls.push(cleaned);
            }
        }
        urls
    }

    /// Attach a verified topic link to every paragraph without one.
    ///
    /// Paragraphs are handled concurrently; the probes for one paragraph run
    /// one after another.
    #[instrument(skip_all, fields(len = response.len()))]
    pub async fn augment(&self, response: &str) -> String {
        let existing = self.extract_and_clean_urls(response).await;
        debug!(?existing, "Verified links already in response");

        let paragraphs = join_all(
            response
                .split("\n\n")
                .map(|paragraph| self.augment_paragraph(paragraph, &existing)),
        )
        .await;

        let joined = paragraphs.join("\n\n");
        let formatted = EXCESS_NEWLINES.replace_all(&joined, "\n\n");
        let formatted = formatted.trim();

        // "[Source]" markers are meaningless without any link to point at.
        if !formatted.contains(SITE_ROOT) {
            return formatted.replace("[Source]", "").trim().to_string();
        }
        formatted.to_string()
    }

    async fn augment_paragraph(&self, paragraph: &str, existing: &[String]) -> String {
        if existing.iter().any(|url| paragraph.contains(url.as_str())) {
            return paragraph.to_string();
        }

        let lower = paragraph.to_lowercase();
        for (keyword, url) in TOPIC_LINKS {
            if !lower.contains(keyword) {
                continue;
            }
            if let Some(formatted) = format_url(url, self.prober.as_ref()).await {
                if self.sitemap.is_known(&formatted) {
                    debug!(keyword, %formatted, "Attaching topic link");
                    return format!("{}\n\n{}: {}", paragraph, link_label(keyword), formatted);
                }
            }
        }

        paragraph.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;

    struct StubProber {
        accessible: HashSet<String>,
    }

    #[async_trait]
    impl UrlProber for StubProber {
        async fn is_accessible(&self, url: &str) -> bool {
            self.accessible.contains(url)
        }
    }

    fn injector(accessible: &[&str], known: &[&str]) -> LinkInjector {
        let prober = StubProber {
            accessible: accessible.iter().map(|s| s.to_string()).collect(),
        };
        LinkInjector::new(
            Arc::new(prober),
            Arc::new(SitemapCache::from_urls(known.iter().copied())),
        )
    }

    #[test]
    fn test_link_label_priority() {
        assert_eq!(link_label("conditions"), "Comprehensive Health Conditions Guide");
        assert_eq!(link_label("diabetes"), "Comprehensive Health Conditions Guide");
        assert_eq!(link_label("menopause"), "Understanding Menopause");
        assert_eq!(link_label("women"), "Women's Health Information");
        assert_eq!(link_label("vitamins"), DEFAULT_LINK_LABEL);
    }

    #[test]
    fn test_extract_site_urls_markdown_and_bare() {
        let text = "Read [the guide](https://www.webmd.com/diet/features) or \
                    https://www.webmd.com/drugs/index-drugs. Also https://example.com/x";
        assert_eq!(
            extract_site_urls(text),
            vec![
                "https://www.webmd.com/diet/features".to_string(),
                "https://www.webmd.com/drugs/index-drugs.".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_extract_and_clean_yields_inner_url() {
        let injector = injector(
            &["https://www.webmd.com/diet/features", "https://www.webmd.com/men"],
            &[],
        );
        let text = "Meal ideas (https://www.webmd.com/diet/features) and \
                    [men's health](https://www.webmd.com/men).";
        assert_eq!(
            injector.extract_and_clean_urls(text).await,
            vec![
                "https://www.webmd.com/diet/features".to_string(),
                "https://www.webmd.com/men".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_extract_and_clean_drops_unverified() {
        let injector = injector(&[], &[]);
        let text = "See https://www.webmd.com/conditions/diabetes for more.";
        assert!(injector.extract_and_clean_urls(text).await.is_empty());
    }

    #[tokio::test]
    async fn test_diabetes_paragraph_gets_one_conditions_link() {
        let injector = injector(&[CONDITIONS_HUB], &[CONDITIONS_HUB]);
        let text = "Diabetes affects how your body uses blood sugar. Managing diabetes takes daily care.";

        let augmented = injector.augment(text).await;

        assert_eq!(
            augmented,
            format!(
                "{}\n\nComprehensive Health Conditions Guide: {}",
                text, CONDITIONS_HUB
            )
        );
        assert_eq!(augmented.matches(CONDITIONS_HUB).count(), 1);
    }

    #[tokio::test]
    async fn test_link_must_also_be_in_sitemap() {
        let injector = injector(&[CONDITIONS_HUB], &[]);
        let text = "Diabetes is common.";
        assert_eq!(injector.augment(text).await, text);
    }

    #[tokio::test]
    async fn test_falls_through_to_next_keyword_when_first_fails() {
        // "symptoms" matches first but its hub is not accessible.
        let fitness = "https://www.webmd.com/fitness-exercise";
        let injector = injector(&[fitness], &[fitness]);
        let text = "Symptoms improve with regular exercise.";
        assert_eq!(
            injector.augment(text).await,
            format!("{}\n\nFitness and Exercise Resources: {}", text, fitness)
        );
    }

    #[tokio::test]
    async fn test_paragraph_with_existing_link_is_left_alone() {
        let diet = "https://www.webmd.com/diet/features";
        let fitness = "https://www.webmd.com/fitness-exercise";
        let injector = injector(&[diet, fitness, "https://www.webmd.com/diet"], &[SITE_ROOT]);
        let text = format!("A balanced diet helps: {}\n\nExercise helps too.", diet);

        let augmented = injector.augment(&text).await;

        assert_eq!(
            augmented,
            format!(
                "A balanced diet helps: {}\n\nExercise helps too.\n\nFitness and Exercise Resources: {}",
                diet, fitness
            )
        );
    }

    #[tokio::test]
    async fn test_source_markers_removed_without_any_site_link() {
        let injector = injector(&[], &[]);
        let augmented = injector.augment("Drink plenty of water. [Source]").await;
        assert_eq!(augmented, "Drink plenty of water.");
    }

    #[tokio::test]
    async fn test_source_markers_kept_when_site_link_present() {
        let injector = injector(&[CONDITIONS_HUB], &[CONDITIONS_HUB]);
        let augmented = injector.augment("Lupus can flare. [Source]").await;
        assert!(augmented.contains("[Source]"));
        assert!(augmented.ends_with(CONDITIONS_HUB));
    }

    #[tokio::test]
    async fn test_excess_blank_lines_collapsed() {
        let injector = injector(&[], &[]);
        let augmented = injector.augment("\n\nFirst point.\n\n\n\n\nSecond point.\n\n").await;
        assert_eq!(augmented, "First point.\n\nSecond point.");
    }
}
