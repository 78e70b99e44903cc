//! Static description of the WebMD site structure.
//!
//! The tables are ordered: the first section whose base path matches a URL
//! decides the outcome, and content types are only consulted when no section
//! matched.

/// Host names that belong to the WebMD family of sites.
pub const SITE_DOMAINS: &[&str] = &[
    "www.webmd.com",
    "www.webmd.boots.com",
    "www.webmd.com.cn",
    "www.webmd.com.hk",
    "www.webmd.com.tw",
];

/// A top-level section with the sub-paths it is known to serve.
#[derive(Debug)]
pub struct Section {
    pub name: &'static str,
    pub base_url: &'static str,
    pub valid_paths: &'static [&'static str],
}

/// A content type recognised by a marker substring anywhere in the URL.
#[derive(Debug)]
pub struct ContentType {
    pub name: &'static str,
    pub base_url: &'static str,
    pub markers: &'static [&'static str],
}

pub const SECTIONS: &[Section] = &[
    Section {
        name: "conditions",
        base_url: "https://www.webmd.com/conditions",
        valid_paths: &[
            "add-adhd",
            "allergies",
            "arthritis",
            "atrial-fibrillation",
            "breast-cancer",
            "cancer",
            "crohns-disease",
            "depression",
            "diabetes",
            "dvt",
            "eczema",
            "eye-health",
            "heart-disease",
            "hiv-aids",
            "lung-disease",
            "lupus",
            "mental-health",
            "multiple-sclerosis",
            "migraine",
            "pain-management",
            "psoriasis",
            "psoriatic-arthritis",
            "rheumatoid-arthritis",
            "sexual-conditions",
            "skin-problems",
            "sleep-disorders",
            "ulcerative-colitis",
        ],
    },
    Section {
        name: "drugs",
        base_url: "https://www.webmd.com/drugs",
        valid_paths: &["index-drugs", "pill-identifier", "interaction-checker"],
    },
    Section {
        name: "well-being",
        base_url: "https://www.webmd.com/well-being",
        valid_paths: &[
            "aging-well",
            "baby",
            "birth-control",
            "childrens-health",
            "diet-weight-management",
            "fitness-exercise",
            "food-recipes",
            "health-balance",
            "healthy-beauty",
            "mens-health",
            "parenting",
            "pet-health",
            "pregnancy",
            "sex-relationships",
            "teen-health",
            "womens-health",
        ],
    },
    Section {
        name: "tools",
        base_url: "https://www.webmd.com/tools",
        valid_paths: &[
            "symptom-checker",
            "find-a-doctor",
            "bmi-calculator",
            "ovulation-calculator",
            "cold-flu-map",
            "pill-identifier",
            "drugs-interaction-checker",
            "cat-health-tool",
            "dog-health-tool",
            "due-date-calculator",
            "fitness-calorie-counter",
            "kids-bmi",
            "visual-pregnancy-timeline",
        ],
    },
    // Topic hubs targeted by the link injector.
    Section {
        name: "symptom-checker",
        base_url: "https://www.webmd.com/symptom-checker",
        valid_paths: &[],
    },
    Section {
        name: "diet",
        base_url: "https://www.webmd.com/diet",
        valid_paths: &["features"],
    },
    Section {
        name: "fitness-exercise",
        base_url: "https://www.webmd.com/fitness-exercise",
        valid_paths: &["features"],
    },
    Section {
        name: "mental-health",
        base_url: "https://www.webmd.com/mental-health",
        valid_paths: &["features"],
    },
    Section {
        name: "children",
        base_url: "https://www.webmd.com/children",
        valid_paths: &["features"],
    },
    Section {
        name: "women",
        base_url: "https://www.webmd.com/women",
        valid_paths: &["features"],
    },
    Section {
        name: "men",
        base_url: "https://www.webmd.com/men",
        valid_paths: &["features"],
    },
];

pub const CONTENT_TYPES: &[ContentType] = &[
    ContentType {
        name: "articles",
        base_url: "https://www.webmd.com",
        markers: &["/default.htm", "/default.aspx"],
    },
    ContentType {
        name: "slideshows",
        base_url: "https://www.webmd.com",
        markers: &["/ss/slideshow-"],
    },
    ContentType {
        name: "news",
        base_url: "https://www.webmd.com/news",
        markers: &["/default.htm"],
    },
];

/// True when the URL mentions any host of the WebMD family.
pub fn is_site_url(url: &str) -> bool {
    SITE_DOMAINS.iter().any(|domain| url.contains(domain))
}

/// Check a cleaned URL against the known section and content-type layout.
///
/// The first matching section answers on its own; content types are a
/// fallback for URLs outside every section, and likewise the first content
/// type whose base matches answers.
pub fn validate_structure(url: &str) -> bool {
    let url = url.strip_prefix('@').unwrap_or(url).trim();

    for section in SECTIONS {
        if let Some(rest) = under_base(url, section.base_url) {
            // Landing page of the section itself.
            if rest.is_empty() {
                return true;
            }
            let segment = rest.split('/').nth(1).unwrap_or_default();
            return section.valid_paths.contains(&segment);
        }
    }

    for content_type in CONTENT_TYPES {
        if url.starts_with(content_type.base_url) {
            return content_type.markers.iter().any(|marker| url.contains(marker));
        }
    }

    false
}

/// The remainder of `url` after `base`, if `url` lies under `base` on a path
/// boundary.
fn under_base<'a>(url: &'a str, base: &str) -> Option<&'a str> {
    let rest = url.strip_prefix(base)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}
