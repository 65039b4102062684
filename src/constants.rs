//! # Constants
//!
//! Built-in defaults for the dashboard: the variable filter table, the regions
//! of interest offered for the correlation heatmap, routing values for the
//! remote algorithms and the synthetic dataset shown before login.

/// Variable shown before any real variable is selected
pub const PLACEHOLDER_VARIABLE: &str = "Not an actual variable";

/// Suffix the count algorithm appends to each variable in its result payload
pub const COUNT_KEY_SUFFIX: &str = "_count";

/// Side length of the synthetic correlation matrix seeded at startup
pub const PLACEHOLDER_HEATMAP_SIZE: usize = 10;

/// Known variables: (predicate, display label, allowed category codes)
pub const DEFAULT_VARIABLES: &[(&str, &str, &[&str])] = &[
    ("roo:P100018", "Gender", &["C16576", "C20197"]),
    (
        "roo:P100244",
        "T-stage",
        &["C48719", "C48720", "C48724", "C48728", "C48732"],
    ),
    (
        "roo:P100242",
        "N-stage",
        &["C48705", "C48706", "C48786", "C48714"],
    ),
    ("roo:P100241", "M-stage", &["C48699", "C48700"]),
    ("roo:P100254", "Survival Status", &["C28554", "C37987"]),
    ("roo:P100022", "HPV Status", &["C128839", "C131488"]),
    (
        "roo:P100219",
        "AJCC Stage",
        &["C27966", "C28054", "C27970", "C27971"],
    ),
    (
        "roo:P100202",
        "Tumour Location",
        &["C12762", "C12246", "C12420", "C12423"],
    ),
    ("roo:P100231", "Therapy given", &["C94626", "C15313"]),
];

/// Regions of interest: (display label, region code)
pub const DEFAULT_REGIONS: &[(&str, &str)] = &[("GTV Primary", "GTV-1"), ("GTV Node", "GTV-2")];

/// Region used for the heatmap when no organisation is selected
pub const DEFAULT_REGION: &str = "GTV-1";

/// Placeholder counts: (category, value)
pub const PLACEHOLDER_COUNTS: &[(&str, f64)] = &[("0.0", 2.0), ("1.0", 4.0)];

pub mod routing {
    pub const COLLABORATION_ID: i64 = 1;
    pub const AGGREGATING_ORGANISATION_ID: i64 = 2;
    pub const COUNT_IMAGE: &str = "varshagouthamchand/count_pie_sparql:latest";
    pub const HEATMAP_IMAGE: &str = "varshagouthamchand/v6_hm";
    pub const DATA_FORMAT: &str = "json";
    pub const DATABASE: &str = "rdf";
    pub const MASTER_METHOD: &str = "master";
}

pub mod heatmap {
    pub const EXPLANATORY_VARIABLES: &[&str] = &[
        "Fmorph.pca.elongation",
        "Fmorph.pca.flatness",
        "Fmorph.diam",
    ];
    pub const CENSOR_COLUMN: &str = "censor";
}

pub mod polling {
    pub const INTERVAL_MS: u64 = 3_000;
    pub const MAX_INTERVAL_MS: u64 = 30_000;
    pub const BACKOFF_MULTIPLIER: f64 = 1.0;
    pub const TIMEOUT_SECONDS: u64 = 600;
}
