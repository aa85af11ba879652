//! The fixed humanitarian category set.
//!
//! Charities, users, and articles are all bucketed into the same fixed
//! list of cause labels. The list is deliberately closed: category
//! embeddings are computed once at load time and matching is always a
//! nearest-neighbor query against these labels, never free-form.

/// The fixed humanitarian cause labels.
pub const CATEGORIES: [&str; 14] = [
    "Disaster Relief",
    "Education Support",
    "Healthcare Access",
    "Food Security",
    "Refugee Assistance",
    "Child Welfare",
    "Environmental Conservation",
    "Women's Empowerment",
    "Housing & Shelter",
    "Clean Water Access",
    "Mental Health Support",
    "Poverty Alleviation",
    "Human Rights",
    "Community Development",
];

/// Returns true if `name` is one of the fixed category labels.
pub fn is_category(name: &str) -> bool {
    CATEGORIES.iter().any(|c| *c == name)
}
