//! Regional cost-of-living and education income factors

/// Expense multiplier for a location; unknown locations get 1.0
pub fn cost_of_living_multiplier(location: &str) -> f64 {
    match location.trim() {
        "Zürich" | "Zurich" => 1.2,
        "Genf" | "Genève" | "Geneva" => 1.15,
        "Basel" => 1.1,
        "Bern" => 1.05,
        "Lausanne" => 1.08,
        "Luzern" => 1.0,
        "St. Gallen" => 0.95,
        "Winterthur" => 0.95,
        _ => 1.0,
    }
}

/// Income multiplier for an education level; unknown levels get 1.0
pub fn education_multiplier(education_level: &str) -> f64 {
    match education_level.trim() {
        "Sekundarstufe I" => 0.85,
        "Sekundarstufe II" => 1.0,
        "Tertiaerstufe" | "Tertiärstufe" => 1.35,
        _ => 1.0,
    }
}
