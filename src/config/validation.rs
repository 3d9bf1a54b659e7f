use super::schema::Config;

/// Validate configuration at startup.
/// Returns all validation errors at once (not just the first).
pub fn validate_config(config: &Config) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.training_years.is_empty() {
        errors.push("training_years: must contain at least one year".to_string());
    }

    if config.all_years.is_empty() {
        errors.push("all_years: must contain at least one year".to_string());
    }

    // Training years are scored too (N+1 strategy)
    for year in &config.training_years {
        if !config.all_years.contains(year) {
            errors.push(format!("training_years: {} is not listed in all_years", year));
        }
    }

    for (field, value) in [
        ("unit_key", &config.unit_key),
        ("strata_key", &config.strata_key),
        ("year_key", &config.year_key),
    ] {
        if value.trim().is_empty() {
            errors.push(format!("{}: must not be empty", field));
        }
    }

    if config.unit_key == config.strata_key {
        errors.push("strata_key: must differ from unit_key".to_string());
    }

    if let Err(e) = config.schema() {
        for problem in e.problems {
            errors.push(format!("indicators: {}", problem));
        }
    }

    let keys = [&config.unit_key, &config.strata_key, &config.year_key];
    for (i, spec) in config.indicators.iter().enumerate() {
        if keys.contains(&&spec.name) {
            errors.push(format!(
                "indicators[{}].name: '{}' collides with a key column",
                i, spec.name
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
