//! Setting value validation.

/// Validate a setting value. Returns `Ok(())` if valid, or an error message.
pub fn validate_setting(key: &str, value: &str) -> Result<(), String> {
    match key {
        "TAB_COUNT" => validate_int_range(value, 1, 16)?,
        "LIVENESS_INTERVAL_MS" => validate_int_range(value, 100, 60_000)?,
        "STALE_LEADER_AFTER_MS" => {
            let v: i64 = value.parse().map_err(|_| "must be an integer")?;
            if v != 0 && !(1_000..=3_600_000).contains(&v) {
                return Err("must be 0 (disabled) or between 1000 and 3600000".into());
            }
        }
        "DEFAULT_CLIP_MS" => validate_int_range(value, 100, 60_000)?,
        "BUS_CAPACITY" => validate_int_range(value, 16, 8192)?,
        "SOUNDS_DIR" => {
            if value.len() > 1024 {
                return Err("path must be at most 1024 characters".into());
            }
        }
        _ => {}
    }
    Ok(())
}

fn validate_int_range(value: &str, min: i64, max: i64) -> Result<(), String> {
    let v: i64 = value.parse().map_err(|_| "must be an integer")?;
    if !(min..=max).contains(&v) {
        return Err(format!("must be between {min} and {max}"));
    }
    Ok(())
}
