use crate::error::{RecommenderError, Result};
use crate::models::Rating;

/// Parses one line of a ratings file.
///
/// Returns `Ok(None)` for blank lines and `#` comments. Fields are
/// `user,item,value` with an optional trailing integer timestamp; the
/// delimiter is a comma, or a tab when the line contains no comma.
pub fn parse_record(line: &str, line_no: usize) -> Result<Option<Rating>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let delimiter = if trimmed.contains(',') { ',' } else { '\t' };
    let fields: Vec<&str> = trimmed.split(delimiter).map(str::trim).collect();

    if fields.len() < 3 || fields.len() > 4 {
        return Err(RecommenderError::malformed(
            line_no,
            format!("expected 3 or 4 fields, found {}", fields.len()),
        ));
    }

    let user_id = fields[0]
        .parse::<i64>()
        .map_err(|_| RecommenderError::malformed(line_no, format!("invalid user id {:?}", fields[0])))?;
    let item_id = fields[1]
        .parse::<i64>()
        .map_err(|_| RecommenderError::malformed(line_no, format!("invalid item id {:?}", fields[1])))?;
    let value = fields[2]
        .parse::<f64>()
        .map_err(|_| RecommenderError::malformed(line_no, format!("invalid rating value {:?}", fields[2])))?;

    if !value.is_finite() {
        return Err(RecommenderError::malformed(
            line_no,
            format!("rating value {:?} is not finite", fields[2]),
        ));
    }

    if let Some(timestamp) = fields.get(3) {
        timestamp.parse::<i64>().map_err(|_| {
            RecommenderError::malformed(line_no, format!("invalid timestamp {:?}", timestamp))
        })?;
    }

    Ok(Some(Rating::new(user_id, item_id, value)))
}
