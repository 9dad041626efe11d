use crate::error::{DriftscanError, Result};

/// A closed polygon region in ground coordinates.
///
/// Only the outer ring is kept; stages clip against the bounding box.
#[derive(Clone, Debug, PartialEq)]
pub struct GeoRegion {
    vertices: Vec<(f64, f64)>,
}

impl GeoRegion {
    pub fn new(vertices: Vec<(f64, f64)>) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(DriftscanError::Input(format!(
                "region polygon needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        Ok(Self { vertices })
    }

    /// Parse a WKT `POLYGON ((x y, x y, ...))` outer ring.
    pub fn from_wkt(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let upper = trimmed.to_ascii_uppercase();
        if !upper.starts_with("POLYGON") {
            return Err(DriftscanError::Input(format!(
                "expected WKT POLYGON, got '{}'",
                truncate(trimmed)
            )));
        }
        let open = trimmed.find("((").ok_or_else(|| {
            DriftscanError::Input(format!("malformed WKT polygon '{}'", truncate(trimmed)))
        })?;
        let close = trimmed.rfind("))").ok_or_else(|| {
            DriftscanError::Input(format!("malformed WKT polygon '{}'", truncate(trimmed)))
        })?;
        if close <= open {
            return Err(DriftscanError::Input(format!(
                "malformed WKT polygon '{}'",
                truncate(trimmed)
            )));
        }
        // First ring only; inner rings (after "),(") are ignored.
        let rings = &trimmed[open + 2..close];
        let outer = rings.split(')').next().unwrap_or("");

        let mut vertices = Vec::new();
        for pair in outer.split(',') {
            let mut parts = pair.split_whitespace();
            let x = parts.next().and_then(|p| p.parse::<f64>().ok());
            let y = parts.next().and_then(|p| p.parse::<f64>().ok());
            match (x, y) {
                (Some(x), Some(y)) => vertices.push((x, y)),
                _ => {
                    return Err(DriftscanError::Input(format!(
                        "malformed WKT coordinate pair '{}'",
                        pair.trim()
                    )))
                }
            }
        }
        // WKT closes the ring by repeating the first vertex.
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        Self::new(vertices)
    }

    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.vertices
    }

    /// Axis-aligned bounding box as (min_x, min_y, max_x, max_y).
    pub fn bounding_box(&self) -> (f64, f64, f64, f64) {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for &(x, y) in &self.vertices {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        (min_x, min_y, max_x, max_y)
    }
}

fn truncate(s: &str) -> String {
    if s.len() > 48 {
        format!("{}...", &s[..48])
    } else {
        s.to_string()
    }
}
