use crate::field::DisplacementField;

/// Fill invalid nodes from valid neighbors within `radius` lattice steps.
///
/// Writes a new field: each invalid node with at least one valid neighbor
/// inside the radius receives the inverse-distance-weighted mean offset
/// (and quality) of those neighbors. Nodes with no valid neighbor stay
/// invalid, and valid nodes are never touched.
pub fn fill_holes(field: &DisplacementField, radius: usize) -> DisplacementField {
    let mut out = field.clone();
    if radius == 0 {
        return out;
    }
    let r = radius as i64;
    let r_sq = (radius * radius) as f64;

    for row in 0..field.rows() {
        for col in 0..field.cols() {
            if field.node(row, col).valid {
                continue;
            }
            let mut sum_az = 0.0;
            let mut sum_rg = 0.0;
            let mut sum_quality = 0.0;
            let mut sum_weight = 0.0;
            for dr in -r..=r {
                for dc in -r..=r {
                    if dr == 0 && dc == 0 {
                        continue;
                    }
                    let dist_sq = (dr * dr + dc * dc) as f64;
                    if dist_sq > r_sq {
                        continue;
                    }
                    let nr = row as i64 + dr;
                    let nc = col as i64 + dc;
                    if nr < 0 || nc < 0 || nr >= field.rows() as i64 || nc >= field.cols() as i64
                    {
                        continue;
                    }
                    let neighbor = field.node(nr as usize, nc as usize);
                    if !neighbor.valid {
                        continue;
                    }
                    let weight = 1.0 / dist_sq.sqrt();
                    sum_az += weight * neighbor.offset.0;
                    sum_rg += weight * neighbor.offset.1;
                    sum_quality += weight * neighbor.quality;
                    sum_weight += weight;
                }
            }
            if sum_weight > 0.0 {
                let node = out.node_mut(row, col);
                node.offset = (sum_az / sum_weight, sum_rg / sum_weight);
                node.quality = sum_quality / sum_weight;
                node.valid = true;
            }
        }
    }
    out
}

/// Smooth valid offsets with a box mean over valid neighbors.
///
/// Writes a new field: each valid node's offset becomes the unweighted mean
/// over the valid nodes in its `box_size` x `box_size` neighborhood
/// (itself included). Invalid nodes neither contribute nor receive.
pub fn spatial_average(field: &DisplacementField, box_size: usize) -> DisplacementField {
    let mut out = field.clone();
    if box_size <= 1 {
        return out;
    }
    let half = (box_size / 2) as i64;

    for row in 0..field.rows() {
        for col in 0..field.cols() {
            if !field.node(row, col).valid {
                continue;
            }
            let mut sum_az = 0.0;
            let mut sum_rg = 0.0;
            let mut count = 0usize;
            for dr in -half..=half {
                for dc in -half..=half {
                    let nr = row as i64 + dr;
                    let nc = col as i64 + dc;
                    if nr < 0 || nc < 0 || nr >= field.rows() as i64 || nc >= field.cols() as i64
                    {
                        continue;
                    }
                    let neighbor = field.node(nr as usize, nc as usize);
                    if !neighbor.valid {
                        continue;
                    }
                    sum_az += neighbor.offset.0;
                    sum_rg += neighbor.offset.1;
                    count += 1;
                }
            }
            if count > 0 {
                out.node_mut(row, col).offset =
                    (sum_az / count as f64, sum_rg / count as f64);
            }
        }
    }
    out
}
