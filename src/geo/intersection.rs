use super::{GeometryError, Point, codec};

// 容忍端点处的浮点误差（单位：度）
const TOLERANCE: f64 = 1e-9;

/// 判断两条编码路径是否有任意线段相交
///
/// 逐段两两比较，命中第一对相交线段即返回。平行（行列式为零）的线段一律
/// 视为不相交，包括共线重叠的情况。
pub fn intersects(path_a: &str, path_b: &str) -> Result<bool, GeometryError> {
    let a = codec::decode(path_a)?;
    let b = codec::decode(path_b)?;
    Ok(polylines_intersect(&a, &b))
}

pub fn polylines_intersect(a: &[Point], b: &[Point]) -> bool {
    if a.len() < 2 || b.len() < 2 {
        return false;
    }
    a.windows(2).any(|sa| {
        b.windows(2)
            .any(|sb| segments_intersect(sa[0], sa[1], sb[0], sb[1]))
    })
}

/// 把线段写成 a·x + b·y = c 的形式（x 为经度，y 为纬度）
fn line_equation(p: Point, q: Point) -> (f64, f64, f64) {
    let a = q.lat - p.lat;
    let b = p.lng - q.lng;
    let c = a * p.lng + b * p.lat;
    (a, b, c)
}

fn segments_intersect(p1: Point, p2: Point, q1: Point, q2: Point) -> bool {
    let (a1, b1, c1) = line_equation(p1, p2);
    let (a2, b2, c2) = line_equation(q1, q2);

    let det = a1 * b2 - a2 * b1;
    if det == 0.0 {
        return false;
    }

    let x = (b2 * c1 - b1 * c2) / det;
    let y = (a1 * c2 - a2 * c1) / det;

    within_bounds(x, y, p1, p2) && within_bounds(x, y, q1, q2)
}

fn within_bounds(x: f64, y: f64, p: Point, q: Point) -> bool {
    x >= p.lng.min(q.lng) - TOLERANCE
        && x <= p.lng.max(q.lng) + TOLERANCE
        && y >= p.lat.min(q.lat) - TOLERANCE
        && y <= p.lat.max(q.lat) + TOLERANCE
}
