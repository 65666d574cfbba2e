use super::{GeometryError, Point};

const PREFIX: &str = "LINESTRING(";
const SUFFIX: &str = ")";

/// 编码为 `LINESTRING(lng lat, lng lat, ...)`，注意经度在前
pub fn encode(points: &[Point]) -> String {
    let pairs = points
        .iter()
        .map(|p| format!("{} {}", p.lng, p.lat))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{}{}{}", PREFIX, pairs, SUFFIX)
}

/// 解析 WKT 文本。少于两个点的几何视为没有可用路线，返回空序列
pub fn decode(text: &str) -> Result<Vec<Point>, GeometryError> {
    let body = text
        .strip_prefix(PREFIX)
        .and_then(|rest| rest.strip_suffix(SUFFIX))
        .ok_or_else(|| GeometryError::MalformedGeometry(truncate(text)))?;

    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let points = body
        .split(',')
        .map(parse_pair)
        .collect::<Result<Vec<_>, _>>()?;

    if points.len() < 2 {
        return Ok(Vec::new());
    }
    Ok(points)
}

fn parse_pair(pair: &str) -> Result<Point, GeometryError> {
    let malformed = || GeometryError::MalformedGeometry(format!("bad coordinate pair '{}'", pair.trim()));

    let mut parts = pair.split_whitespace();
    let (Some(lng), Some(lat), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(malformed());
    };
    let lng = lng.parse::<f64>().map_err(|_| malformed())?;
    let lat = lat.parse::<f64>().map_err(|_| malformed())?;

    Point::new(lat, lng).map_err(|_| malformed())
}

fn truncate(text: &str) -> String {
    text.chars().take(64).collect()
}
