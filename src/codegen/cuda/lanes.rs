//! Access to single lanes of CUDA vector values.
//!
//! Three packed layouts exist: native field vectors (`v.x` .. `v.w`),
//! four 8-bit lanes in one 32-bit integer, and pairs of halves in the
//! words of a `uintN`.

use crate::diagnostic::Diagnostic;
use crate::ir::DataType;
use crate::span::Span;

const ACCESS: [char; 4] = ['x', 'y', 'z', 'w'];

fn lane_error(message: String) -> Diagnostic {
    Diagnostic::error(message, Span::dummy())
}

/// Lanes 2 and 3 of 8-bit vectors are native `charN` fields.
fn is_byte_fields(t: DataType) -> bool {
    t.bits == 8 && t.is_integer() && (t.lanes == 2 || t.lanes == 3)
}

/// Four 8-bit lanes packed in one 32-bit container.
fn is_byte_packed(t: DataType) -> bool {
    t.bits == 8 && t.is_integer() && !is_byte_fields(t)
}

fn check_index(t: DataType, i: u16) -> Result<(), Diagnostic> {
    if t.is_sub_byte() {
        return Err(lane_error(format!(
            "lanes of sub-byte vector {} cannot be addressed individually",
            t
        )));
    }
    let limit = if t.is_float16() { 8 } else { 4 };
    if i >= limit {
        return Err(lane_error(format!(
            "lane index {} out of range for {} (limit {})",
            i, t, limit
        )));
    }
    Ok(())
}

/// Expression text reading lane `i` of `vec`.
pub fn load_lane(vec: &str, t: DataType, i: u16) -> Result<String, Diagnostic> {
    if t.is_scalar() {
        return Ok(vec.to_string());
    }
    check_index(t, i)?;
    if is_byte_fields(t) {
        return Ok(format!("{}.{}", vec, ACCESS[(i % t.lanes) as usize]));
    }
    if is_byte_packed(t) {
        let ty = if t.is_int() { "char" } else { "unsigned char" };
        return Ok(format!("(({})({} >> {}))", ty, vec, i * 8));
    }
    if t.is_float16() {
        return Ok(format!(
            "((half2*)(&({}.{})))->{}",
            vec,
            ACCESS[(i / 2) as usize],
            ACCESS[(i % 2) as usize]
        ));
    }
    Ok(format!("{}.{}", vec, ACCESS[i as usize]))
}

/// Statement text (without trailing newline) writing `value` into lane
/// `i` of `vec`.
///
/// Packed 8-bit lane 0 overwrites the whole word; other lanes merge into
/// it. Writers must therefore store lane 0 before any other lane.
pub fn store_lane(vec: &str, t: DataType, i: u16, value: &str) -> Result<String, Diagnostic> {
    if t.is_scalar() {
        return Err(lane_error(format!(
            "cannot store lane {} of scalar {}",
            i, t
        )));
    }
    check_index(t, i)?;
    if is_byte_fields(t) {
        return Ok(format!(
            "{}.{}=({});",
            vec,
            ACCESS[(i % t.lanes) as usize],
            value
        ));
    }
    if is_byte_packed(t) {
        let shift = i * 8;
        if i == 0 {
            return Ok(format!("{}=(({}) & 0x000000ff);", vec, value));
        }
        return Ok(format!(
            "{v}={v} & ~(0x000000ff << {s}) | ((({val}) & 0x000000ff) << {s});",
            v = vec,
            s = shift,
            val = value
        ));
    }
    if t.is_float16() {
        return Ok(format!(
            "((half2*)(&({}.{})))->{} = {};",
            vec,
            ACCESS[(i / 2) as usize],
            ACCESS[(i % 2) as usize],
            value
        ));
    }
    Ok(format!("{}.{} = {};", vec, ACCESS[i as usize], value))
}

/// Expression text building a whole vector of type `t` (spelled
/// `spelled`) from one text per lane.
pub fn pack_lanes(t: DataType, spelled: &str, lanes: &[String]) -> Result<String, Diagnostic> {
    if lanes.len() != t.lanes as usize {
        return Err(lane_error(format!(
            "{} lanes given for vector {}",
            lanes.len(),
            t
        )));
    }
    if t.is_scalar() {
        return Ok(lanes[0].clone());
    }
    if t.is_sub_byte() {
        return Err(lane_error(format!(
            "cannot build sub-byte vector {} lane by lane",
            t
        )));
    }
    if is_byte_packed(t) {
        let word = if t.is_int() { "int" } else { "uint" };
        let words: Vec<String> = lanes
            .chunks(4)
            .map(|chunk| {
                let parts: Vec<String> = chunk
                    .iter()
                    .enumerate()
                    .map(|(k, lane)| format!("((({}) & 0x000000ff) << {})", lane, k * 8))
                    .collect();
                format!("(({})({}))", word, parts.join(" | "))
            })
            .collect();
        if words.len() == 1 {
            return Ok(words.into_iter().next().unwrap_or_default());
        }
        return Ok(format!("make_{}({})", spelled, words.join(", ")));
    }
    if t.is_float16() {
        let pairs: Vec<String> = lanes
            .chunks(2)
            .map(|pair| format!("__pack_half2({}, {})", pair[0], pair[1]))
            .collect();
        return Ok(format!("make_{}({})", spelled, pairs.join(", ")));
    }
    Ok(format!("make_{}({})", spelled, lanes.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> DataType {
        s.parse().unwrap()
    }

    #[test]
    fn test_load_forms() {
        assert_eq!(load_lane("v", t("float32"), 3).unwrap(), "v");
        assert_eq!(load_lane("v", t("float32x4"), 2).unwrap(), "v.z");
        assert_eq!(load_lane("v", t("int8x3"), 2).unwrap(), "v.z");
        assert_eq!(load_lane("v", t("int8x4"), 1).unwrap(), "((char)(v >> 8))");
        assert_eq!(
            load_lane("v", t("uint8x4"), 3).unwrap(),
            "((unsigned char)(v >> 24))"
        );
        assert_eq!(
            load_lane("v", t("float16x8"), 5).unwrap(),
            "((half2*)(&(v.z)))->y"
        );
        assert_eq!(load_lane("c", t("uint16x4"), 0).unwrap(), "c.x");
    }

    #[test]
    fn test_index_limits() {
        assert!(load_lane("v", t("float16x8"), 7).is_ok());
        assert!(load_lane("v", t("float16x8"), 8).is_err());
        assert!(load_lane("v", t("int8x16"), 4).is_err());
        assert!(store_lane("v", t("float32x4"), 4, "0").is_err());
        assert!(load_lane("v", t("int4x8"), 0).is_err());
    }

    #[test]
    fn test_scalar_store_is_fatal() {
        let err = store_lane("v", t("float32"), 0, "1").unwrap_err();
        assert!(err.message.contains("scalar"));
    }

    #[test]
    fn test_store_forms() {
        assert_eq!(
            store_lane("r", t("float32x4"), 1, "a").unwrap(),
            "r.y = a;"
        );
        assert_eq!(
            store_lane("r", t("float16x4"), 3, "h").unwrap(),
            "((half2*)(&(r.y)))->y = h;"
        );
        assert_eq!(store_lane("r", t("uint8x2"), 1, "b").unwrap(), "r.y=(b);");
        assert_eq!(
            store_lane("r", t("int8x4"), 0, "b").unwrap(),
            "r=((b) & 0x000000ff);"
        );
        assert_eq!(
            store_lane("r", t("int8x4"), 2, "b").unwrap(),
            "r=r & ~(0x000000ff << 16) | (((b) & 0x000000ff) << 16);"
        );
    }

    /// Run the packed-byte store statements against a 32-bit model of
    /// the C semantics.
    fn run_byte_store(word: u32, stmt: &str) -> u32 {
        if let Some(rest) = stmt.strip_prefix("r=((") {
            let value: i64 = rest
                .strip_suffix(") & 0x000000ff);")
                .expect("lane 0 form")
                .parse()
                .expect("literal");
            return (value & 0xff) as u32;
        }
        let rest = stmt
            .strip_prefix("r=r & ~(0x000000ff << ")
            .expect("merge form");
        let (shift, rest) = rest.split_once(')').expect("shift");
        let shift: u32 = shift.parse().expect("shift literal");
        let rest = rest.strip_prefix(" | (((").expect("value start");
        let (value, _) = rest.split_once(')').expect("value end");
        let value: i64 = value.parse().expect("value literal");
        (word & !(0xffu32 << shift)) | (((value & 0xff) as u32) << shift)
    }

    fn permutations(items: Vec<u16>) -> Vec<Vec<u16>> {
        if items.len() <= 1 {
            return vec![items];
        }
        let mut out = Vec::new();
        for k in 0..items.len() {
            let mut rest = items.clone();
            let head = rest.remove(k);
            for mut p in permutations(rest) {
                p.insert(0, head);
                out.push(p);
            }
        }
        out
    }

    #[test]
    fn test_byte_stores_never_corrupt_neighbours() {
        // Negative values exercise sign extension into upper bits.
        let values: [i64; 4] = [-1, 0x12, -128, 0x7f];
        let ty = t("int8x4");
        for order in permutations(vec![1, 2, 3]) {
            let mut word = 0xdead_beefu32;
            let mut stores = vec![0u16];
            stores.extend(order);
            for lane in &stores {
                let stmt = store_lane("r", ty, *lane, &values[*lane as usize].to_string()).unwrap();
                word = run_byte_store(word, &stmt);
            }
            for lane in 0..4u32 {
                let byte = (word >> (lane * 8)) & 0xff;
                assert_eq!(
                    byte,
                    (values[lane as usize] & 0xff) as u32,
                    "lane {} after order {:?}",
                    lane,
                    stores
                );
            }
        }
    }

    #[test]
    fn test_round_trip_text() {
        // Store then load of the same lane names the same storage slot.
        for (ty, lanes) in [
            ("float32x4", 4u16),
            ("int32x3", 3),
            ("float16x8", 8),
            ("uint8x3", 3),
            ("boolx4", 4),
        ] {
            let ty = t(ty);
            for i in 0..lanes {
                let load = load_lane("v", ty, i).unwrap();
                let store = store_lane("v", ty, i, "X").unwrap();
                assert!(
                    store.starts_with(&load),
                    "{} lane {}: store '{}' does not target '{}'",
                    ty,
                    i,
                    store,
                    load
                );
            }
        }
    }

    #[test]
    fn test_pack_forms() {
        let lanes = |n: usize| (0..n).map(|k| format!("a{}", k)).collect::<Vec<_>>();
        assert_eq!(
            pack_lanes(t("float32x4"), "float4", &lanes(4)).unwrap(),
            "make_float4(a0, a1, a2, a3)"
        );
        assert_eq!(
            pack_lanes(t("float16x4"), "uint2", &lanes(4)).unwrap(),
            "make_uint2(__pack_half2(a0, a1), __pack_half2(a2, a3))"
        );
        assert_eq!(
            pack_lanes(t("int8x4"), "int", &lanes(4)).unwrap(),
            "((int)((((a0) & 0x000000ff) << 0) | (((a1) & 0x000000ff) << 8) | \
             (((a2) & 0x000000ff) << 16) | (((a3) & 0x000000ff) << 24)))"
        );
        assert!(pack_lanes(t("int8x8"), "int2", &lanes(8))
            .unwrap()
            .starts_with("make_int2(((int)("));
        assert!(pack_lanes(t("float32x4"), "float4", &lanes(3)).is_err());
    }
}
