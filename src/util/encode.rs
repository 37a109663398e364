use serde::Serialize;

/// Serialize to JSON, truncating long result at a codepoint boundary
pub fn debug_serialize<T: Serialize>(x: T) -> String {
	match serde_json::to_string(&x) {
		Ok(mut ss) => {
			if ss.len() > 100 {
				let mut cut = 100;
				while !ss.is_char_boundary(cut) {
					cut -= 1;
				}
				ss.truncate(cut);
			}
			ss
		}
		Err(e) => format!("<JSON serialization error: {}>", e),
	}
}
