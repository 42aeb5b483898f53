//! Random identifiers for upload names and fallback session ids.

use pairlink_protocol::SessionId;
use rand::Rng;
use rand::distributions::Alphanumeric;

/// `letters` random alphanumerics followed by `digits` random decimal digits.
pub fn random_id(letters: usize, digits: u32) -> String {
	let mut rng = rand::thread_rng();
	let mut id: String = (&mut rng).sample_iter(&Alphanumeric).take(letters).map(char::from).collect();
	let number = rng.gen_range(0..10u64.pow(digits));
	id.push_str(&format!("{number:0width$}", width = digits as usize));
	id
}

/// Suggested file name for an uploaded credential file.
pub fn upload_name() -> String {
	format!("{}.json", random_id(6, 4))
}

/// Locally generated session id used when the upload cannot provide one.
pub fn fallback_session_id() -> SessionId {
	SessionId(random_id(12, 6))
}
