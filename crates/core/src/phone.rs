use std::fmt;
use std::str::FromStr;

use crate::error::PairError;

/// Phone number normalized to its digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
	pub const MIN_DIGITS: usize = 10;
	pub const MAX_DIGITS: usize = 15;

	/// Drops every non-digit character and checks the remaining length.
	///
	/// `"+237 123-456-789"` normalizes to `"237123456789"`.
	pub fn parse(raw: &str) -> Result<Self, PairError> {
		let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
		if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digits.len()) {
			return Err(PairError::Validation(format!(
				"expected {}-{} digits, got {}",
				Self::MIN_DIGITS,
				Self::MAX_DIGITS,
				digits.len()
			)));
		}
		Ok(Self(digits))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl FromStr for PhoneNumber {
	type Err = PairError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

impl fmt::Display for PhoneNumber {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}
