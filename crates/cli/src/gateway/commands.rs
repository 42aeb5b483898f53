//! Inbound chat commands.

/// A recognised slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCommand {
	Start,
	Help,
	/// `/pair <number>`; the argument is passed through unvalidated.
	Pair(String),
	/// `/pair` without an argument.
	PairUsage,
	Cancel,
	DeleteSession,
	ListSession,
	Status,
}

impl GatewayCommand {
	/// Parses a message text. Anything that is not a known command yields `None`.
	///
	/// A `@botname` suffix on the command word is ignored, so `/pair@my_bot 237...`
	/// is the same as `/pair 237...`.
	pub fn parse(text: &str) -> Option<Self> {
		let text = text.trim();
		let rest = text.strip_prefix('/')?;
		let (word, argument) = match rest.split_once(char::is_whitespace) {
			Some((word, argument)) => (word, argument.trim()),
			None => (rest, ""),
		};
		let name = word.split('@').next().unwrap_or(word);

		let command = match name {
			"start" => Self::Start,
			"help" => Self::Help,
			"pair" if argument.is_empty() => Self::PairUsage,
			"pair" => Self::Pair(argument.to_string()),
			"cancel" => Self::Cancel,
			"delpair" => Self::DeleteSession,
			"listpair" => Self::ListSession,
			"status" => Self::Status,
			_ => return None,
		};
		Some(command)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pair_keeps_raw_argument() {
		assert_eq!(GatewayCommand::parse("/pair +237 123 456 789"), Some(GatewayCommand::Pair("+237 123 456 789".to_string())));
		assert_eq!(GatewayCommand::parse("  /pair   237123456789  "), Some(GatewayCommand::Pair("237123456789".to_string())));
	}

	#[test]
	fn bare_pair_asks_for_usage() {
		assert_eq!(GatewayCommand::parse("/pair"), Some(GatewayCommand::PairUsage));
		assert_eq!(GatewayCommand::parse("/pair   "), Some(GatewayCommand::PairUsage));
	}

	#[test]
	fn bot_suffix_is_ignored() {
		assert_eq!(GatewayCommand::parse("/cancel@pairlink_bot"), Some(GatewayCommand::Cancel));
		assert_eq!(GatewayCommand::parse("/pair@pairlink_bot 237123456789"), Some(GatewayCommand::Pair("237123456789".to_string())));
	}

	#[test]
	fn every_command_word_is_recognised() {
		let cases = [
			("/start", GatewayCommand::Start),
			("/help", GatewayCommand::Help),
			("/delpair", GatewayCommand::DeleteSession),
			("/listpair", GatewayCommand::ListSession),
			("/status", GatewayCommand::Status),
		];
		for (text, expected) in cases {
			assert_eq!(GatewayCommand::parse(text), Some(expected), "{text}");
		}
	}

	#[test]
	fn plain_text_and_unknown_commands_are_ignored() {
		assert_eq!(GatewayCommand::parse("hello"), None);
		assert_eq!(GatewayCommand::parse("/pairing 123"), None);
		assert_eq!(GatewayCommand::parse(""), None);
	}
}
