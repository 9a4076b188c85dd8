use clap::builder::{
	Styles,
	styling::{AnsiColor, Effects},
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Green.on_default() | Effects::BOLD)
		.usage(AnsiColor::Green.on_default() | Effects::BOLD)
		.literal(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Yellow.on_default())
}

/// Identifier recorded in `jobs.locked_by` when the config does not pin one.
pub fn default_worker_id() -> String {
	let host = std::env::var("HOSTNAME")
		.ok()
		.filter(|host| !host.trim().is_empty())
		.unwrap_or_else(|| "inbox-worker".to_string());

	format!("{host}:{}", std::process::id())
}
