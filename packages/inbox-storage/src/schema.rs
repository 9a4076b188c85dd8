pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_tenants.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_tenants.sql")),
				"tables/002_profiles.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_profiles.sql")),
				"tables/003_whatsapp_accounts.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_whatsapp_accounts.sql")),
				"tables/004_funnel_stages.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_funnel_stages.sql")),
				"tables/005_contacts.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_contacts.sql")),
				"tables/006_conversations.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_conversations.sql")),
				"tables/007_messages.sql" =>
					out.push_str(include_str!("../../../sql/tables/007_messages.sql")),
				"tables/008_media_assets.sql" =>
					out.push_str(include_str!("../../../sql/tables/008_media_assets.sql")),
				"tables/009_jobs.sql" => out.push_str(include_str!("../../../sql/tables/009_jobs.sql")),
				"tables/010_webhook_events.sql" =>
					out.push_str(include_str!("../../../sql/tables/010_webhook_events.sql")),
				"tables/011_sla_policies.sql" =>
					out.push_str(include_str!("../../../sql/tables/011_sla_policies.sql")),
				"tables/012_sla_timers.sql" =>
					out.push_str(include_str!("../../../sql/tables/012_sla_timers.sql")),
				"tables/013_sla_events.sql" =>
					out.push_str(include_str!("../../../sql/tables/013_sla_events.sql")),
				"tables/014_internal_messages.sql" =>
					out.push_str(include_str!("../../../sql/tables/014_internal_messages.sql")),
				"tables/015_conversation_ratings.sql" =>
					out.push_str(include_str!("../../../sql/tables/015_conversation_ratings.sql")),
				"tables/016_whatsapp_templates.sql" =>
					out.push_str(include_str!("../../../sql/tables/016_whatsapp_templates.sql")),
				"tables/017_retention_policies.sql" =>
					out.push_str(include_str!("../../../sql/tables/017_retention_policies.sql")),
				"tables/018_access_logs.sql" =>
					out.push_str(include_str!("../../../sql/tables/018_access_logs.sql")),
				"tables/019_agent_shifts.sql" =>
					out.push_str(include_str!("../../../sql/tables/019_agent_shifts.sql")),
				"tables/020_agent_badges.sql" =>
					out.push_str(include_str!("../../../sql/tables/020_agent_badges.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
