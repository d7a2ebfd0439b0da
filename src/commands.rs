/// Available commands, autocomplete and parsing
use crate::cache::DateRange;

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "claims",
    aliases: &["c", "claim", "chat"],
    description: "Claim threads and chat",
  },
  Command {
    name: "analytics",
    aliases: &["a", "stats", "orders"],
    description: "Daily counts and cache statistics",
  },
  Command {
    name: "notifications",
    aliases: &["n", "bell", "inbox"],
    description: "Inbound customer messages",
  },
  Command {
    name: "range",
    aliases: &["from", "dates"],
    description: "Set analytics range: range YYYY-MM-DD..YYYY-MM-DD",
  },
  Command {
    name: "refresh",
    aliases: &["reload"],
    description: "Drop cached data and refetch",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit claimdesk",
  },
];

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
  Claims,
  Analytics,
  Notifications,
  Range(DateRange),
  Refresh,
  Quit,
}

/// Parse a submitted command line. Names and aliases are accepted.
pub fn parse(input: &str) -> Result<AppCommand, String> {
  let input = input.trim();
  let (head, rest) = match input.split_once(char::is_whitespace) {
    Some((head, rest)) => (head, rest.trim()),
    None => (input, ""),
  };
  let head = head.to_lowercase();

  let cmd = COMMANDS
    .iter()
    .find(|c| c.name == head || c.aliases.contains(&head.as_str()))
    .ok_or_else(|| format!("Unknown command: {}", head))?;

  match cmd.name {
    "claims" => Ok(AppCommand::Claims),
    "analytics" => Ok(AppCommand::Analytics),
    "notifications" => Ok(AppCommand::Notifications),
    "refresh" => Ok(AppCommand::Refresh),
    "quit" => Ok(AppCommand::Quit),
    "range" => {
      let (from, to) = rest
        .split_once("..")
        .ok_or_else(|| "Usage: range YYYY-MM-DD..YYYY-MM-DD".to_string())?;
      DateRange::parse(from.trim(), to.trim())
        .map(AppCommand::Range)
        .map_err(|e| e.to_string())
    }
    other => Err(format!("Unknown command: {}", other)),
  }
}

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    // Exact match on name
    if cmd.name == input_lower {
      matches.push((cmd, 0)); // Highest priority
      continue;
    }

    // Exact match on alias
    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    // Prefix match on name
    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    // Prefix match on alias
    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
      continue;
    }

    // Fuzzy match (contains)
    if cmd.name.contains(&input_lower) {
      matches.push((cmd, 4));
      continue;
    }

    // Fuzzy match on alias
    if cmd.aliases.iter().any(|a| a.contains(&input_lower)) {
      matches.push((cmd, 5));
    }
  }

  // Sort by priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}
