//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use cellar_core::{Bottle, CellarGrid, CellarSummary, Settings, Stats};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print any serializable value as pretty JSON
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("Failed to encode JSON output: {}", e),
        }
    }

    /// Print a single bottle with its resolved location
    pub fn print_bottle(&self, bottle: &Bottle, location: &str, settings: &Settings) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:        {}", bottle.id);
                println!("Wine:      {}", bottle.label());
                println!("Type:      {}", bottle.wine_type);
                if let Some(ref region) = bottle.region {
                    println!("Region:    {}", region);
                }
                if let Some(ref country) = bottle.country {
                    println!("Country:   {}", country);
                }
                match bottle.coordinates {
                    Some(c) => println!("Location:  {} row {} col {}", location, c.row, c.col),
                    None => println!("Location:  {}", location),
                }
                println!("Status:    {:?}", bottle.status);
                if let Some(price) = bottle.purchase_price {
                    println!("Paid:      {}", settings.format_amount(price));
                }
                println!("Value:     {}", settings.format_amount(bottle.value()));
                println!("Added:     {}", bottle.date_added.format("%Y-%m-%d"));
                if bottle.photo_url.is_some() {
                    println!("Photo:     yes");
                }

                if bottle.is_consumed() {
                    println!();
                    println!("── Tasting ──");
                    if let Some(date) = bottle.date_consumed {
                        println!("Consumed:  {}", date.format("%Y-%m-%d"));
                    }
                    if let Some(rating) = bottle.rating {
                        println!("Rating:    {}", stars(rating));
                    }
                    if let Some(ref occasion) = bottle.occasion {
                        println!("Occasion:  {}", occasion);
                    }
                    if let Some(ref notes) = bottle.notes {
                        println!("Notes:     {}", notes);
                    }
                } else if let Some(ref notes) = bottle.notes {
                    println!("Notes:     {}", notes);
                }
            }
            OutputFormat::Json => self.json(bottle),
            OutputFormat::Quiet => println!("{}", bottle.id),
        }
    }

    /// Print a list of bottles
    pub fn print_bottles(&self, bottles: &[Bottle], settings: &Settings) {
        match self.format {
            OutputFormat::Human => {
                if bottles.is_empty() {
                    println!("No bottles found.");
                    return;
                }
                for bottle in bottles {
                    let slot = match bottle.coordinates {
                        Some(c) => format!(" @{},{}", c.row, c.col),
                        None => String::new(),
                    };
                    println!(
                        "{} | {:<4} | {} | {:<9} | {}{}",
                        short_id(&bottle.id),
                        bottle.vintage,
                        truncate(&format!("{} {}", bottle.producer, bottle.varietal), 40),
                        bottle.wine_type,
                        settings.format_amount(bottle.value()),
                        slot
                    );
                }
                println!("\n{} bottle(s)", bottles.len());
            }
            OutputFormat::Json => self.json(bottles),
            OutputFormat::Quiet => {
                for bottle in bottles {
                    println!("{}", bottle.id);
                }
            }
        }
    }

    /// Print cellars with their bottle counts
    pub fn print_cellars(&self, summaries: &[CellarSummary]) {
        match self.format {
            OutputFormat::Human => {
                if summaries.is_empty() {
                    println!("No cellars found.");
                    return;
                }
                for s in summaries {
                    println!(
                        "{} | {} | {}x{} | {}/{} placed, {} loose",
                        short_id(&s.cellar.id),
                        truncate(&s.cellar.name, 30),
                        s.cellar.rows,
                        s.cellar.columns,
                        s.placed,
                        s.cellar.capacity(),
                        s.bottles - s.placed
                    );
                }
                println!("\n{} cellar(s)", summaries.len());
            }
            OutputFormat::Json => {
                let cellars: Vec<_> = summaries
                    .iter()
                    .map(|s| {
                        serde_json::json!({
                            "cellar": s.cellar,
                            "bottles": s.bottles,
                            "placed": s.placed
                        })
                    })
                    .collect();
                self.json(&cellars);
            }
            OutputFormat::Quiet => {
                for s in summaries {
                    println!("{}", s.cellar.id);
                }
            }
        }
    }

    /// Print a cellar as a grid of slots
    pub fn print_grid(&self, grid: &CellarGrid) {
        match self.format {
            OutputFormat::Human => {
                let cellar = &grid.cellar;
                println!("{} ({})", cellar.name, cellar.id);
                if let Some(ref description) = cellar.description {
                    println!("{}", description);
                }
                println!();

                let header: Vec<String> = (0..cellar.columns).map(|c| format!("{:>3}", c)).collect();
                println!("    {}", header.join(""));
                for (row, slots) in grid.slots.iter().enumerate() {
                    let cells: String = slots
                        .iter()
                        .map(|s| if s.is_some() { "  ●" } else { "  ·" })
                        .collect();
                    println!("{:>3} {}", row, cells);
                }
                println!();
                println!(
                    "{} of {} slots filled, {} free",
                    grid.occupied(),
                    cellar.capacity(),
                    grid.free()
                );

                let placed: Vec<&Bottle> = grid.slots.iter().flatten().flatten().collect();
                if !placed.is_empty() {
                    println!();
                    println!("── Placed ({}) ──", placed.len());
                    for bottle in placed {
                        if let Some(c) = bottle.coordinates {
                            println!("  {:>2},{:<2} {} {}", c.row, c.col, short_id(&bottle.id), bottle.label());
                        }
                    }
                }
                if !grid.loose.is_empty() {
                    println!();
                    println!("── Loose ({}) ──", grid.loose.len());
                    for bottle in &grid.loose {
                        println!("  {} {}", short_id(&bottle.id), bottle.label());
                    }
                }
                if !grid.stranded.is_empty() {
                    println!();
                    println!("── Outside grid ({}) ──", grid.stranded.len());
                    for bottle in &grid.stranded {
                        println!("  {} {}", short_id(&bottle.id), bottle.label());
                    }
                }
            }
            OutputFormat::Json => {
                let slots: Vec<_> = grid
                    .slots
                    .iter()
                    .flatten()
                    .flatten()
                    .filter_map(|b| {
                        b.coordinates.map(|c| {
                            serde_json::json!({"row": c.row, "col": c.col, "bottleId": b.id})
                        })
                    })
                    .collect();
                self.json(&serde_json::json!({
                    "cellar": grid.cellar,
                    "slots": slots,
                    "loose": grid.loose,
                    "stranded": grid.stranded,
                    "free": grid.free()
                }));
            }
            OutputFormat::Quiet => println!("{}", grid.free()),
        }
    }

    pub fn print_stats(&self, stats: &Stats, settings: &Settings) {
        match self.format {
            OutputFormat::Human => {
                println!("Bottles:    {}", stats.total_bottles);
                println!("Value:      {}", settings.format_amount(stats.total_value));
                println!("Red:        {}", stats.red_count);
                println!("White:      {}", stats.white_count);
                println!("Rose:       {}", stats.rose_count);
                println!("Sparkling:  {}", stats.sparkling_count);
                println!("Unplaced:   {}", stats.unplaced_count);
            }
            OutputFormat::Json => self.json(stats),
            OutputFormat::Quiet => println!("{}", stats.total_bottles),
        }
    }

    /// Print a list of plain strings
    pub fn print_lines(&self, lines: &[String], empty: &str) {
        match self.format {
            OutputFormat::Human => {
                if lines.is_empty() {
                    println!("{}", empty);
                }
                for line in lines {
                    println!("{}", line);
                }
            }
            OutputFormat::Json => self.json(lines),
            OutputFormat::Quiet => {
                for line in lines {
                    println!("{}", line);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// First eight characters of an id
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

fn stars(rating: u8) -> String {
    let filled = rating.min(5) as usize;
    format!("{}{} ({}/5)", "★".repeat(filled), "☆".repeat(5 - filled), rating)
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        assert_eq!(truncate("Château Margaux Grand Vin", 10), "Château...");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("6f1c2e9a-1111-2222"), "6f1c2e9a");
        assert_eq!(short_id("k9x2"), "k9x2");
        assert_eq!(short_id("default_kitchen"), "default_");
    }

    #[test]
    fn test_stars() {
        assert_eq!(stars(3), "★★★☆☆ (3/5)");
        assert_eq!(stars(0), "☆☆☆☆☆ (0/5)");
    }
}
