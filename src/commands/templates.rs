//! Implementation of the templates command.

use colored::Colorize;
use janis_templates::sites::SiteKind;
use strum::IntoEnumIterator;

/// Formats the listing of every site template.
pub fn list_templates() -> String {
    let mut result = "Available templates:".to_owned();
    for kind in SiteKind::iter() {
        result.push_str(&format!(
            "\n\n  {name}\n    {description}\n    options: {keys}",
            name = kind.to_string().bold(),
            description = kind.description(),
            keys = kind.init_keys().join(", ").yellow()
        ));
    }
    result
}

/// Runs the `templates` command.
pub fn templates() -> anyhow::Result<()> {
    println!("{}", list_templates());
    Ok(())
}
