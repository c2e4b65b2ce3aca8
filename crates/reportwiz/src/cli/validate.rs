//! `reportwiz validate`

use anyhow::Result;
use reportwiz_protocol::{CategoryConfig, CategoryKind, WizardConfig};
use std::path::{Path, PathBuf};

use super::error::HelpfulError;
use super::output::print_table;

#[derive(Debug)]
pub struct ValidateArgs {
    pub config: PathBuf,
    pub json: bool,
}

pub fn run(args: ValidateArgs) -> Result<()> {
    let config = load_config(&args.config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let rows = config
        .categories
        .iter()
        .map(|category| category_row(&config, category))
        .collect();
    print_table(
        &["Category", "Kind", "Fields", "Hints", "Debounce", "Required"],
        rows,
    );

    match &config.report {
        Some(target) => println!(
            "Report: {} / {} ({})",
            target.category, target.data_set, target.intention
        ),
        None => println!("Report: none configured (submission will fail)"),
    }
    println!("OK: {} categories", config.categories.len());
    Ok(())
}

/// Load a wizard config, mapping failures to helpful errors.
pub fn load_config(path: &Path) -> Result<WizardConfig> {
    if !path.exists() {
        return Err(HelpfulError::file_not_found(path).into());
    }
    WizardConfig::load(path).map_err(|err| HelpfulError::invalid_config(path, &err).into())
}

fn category_row(config: &WizardConfig, category: &CategoryConfig) -> Vec<String> {
    let (fields, hints, debounce) = match category.kind {
        CategoryKind::Composite => (
            category
                .fields
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            category
                .fields
                .iter()
                .map(|f| f.hint_category())
                .collect::<Vec<_>>()
                .join(", "),
            category
                .fields
                .iter()
                .map(|f| format!("{}ms", config.debounce_for(f).as_millis()))
                .collect::<Vec<_>>()
                .join(", "),
        ),
        CategoryKind::Tags | CategoryKind::Search => {
            let field = category.as_field();
            (
                "-".to_string(),
                category.hint_category().to_string(),
                format!("{}ms", config.debounce_for(&field).as_millis()),
            )
        }
        CategoryKind::Choice => ("-".to_string(), "-".to_string(), "-".to_string()),
    };

    vec![
        category.name.clone(),
        category.kind.as_str().to_string(),
        fields,
        hints,
        debounce,
        if config.is_required(&category.name) { "yes" } else { "no" }.to_string(),
    ]
}
