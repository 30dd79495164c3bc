use clap::ValueEnum;
use colored::Colorize;
use scm_providers::Repository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
}

const COLUMNS: [&str; 6] = ["ORGANIZATION", "REPOSITORY", "BRANCH", "SHA", "LABELS", "URL"];

fn row(repo: &Repository) -> [String; 6] {
    [
        repo.organization.clone(),
        repo.repository.clone(),
        repo.branch.clone(),
        repo.sha.chars().take(12).collect(),
        repo.labels.join(","),
        repo.url.clone(),
    ]
}

/// Render repositories as an aligned plain-text table
pub fn render_table(repos: &[Repository]) -> String {
    let rows: Vec<[String; 6]> = repos.iter().map(row).collect();

    let mut widths = COLUMNS.map(str::len);
    for r in &rows {
        for (width, cell) in widths.iter_mut().zip(r.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_line = |cells: &[String]| {
        cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let header: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();
    let mut lines = vec![format_line(&header[..])];
    lines.extend(rows.iter().map(|r| format_line(&r[..])));
    lines.join("\n")
}

pub fn print_repositories(format: OutputFormat, repos: &[Repository]) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(repos)?),
        OutputFormat::Table => {
            if repos.is_empty() {
                println!("{}", "No repositories found".bright_yellow());
            } else {
                let table = render_table(repos);
                let mut lines = table.lines();
                if let Some(header) = lines.next() {
                    println!("{}", header.bright_white().bold());
                }
                for line in lines {
                    println!("{}", line);
                }
            }
        }
    }
    Ok(())
}
