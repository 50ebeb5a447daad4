use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::config::Settings;
use crate::service::ConversionClient;
use crate::slides::{ConversionResponse, Slide};
use crate::upload::{self, Converter, SelectedFile};

const PREVIEW_CHARS: usize = 60;

/// Convert a PDF through the conversion service and report the result.
pub fn run(settings: &Settings, file: &Path, json: bool, quiet: bool) -> Result<()> {
    let client = ConversionClient::new(&settings.service_url, settings.timeout_secs);
    let selected =
        SelectedFile::from_path(file).map_err(|e| anyhow::anyhow!(e.user_message()))?;

    if json {
        let raw = client
            .parse_pdf_raw(&selected)
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
        println!("{}", serde_json::to_string_pretty(&raw)?);
        ConversionResponse::from_raw(raw)
            .and_then(ConversionResponse::into_slides)
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
        return Ok(());
    }

    if !quiet {
        println!(
            "Converting {} via {}",
            selected.name.bold(),
            client.endpoint()
        );
    }
    let slides = upload::submit(&client, Some(selected))
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    println!(
        "{}",
        format!("Converted {} slide(s)", slides.len()).green().bold()
    );
    if !quiet {
        for line in summarize(&slides) {
            println!("  {line}");
        }
    }
    Ok(())
}

fn summarize(slides: &[Slide]) -> Vec<String> {
    slides
        .iter()
        .map(|slide| {
            let size = match slide.image_bytes() {
                Ok(bytes) => format!("{:>6.1} KiB", bytes.len() as f64 / 1024.0),
                Err(_) => format!("{:>10}", "bad image"),
            };
            let text = match slide.headline() {
                Some(text) if text.chars().count() > PREVIEW_CHARS => {
                    let cut: String = text.chars().take(PREVIEW_CHARS).collect();
                    format!("{cut}\u{2026}")
                }
                Some(text) => text.to_string(),
                None => "(no text)".dimmed().to_string(),
            };
            format!("{:>3}. {size}  {text}", slide.page)
        })
        .collect()
}
