use std::env;
use std::fs;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use log::info;

use gjstrings::api::ApiClient;
use gjstrings::scanner::{
    decode_image_bytes, NokhwaBackend, NullSurface, RqrrDetector, ScanConfig, ScanController,
    ScanEvent,
};
use gjstrings::settings::{default_settings_path, SettingsStore, ThemeChoice};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        print_usage();
        return Ok(());
    };

    let settings = SettingsStore::new(default_settings_path()?)?;

    match command {
        "scan" => scan(&settings).await,
        "image" => {
            let path = required(&args, 1, "image <path>")?;
            decode_still(&settings, &path).await
        }
        "detail" => {
            let code = required(&args, 1, "detail <kod>")?;
            show_detail_and_history(&api_client(&settings)?, &code).await
        }
        "history" => {
            let code = required(&args, 1, "history <kod>")?;
            show_history(&api_client(&settings)?, &code).await
        }
        "rackets" => {
            let owner = required(&args, 1, "rackets <majitel>")?;
            show_rackets(&api_client(&settings)?, &owner).await
        }
        "strings" => {
            let owner = required(&args, 1, "strings <majitel>")?;
            show_strings(&api_client(&settings)?, &owner).await
        }
        "stats" => {
            let owner = required(&args, 1, "stats <majitel>")?;
            show_stats(&api_client(&settings)?, &owner).await
        }
        "theme" => theme_command(&settings, args.get(1).map(String::as_str)),
        other => {
            print_usage();
            bail!("unknown command '{other}'");
        }
    }
}

fn print_usage() {
    println!("GJ Strings workshop companion");
    println!();
    println!("Usage: gjstrings <command>");
    println!("  scan               scan a racket QR code with the camera");
    println!("  image <path>       decode a QR code from a photo");
    println!("  detail <kod>       racket detail and stringing history");
    println!("  history <kod>      stringing history only");
    println!("  rackets <majitel>  rackets registered to an owner");
    println!("  strings <majitel>  string deposits of an owner");
    println!("  stats <majitel>    stringing statistics for an owner");
    println!("  theme [RG|WIM|AO]  show or set the color theme");
    println!();
    println!("The API endpoint comes from GJSTRINGS_API_URL or the settings file.");
}

fn required(args: &[String], index: usize, usage: &str) -> Result<String> {
    args.get(index)
        .cloned()
        .with_context(|| format!("usage: gjstrings {usage}"))
}

fn api_client(settings: &SettingsStore) -> Result<ApiClient> {
    let base = env::var("GJSTRINGS_API_URL")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| settings.api_base_url())
        .context("no API base URL configured; set GJSTRINGS_API_URL or the settings file")?;
    Ok(ApiClient::new(base))
}

/// Live scan. On a decoded code the racket is looked up right away when an
/// API base is configured; scanning always ends after the first code.
async fn scan(settings: &SettingsStore) -> Result<()> {
    let controller = ScanController::new(
        Arc::new(NokhwaBackend),
        Arc::new(RqrrDetector),
        ScanConfig::default(),
    );
    let mut events = controller
        .take_events()
        .ok_or_else(|| anyhow!("event channel already taken"))?;

    controller.start(Arc::new(NullSurface)).await?;
    println!("Scanning... hold the racket code in front of the camera.");

    let mut decoded = None;
    while let Some(event) = events.recv().await {
        match event {
            ScanEvent::Started { device_label, .. } => info!("camera '{device_label}' active"),
            ScanEvent::Decoded(code) => decoded = Some(code),
            ScanEvent::Closed => break,
        }
    }
    controller.stop().await;

    let Some(code) = decoded else {
        bail!("scan ended without a code");
    };
    println!("Scanned code: {code}");
    lookup_scanned(settings, code.as_str()).await
}

/// Still-image fallback for platforms where live scanning fails or is
/// unsupported.
async fn decode_still(settings: &SettingsStore, path: &str) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("could not read {path}"))?;
    let code = decode_image_bytes(&RqrrDetector, &bytes)?;
    println!("Decoded code: {code}");
    lookup_scanned(settings, code.as_str()).await
}

async fn lookup_scanned(settings: &SettingsStore, code: &str) -> Result<()> {
    match api_client(settings) {
        Ok(api) => show_detail_and_history(&api, code).await,
        Err(err) => {
            println!("({err})");
            Ok(())
        }
    }
}

async fn show_detail_and_history(api: &ApiClient, code: &str) -> Result<()> {
    let detail = api.detail(code).await?;
    println!("{}", heading(&detail.name, &detail.code));
    println!("  Code:   {}", detail.code);
    println!("  Owner:  {}", dash(&detail.owner));
    println!("  Length: {}", dash(&detail.string_length));
    println!("  Knots:  {}", dash(&detail.knots));
    println!();
    show_history(api, code).await
}

async fn show_history(api: &ApiClient, code: &str) -> Result<()> {
    let rows = api.history(code).await?;
    println!("Stringing history:");
    if rows.is_empty() {
        println!("  (no records)");
    }
    for row in rows {
        println!(
            "  {:<12} {:<28} {}",
            dash(&row.date),
            dash(&row.string_type),
            dash(&row.tension)
        );
    }
    Ok(())
}

async fn show_rackets(api: &ApiClient, owner: &str) -> Result<()> {
    let items = api.rackets_by_owner(owner).await?;
    println!("Rackets of {owner}:");
    if items.is_empty() {
        println!("  (none)");
    }
    for item in items {
        println!("  {:<12} {}", item.code, dash(&item.name));
    }
    Ok(())
}

async fn show_strings(api: &ApiClient, owner: &str) -> Result<()> {
    let items = api.strings_by_owner(owner).await?;
    println!("String deposits of {owner}:");
    if items.is_empty() {
        println!("  (none)");
    }
    for item in items {
        println!("  {:<12} {:<28} x{}", item.code, dash(&item.name), item.quantity);
    }
    Ok(())
}

async fn show_stats(api: &ApiClient, owner: &str) -> Result<()> {
    let stats = api.statistics(owner).await?;
    println!("Statistics for {owner}:");
    println!("  Total stringings:   {}", stats.total);
    println!("  Most common string: {}", dash(&stats.common_string));
    println!("  Most common tension:{}", dash(&stats.common_tension));
    println!("  By month:");
    if stats.by_month.is_empty() {
        println!("    (no data)");
    }
    for month in stats.by_month {
        println!("    {:<8} {}", month.month, month.count);
    }
    Ok(())
}

fn theme_command(settings: &SettingsStore, value: Option<&str>) -> Result<()> {
    match value {
        None => {
            let current = settings.theme();
            println!("Current theme: {} ({})", current.key(), current.display_name());
            Ok(())
        }
        Some(raw) => {
            let choice = ThemeChoice::parse(raw)
                .with_context(|| format!("unknown theme '{raw}'; expected RG, WIM or AO"))?;
            settings.update_theme(choice)?;
            println!("Theme set to {} ({})", choice.key(), choice.display_name());
            Ok(())
        }
    }
}

fn dash(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value
    }
}

fn heading<'a>(name: &'a str, code: &'a str) -> &'a str {
    if name.trim().is_empty() {
        code
    } else {
        name
    }
}
